//! Identifier allocation.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

/// Allocates up to `count` identifiers in `0..=max` that are not in `existing`.
///
/// Identifiers are handed out in ascending order starting from the lowest free
/// one. When fewer than `count` identifiers are free, every free identifier is
/// returned; a short allocation is not an error.
pub fn allocate_ids(existing: &BTreeSet<u64>, count: usize, max: u64) -> Vec<u64> {
    let mut allocated = Vec::with_capacity(count);
    let mut taken = existing.range(..=max).copied().peekable();
    let mut candidate = 0u64;

    while allocated.len() < count {
        while taken.next_if(|&id| id < candidate).is_some() {}
        if taken.next_if_eq(&candidate).is_none() {
            allocated.push(candidate);
        }
        if candidate == max {
            break;
        }
        candidate += 1;
    }

    allocated
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn set(ids: &[u64]) -> BTreeSet<u64> {
        ids.iter().copied().collect()
    }

    #[test]
    fn test_allocate_from_empty() {
        assert_eq!(allocate_ids(&BTreeSet::new(), 3, 100), vec![0, 1, 2]);
    }

    #[test]
    fn test_allocate_skips_existing() {
        assert_eq!(allocate_ids(&set(&[0, 2, 3]), 3, 100), vec![1, 4, 5]);
    }

    #[test]
    fn test_partial_allocation() {
        assert_eq!(allocate_ids(&set(&[1, 3]), 5, 4), vec![0, 2, 4]);
        assert!(allocate_ids(&set(&[0, 1, 2]), 2, 2).is_empty());
    }

    #[test]
    fn test_allocate_at_upper_bound() {
        let ids = allocate_ids(&set(&[u64::MAX - 1]), 2, u64::MAX);
        assert_eq!(ids, vec![0, 1]);

        let all: BTreeSet<u64> = (0..10).collect();
        assert_eq!(allocate_ids(&all, 1, 10), vec![10]);
    }

    #[test]
    fn test_allocate_zero() {
        assert!(allocate_ids(&BTreeSet::new(), 0, 10).is_empty());
    }
}
