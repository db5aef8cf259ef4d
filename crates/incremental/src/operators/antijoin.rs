//! Incremental antijoin operator.

use super::join::JoinSide;
use crate::change::{Change, ChangeBatch, Timestamp, Weight};
use alloc::vec::Vec;
use hashbrown::HashMap;
use stratalog_core::Tuple;

/// Computes the change of `P ▷ N`: the tuples of `P` whose key has no match
/// in `N`.
///
/// Both arrangements must already contain the round's changes. Positive-side
/// changes pass through when their key is absent from the new `N`. Every key
/// of `N` whose presence flipped revisits the old `P` tuples under that key,
/// retracting them when the key appeared and restoring them when it vanished.
pub fn antijoin_changes(positive: JoinSide<'_>, negative: JoinSide<'_>) -> ChangeBatch<Tuple> {
    let mut output = Vec::new();

    // Positive-side changes whose key is absent after the round
    for change in positive.delta {
        let key = change.data.project(positive.key);
        if negative.arrangement.key_weight(&key) <= 0 {
            output.push(change.clone());
        }
    }

    if negative.delta.is_empty() {
        return output;
    }

    // Net change of each negative key during the round
    let mut key_deltas: HashMap<Tuple, (Weight, Timestamp)> = HashMap::new();
    for change in negative.delta {
        let entry = key_deltas
            .entry(change.data.project(negative.key))
            .or_insert((0, change.time));
        entry.0 += change.diff;
        entry.1 = entry.1.join(change.time);
    }

    let mut positive_by_key: HashMap<Tuple, Vec<&Change<Tuple>>> = HashMap::new();
    for change in positive.delta {
        positive_by_key
            .entry(change.data.project(positive.key))
            .or_default()
            .push(change);
    }

    for (key, (delta, time)) in key_deltas {
        let new_weight = negative.arrangement.key_weight(&key);
        let old_weight = new_weight - delta;
        // +1 when the key disappeared, -1 when it appeared
        let flip = Weight::from(old_weight > 0) - Weight::from(new_weight > 0);
        if flip == 0 {
            continue;
        }
        // Old positive contents are the new contents minus this round's changes
        for (p, weight, p_time) in positive.arrangement.matches(&key) {
            output.push(Change::new(p.clone(), weight * flip, time.join(p_time)));
        }
        if let Some(changes) = positive_by_key.get(&key) {
            for change in changes {
                output.push(Change::new(
                    change.data.clone(),
                    -change.diff * flip,
                    time.join(change.time),
                ));
            }
        }
    }

    output
}
