//! Property-based tests for incremental evaluation.
//!
//! Whatever sequence of transactions produced a state, it must equal the state
//! computed from scratch over the final inputs, and the changes emitted along
//! the way must add up to it.

use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

use stratalog_core::schema::RelationBuilder;
use stratalog_core::{tuple, DataType};
use stratalog_engine::{Aggregator, Engine, ProgramBuilder, RelId, Tuple};

fn relation(builder: &mut ProgramBuilder, name: &str, arity: usize, input: bool) -> RelId {
    let mut relation = RelationBuilder::new(name).unwrap();
    for column in 0..arity {
        relation = relation.add_column(format!("c{column}"), DataType::Int).unwrap();
    }
    let relation = if input { relation.input() } else { relation.output() };
    builder.relation(relation.build().unwrap()).unwrap()
}

fn closure_engine() -> (Engine, RelId, RelId) {
    let mut builder = ProgramBuilder::new();
    let edge = relation(&mut builder, "edge", 2, true);
    let path = relation(&mut builder, "path", 2, false);
    let base = builder.scan(edge).unwrap();
    builder.rule(path, base).unwrap();
    let step = builder
        .join_with(path, [1], edge, [0], |p: &Tuple, e: &Tuple| {
            Ok(Tuple::new(vec![p[0].clone(), e[1].clone()]))
        })
        .unwrap();
    builder.rule(path, step).unwrap();
    (Engine::new(builder.build().unwrap()), edge, path)
}

/// A program mixing recursion shapes:
///
/// path(x, y) <- edge(x, y); path(x, z) <- path(x, y), path(y, z)
/// live(x, y) <- edge(x, y); live(x, z) <- live(x, y), step(y, z)
/// step(y, z) <- live(y, z), !blocked(z)
/// reach(x, n) <- n = count(path(x, _)); nearest(x, m) <- m = min(live(x, _))
fn mixed_engine() -> (Engine, RelId, RelId, Vec<RelId>) {
    let mut builder = ProgramBuilder::new();
    let edge = relation(&mut builder, "edge", 2, true);
    let blocked = relation(&mut builder, "blocked", 1, true);
    let path = relation(&mut builder, "path", 2, false);
    let live = relation(&mut builder, "live", 2, false);
    let step = relation(&mut builder, "step", 2, false);
    let reach = relation(&mut builder, "reach", 2, false);
    let nearest = relation(&mut builder, "nearest", 2, false);
    let ends = |a: &Tuple, b: &Tuple| Ok(Tuple::new(vec![a[0].clone(), b[1].clone()]));

    let n = builder.scan(edge).unwrap();
    builder.rule(path, n).unwrap();
    let n = builder.join_with(path, [1], path, [0], ends).unwrap();
    builder.rule(path, n).unwrap();

    let n = builder.scan(edge).unwrap();
    builder.rule(live, n).unwrap();
    let n = builder.join_with(live, [1], step, [0], ends).unwrap();
    builder.rule(live, n).unwrap();
    let n = builder.antijoin(live, [1], blocked, [0]).unwrap();
    builder.rule(step, n).unwrap();

    let n = builder.aggregate(path, [0], Aggregator::Count).unwrap();
    builder.rule(reach, n).unwrap();
    let n = builder.aggregate(live, [0], Aggregator::Min(1)).unwrap();
    builder.rule(nearest, n).unwrap();

    let engine = Engine::new(builder.build().unwrap());
    (engine, edge, blocked, vec![path, live, step, reach, nearest])
}

/// Transitive closure computed directly.
fn closure(edges: &BTreeSet<(i64, i64)>) -> BTreeSet<Tuple> {
    let mut paths: BTreeSet<(i64, i64)> = edges.clone();
    loop {
        let next: Vec<(i64, i64)> = paths
            .iter()
            .flat_map(|&(x, y)| edges.iter().filter(move |&&(a, _)| a == y).map(move |&(_, z)| (x, z)))
            .filter(|p| !paths.contains(p))
            .collect();
        if next.is_empty() {
            break;
        }
        paths.extend(next);
    }
    paths.into_iter().map(|(x, y)| tuple![x, y]).collect()
}

/// Batches of edge toggles over a small node set, so cycles are common.
fn batches() -> impl Strategy<Value = Vec<Vec<(i64, i64, bool)>>> {
    prop::collection::vec(prop::collection::vec((0i64..5, 0i64..5, any::<bool>()), 1..6), 1..8)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_closure_matches_recomputation(batches in batches()) {
        let (mut engine, edge, path) = closure_engine();
        let mut edges = BTreeSet::new();
        let mut view: BTreeSet<Tuple> = BTreeSet::new();

        for batch in batches {
            let mut tx = engine.begin();
            for (x, y, insert) in batch {
                // Keep input counts at 0 or 1
                let present = edges.contains(&(x, y));
                if insert && !present {
                    edges.insert((x, y));
                    tx.insert(edge, tuple![x, y]).unwrap();
                } else if !insert && present {
                    edges.remove(&(x, y));
                    tx.delete(edge, tuple![x, y]).unwrap();
                }
            }
            let commit = engine.commit(tx).unwrap();

            for change in commit.changes_for(path) {
                prop_assert!(change.diff == 1 || change.diff == -1);
                if change.diff > 0 {
                    prop_assert!(view.insert(change.data.clone()));
                } else {
                    prop_assert!(view.remove(&change.data));
                }
            }
            let expected = closure(&edges);
            prop_assert_eq!(&view, &expected);
            prop_assert_eq!(engine.state(path).into_iter().collect::<BTreeSet<_>>(), expected);
        }
    }

    #[test]
    fn prop_mixed_recursion_matches_fresh_engine(
        batches in prop::collection::vec(
            prop::collection::vec((any::<bool>(), 0i64..5, 0i64..5, any::<bool>()), 1..8),
            1..6,
        ),
    ) {
        let (mut engine, edge, blocked, derived) = mixed_engine();
        let mut edges: BTreeSet<(i64, i64)> = BTreeSet::new();
        let mut blocks: BTreeSet<i64> = BTreeSet::new();
        let mut views: BTreeMap<RelId, BTreeSet<Tuple>> = BTreeMap::new();

        for batch in batches {
            let mut tx = engine.begin();
            for (is_edge, x, y, insert) in batch {
                // Toggle an edge or a block, keeping input counts at 0 or 1
                let changed = match (is_edge, insert) {
                    (true, true) => edges.insert((x, y)),
                    (true, false) => edges.remove(&(x, y)),
                    (false, true) => blocks.insert(x),
                    (false, false) => blocks.remove(&x),
                };
                if !changed {
                    continue;
                }
                let weight = if insert { 1 } else { -1 };
                if is_edge {
                    tx.insert_weighted(edge, tuple![x, y], weight).unwrap();
                } else {
                    tx.insert_weighted(blocked, tuple![x], weight).unwrap();
                }
            }
            let commit = engine.commit(tx).unwrap();
            for &rel in &derived {
                let view = views.entry(rel).or_default();
                for change in commit.changes_for(rel) {
                    if change.diff > 0 {
                        prop_assert!(view.insert(change.data.clone()));
                    } else {
                        prop_assert!(view.remove(&change.data));
                    }
                }
            }

            let (mut fresh, fresh_edge, fresh_blocked, _) = mixed_engine();
            let mut tx = fresh.begin();
            for &(x, y) in &edges {
                tx.insert(fresh_edge, tuple![x, y]).unwrap();
            }
            for &x in &blocks {
                tx.insert(fresh_blocked, tuple![x]).unwrap();
            }
            fresh.commit(tx).unwrap();

            for &rel in &derived {
                let expected = fresh.state(rel);
                prop_assert_eq!(engine.state(rel), expected.clone(), "relation {}", rel);
                let view: Vec<Tuple> = views[&rel].iter().cloned().collect();
                prop_assert_eq!(view, expected, "emitted changes of relation {}", rel);
            }
        }
    }

    #[test]
    fn prop_retraction_restores_empty_state(edges in prop::collection::btree_set((0i64..6, 0i64..6), 0..12)) {
        let (mut engine, edge, path) = closure_engine();
        let mut tx = engine.begin();
        for &(x, y) in &edges {
            tx.insert(edge, tuple![x, y]).unwrap();
        }
        let inserted = engine.commit(tx).unwrap();

        let mut tx = engine.begin();
        for &(x, y) in &edges {
            tx.delete(edge, tuple![x, y]).unwrap();
        }
        let deleted = engine.commit(tx).unwrap();

        prop_assert!(engine.state(path).is_empty());
        prop_assert!(engine.state(edge).is_empty());
        let added: Vec<_> = inserted.added(path);
        let removed: Vec<_> = deleted.removed(path);
        prop_assert_eq!(added, removed);
    }

    #[test]
    fn prop_join_is_commutative(
        left in prop::collection::btree_set((0i64..4, 0i64..4), 0..10),
        right in prop::collection::btree_set((0i64..4, 0i64..4), 0..10),
    ) {
        // lr(a, k, b) <- l(a, k), r(k, b); rl(a, k, b) <- r(k, b), l(a, k)
        let mut builder = ProgramBuilder::new();
        let l = relation(&mut builder, "l", 2, true);
        let r = relation(&mut builder, "r", 2, true);
        let lr = relation(&mut builder, "lr", 3, false);
        let rl = relation(&mut builder, "rl", 3, false);
        let n = builder
            .join_with(l, [1], r, [0], |a: &Tuple, b: &Tuple| {
                Ok(Tuple::new(vec![a[0].clone(), a[1].clone(), b[1].clone()]))
            })
            .unwrap();
        builder.rule(lr, n).unwrap();
        let n = builder
            .join_with(r, [0], l, [1], |b: &Tuple, a: &Tuple| {
                Ok(Tuple::new(vec![a[0].clone(), a[1].clone(), b[1].clone()]))
            })
            .unwrap();
        builder.rule(rl, n).unwrap();
        let mut engine = Engine::new(builder.build().unwrap());

        // Left first, then right, then half of the left again
        let mut tx = engine.begin();
        for &(a, k) in &left {
            tx.insert(l, tuple![a, k]).unwrap();
        }
        engine.commit(tx).unwrap();
        let mut tx = engine.begin();
        for &(k, b) in &right {
            tx.insert(r, tuple![k, b]).unwrap();
        }
        for &(a, k) in left.iter().step_by(2) {
            tx.delete(l, tuple![a, k]).unwrap();
        }
        engine.commit(tx).unwrap();

        let expected: Vec<Tuple> = left
            .iter()
            .skip(1)
            .step_by(2)
            .flat_map(|&(a, k)| right.iter().filter(move |&&(k2, _)| k2 == k).map(move |&(_, b)| tuple![a, k, b]))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        prop_assert_eq!(engine.state(lr), expected.clone());
        prop_assert_eq!(engine.state(rl), expected);
    }

    #[test]
    fn prop_sum_is_order_independent(
        ops in prop::collection::vec((0i64..3, -20i64..20, any::<bool>()), 1..30),
        split in 0usize..30,
    ) {
        let mut builder = ProgramBuilder::new();
        let r = relation(&mut builder, "r", 2, true);
        let total = relation(&mut builder, "total", 2, false);
        let n = builder.aggregate(r, [0], Aggregator::Sum(1)).unwrap();
        builder.rule(total, n).unwrap();
        let mut engine = Engine::new(builder.build().unwrap());

        // Replay the operations as two commits, keeping the input a set
        let mut rows: BTreeSet<(i64, i64)> = BTreeSet::new();
        let mut batches = vec![Vec::new(), Vec::new()];
        for (i, (k, v, insert)) in ops.into_iter().enumerate() {
            let batch = &mut batches[usize::from(i >= split)];
            if insert && rows.insert((k, v)) {
                batch.push((r, tuple![k, v], 1));
            } else if !insert && rows.remove(&(k, v)) {
                batch.push((r, tuple![k, v], -1));
            }
        }
        engine.replay(batches).unwrap();

        let mut sums: BTreeMap<i64, i64> = BTreeMap::new();
        for &(k, v) in &rows {
            *sums.entry(k).or_default() += v;
        }
        let expected: Vec<Tuple> = sums.into_iter().map(|(k, s)| tuple![k, s]).collect();
        prop_assert_eq!(engine.state(total), expected);
    }
}
