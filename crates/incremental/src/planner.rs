//! Stratification planner.
//!
//! Builds the dependency graph between relations (an edge from a rule head to
//! every relation its body reads, marked negative for antijoin negative sides
//! and aggregate inputs), splits it into strongly connected components and
//! orders them so that every stratum comes after the strata it reads from.
//!
//! A negative edge inside a component would make a relation depend on its own
//! absence, which has no stable meaning; such programs are rejected.

use crate::dataflow::{Node, NodeId, OperatorGraph, Polarity, RelId, Rule};
use crate::dataflow::Catalog;
use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use stratalog_core::{Error, Result};
use tracing::debug;

/// A group of mutually recursive relations, evaluated as a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stratum {
    /// Position in evaluation order.
    pub id: usize,
    /// Relations defined by this stratum, sorted.
    pub relations: Vec<RelId>,
    /// Indexes of the rules defining those relations.
    pub rules: Vec<usize>,
    /// True if a relation of the stratum depends on the stratum itself.
    pub recursive: bool,
    /// Every relation read by the stratum's rules, sorted.
    pub reads: Vec<RelId>,
}

/// Strata in evaluation order.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    strata: Vec<Stratum>,
    stratum_of: Vec<Option<usize>>,
}

impl Plan {
    /// Returns the strata in evaluation order.
    pub fn strata(&self) -> &[Stratum] {
        &self.strata
    }

    /// Returns the stratum defining `relation`, if any.
    ///
    /// Input relations and relations without rules belong to no stratum.
    pub fn stratum_of(&self, relation: RelId) -> Option<usize> {
        self.stratum_of.get(relation).copied().flatten()
    }
}

/// Stratifies `rules` over the relations of `catalog`.
pub fn plan(catalog: &Catalog, graph: &OperatorGraph, rules: &[Rule]) -> Result<Plan> {
    let mut deps = DiGraph::<RelId, Polarity>::with_capacity(catalog.len(), rules.len());
    let indices: Vec<NodeIndex> = (0..catalog.len()).map(|rel| deps.add_node(rel)).collect();

    let mut rule_deps = Vec::with_capacity(rules.len());
    for rule in rules {
        let relation = catalog.require(rule.head)?;
        if relation.is_input() {
            return Err(Error::invalid_plan(format!(
                "input relation {} cannot be the head of a rule",
                relation.name()
            )));
        }
        if graph.get_node(rule.body).is_none() {
            return Err(Error::invalid_plan(format!(
                "rule for {} refers to unknown node {}",
                relation.name(),
                rule.body
            )));
        }
        let reads = graph.dependencies(rule.body);
        for &(dep, polarity) in &reads {
            catalog.require(dep)?;
            deps.add_edge(indices[rule.head], indices[dep], polarity);
        }
        rule_deps.push(reads);
    }

    // Components come out dependencies first
    let components = tarjan_scc(&deps);
    let mut component_of = vec![0usize; catalog.len()];
    for (c, component) in components.iter().enumerate() {
        for &index in component {
            component_of[deps[index]] = c;
        }
    }

    for (rule, reads) in rules.iter().zip(&rule_deps) {
        for &(dep, polarity) in reads {
            if polarity == Polarity::Negative && component_of[dep] == component_of[rule.head] {
                let mut cycle: Vec<String> = components[component_of[rule.head]]
                    .iter()
                    .map(|&index| catalog.name(deps[index]))
                    .collect();
                cycle.sort();
                return Err(Error::stratification(cycle));
            }
        }
    }

    let mut rules_of: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, rule) in rules.iter().enumerate() {
        rules_of.entry(component_of[rule.head]).or_default().push(i);
    }

    let mut strata = Vec::new();
    let mut stratum_of = vec![None; catalog.len()];
    for (c, component) in components.iter().enumerate() {
        let Some(rule_ids) = rules_of.remove(&c) else {
            continue;
        };
        let id = strata.len();
        let mut relations: Vec<RelId> = component.iter().map(|&index| deps[index]).collect();
        relations.sort_unstable();
        for &relation in &relations {
            stratum_of[relation] = Some(id);
        }

        let mut reads = BTreeSet::new();
        let mut self_edge = false;
        for &r in &rule_ids {
            for &(dep, _) in &rule_deps[r] {
                reads.insert(dep);
                self_edge |= component_of[dep] == c;
            }
        }
        let recursive = relations.len() > 1 || self_edge;
        debug!(stratum = id, ?relations, recursive, "planned stratum");
        strata.push(Stratum {
            id,
            relations,
            rules: rule_ids,
            recursive,
            reads: reads.into_iter().collect(),
        });
    }

    check_aggregates(graph, rules, &stratum_of)?;

    Ok(Plan { strata, stratum_of })
}

/// Aggregate state is folded once per change, so an aggregate node may only
/// be evaluated by one stratum.
fn check_aggregates(graph: &OperatorGraph, rules: &[Rule], stratum_of: &[Option<usize>]) -> Result<()> {
    let mut owner: HashMap<NodeId, Option<usize>> = HashMap::new();
    for rule in rules {
        let stratum = stratum_of.get(rule.head).copied().flatten();
        for id in graph.subtree(rule.body) {
            if let Some(Node::Aggregate { .. }) = graph.get_node(id) {
                match owner.get(&id) {
                    Some(&existing) if existing != stratum => {
                        return Err(Error::invalid_plan(format!(
                            "aggregate node {} is shared between strata",
                            id
                        )));
                    }
                    _ => {
                        owner.insert(id, stratum);
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::ProgramBuilder;
    use crate::operators::Aggregator;
    use stratalog_core::schema::RelationBuilder;
    use stratalog_core::{DataType, Tuple};

    fn unary(builder: &mut ProgramBuilder, name: &str, input: bool) -> RelId {
        let relation = RelationBuilder::new(name)
            .unwrap()
            .add_column("x", DataType::Int)
            .unwrap();
        let relation = if input { relation.input() } else { relation.output() };
        builder.relation(relation.build().unwrap()).unwrap()
    }

    #[test]
    fn test_layered_strata_order() {
        // a <- input; b <- a; c <- b \ a
        let mut builder = ProgramBuilder::new();
        let input = unary(&mut builder, "input", true);
        let c = unary(&mut builder, "c", false);
        let b = unary(&mut builder, "b", false);
        let a = unary(&mut builder, "a", false);

        let n = builder.scan(input).unwrap();
        builder.rule(a, n).unwrap();
        let n = builder.scan(a).unwrap();
        builder.rule(b, n).unwrap();
        let n = builder.antijoin(b, [0], a, [0]).unwrap();
        builder.rule(c, n).unwrap();

        let program = builder.build().unwrap();
        let plan = program.plan();
        let order: Vec<Vec<RelId>> = plan.strata().iter().map(|s| s.relations.clone()).collect();
        assert_eq!(order, vec![vec![a], vec![b], vec![c]]);
        assert!(plan.strata().iter().all(|s| !s.recursive));
        assert_eq!(plan.stratum_of(input), None);
        assert_eq!(plan.stratum_of(c), Some(2));
        assert_eq!(plan.strata()[2].reads, {
            let mut reads = vec![a, b];
            reads.sort();
            reads
        });
    }

    #[test]
    fn test_mutual_recursion_single_stratum() {
        let mut builder = ProgramBuilder::new();
        let seed = unary(&mut builder, "seed", true);
        let even = unary(&mut builder, "even", false);
        let odd = unary(&mut builder, "odd", false);

        let n = builder.scan(seed).unwrap();
        builder.rule(even, n).unwrap();
        let n = builder.scan(even).unwrap();
        let n = builder.map(n, |t: &Tuple| Ok(t.clone())).unwrap();
        builder.rule(odd, n).unwrap();
        let n = builder.scan(odd).unwrap();
        builder.rule(even, n).unwrap();

        let program = builder.build().unwrap();
        let strata = program.plan().strata();
        assert_eq!(strata.len(), 1);
        assert_eq!(strata[0].relations, vec![even, odd]);
        assert_eq!(strata[0].rules, vec![0, 1, 2]);
        assert!(strata[0].recursive);
    }

    #[test]
    fn test_self_edge_is_recursive() {
        let mut builder = ProgramBuilder::new();
        let seed = unary(&mut builder, "seed", true);
        let reach = unary(&mut builder, "reach", false);
        let n = builder.scan(seed).unwrap();
        builder.rule(reach, n).unwrap();
        let n = builder.scan(reach).unwrap();
        builder.rule(reach, n).unwrap();
        let program = builder.build().unwrap();
        assert!(program.plan().strata()[0].recursive);
    }

    #[test]
    fn test_negation_through_recursion_rejected() {
        // win(x) <- move(x) \ win(x)
        let mut builder = ProgramBuilder::new();
        let moves = unary(&mut builder, "move", true);
        let win = unary(&mut builder, "win", false);
        let n = builder.antijoin(moves, [0], win, [0]).unwrap();
        builder.rule(win, n).unwrap();
        let err = builder.build().unwrap_err();
        assert_eq!(err, Error::stratification(vec!["win".into()]));
    }

    #[test]
    fn test_aggregation_through_recursion_rejected() {
        let mut builder = ProgramBuilder::new();
        let seed = unary(&mut builder, "seed", true);
        let total = unary(&mut builder, "total", false);
        let count = unary(&mut builder, "count", false);
        let n = builder.scan(seed).unwrap();
        builder.rule(total, n).unwrap();
        let n = builder.aggregate(total, [], Aggregator::Count).unwrap();
        builder.rule(count, n).unwrap();
        let n = builder.scan(count).unwrap();
        builder.rule(total, n).unwrap();

        match builder.build().unwrap_err() {
            Error::Stratification { cycle } => assert_eq!(cycle, vec!["count", "total"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_relation_without_rules_has_no_stratum() {
        let mut builder = ProgramBuilder::new();
        let _seed = unary(&mut builder, "seed", true);
        let idle = unary(&mut builder, "idle", false);
        let program = builder.build().unwrap();
        assert!(program.plan().strata().is_empty());
        assert_eq!(program.plan().stratum_of(idle), None);
    }
}
