//! Programs: relations, operator graph and rules.
//!
//! A program is assembled with [`ProgramBuilder`]. Every node is validated as
//! it is added, and `build` runs the stratification planner, so a `Program`
//! that exists is always executable.

use crate::dataflow::graph::OperatorGraph;
use crate::dataflow::node::{Node, NodeId, RelId};
use crate::operators::{Aggregator, InspectSink};
use crate::planner::{self, Plan};
use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use hashbrown::HashMap;
use stratalog_core::schema::Relation;
use stratalog_core::{Error, EvalError, KeyProjection, Result, Tuple, Value};
use tracing::debug;

/// Relation schemas of a program, addressed by [`RelId`] or by name.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    relations: Vec<Relation>,
    names: HashMap<String, RelId>,
}

impl Catalog {
    /// Returns a relation by id.
    pub fn relation(&self, id: RelId) -> Option<&Relation> {
        self.relations.get(id)
    }

    /// Returns the id of a relation by name.
    pub fn id(&self, name: &str) -> Option<RelId> {
        self.names.get(name).copied()
    }

    /// Returns a relation by id or an `UnknownRelation` error.
    pub fn require(&self, id: RelId) -> Result<&Relation> {
        self.relations
            .get(id)
            .ok_or_else(|| Error::unknown_relation(format!("#{}", id)))
    }

    /// Returns the number of relations.
    pub fn len(&self) -> usize {
        self.relations.len()
    }

    /// Returns true if the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Iterates over every relation with its id.
    pub fn iter(&self) -> impl Iterator<Item = (RelId, &Relation)> + '_ {
        self.relations.iter().enumerate()
    }

    /// Returns the name of a relation, or a placeholder for unknown ids.
    pub fn name(&self, id: RelId) -> String {
        match self.relations.get(id) {
            Some(relation) => relation.name().to_string(),
            None => format!("#{}", id),
        }
    }

    fn add(&mut self, relation: Relation) -> Result<RelId> {
        if self.names.contains_key(relation.name()) {
            return Err(Error::invalid_schema(format!(
                "relation {} is defined twice",
                relation.name()
            )));
        }
        let id = self.relations.len();
        self.names.insert(relation.name().to_string(), id);
        self.relations.push(relation);
        Ok(id)
    }
}

/// `head ← body`: every change produced by `body` is a change of `head`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rule {
    /// The derived relation.
    pub head: RelId,
    /// Root of the operator tree computing the head's tuples.
    pub body: NodeId,
}

/// A validated, stratified program.
#[derive(Debug)]
pub struct Program {
    catalog: Arc<Catalog>,
    graph: OperatorGraph,
    rules: Vec<Rule>,
    plan: Plan,
}

impl Program {
    /// Returns the relation catalog.
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Returns the operator graph.
    pub fn graph(&self) -> &OperatorGraph {
        &self.graph
    }

    /// Returns every rule.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns the evaluation plan.
    pub fn plan(&self) -> &Plan {
        &self.plan
    }
}

/// Incremental builder for [`Program`]s.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    catalog: Catalog,
    graph: OperatorGraph,
    rules: Vec<Rule>,
}

impl ProgramBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a relation and returns its id.
    pub fn relation(&mut self, relation: Relation) -> Result<RelId> {
        self.catalog.add(relation)
    }

    /// Returns the id of a declared relation.
    pub fn relation_id(&self, name: &str) -> Result<RelId> {
        self.catalog
            .id(name)
            .ok_or_else(|| Error::unknown_relation(name))
    }

    /// Adds a node producing the changes of `relation`.
    pub fn scan(&mut self, relation: RelId) -> Result<NodeId> {
        self.catalog.require(relation)?;
        self.graph.add_node(Node::Scan { relation })
    }

    /// Adds a per-change transformation.
    pub fn map<F>(&mut self, input: NodeId, f: F) -> Result<NodeId>
    where
        F: Fn(&Tuple) -> core::result::Result<Tuple, EvalError> + Send + Sync + 'static,
    {
        self.graph.add_node(Node::Map {
            input,
            f: Box::new(f),
        })
    }

    /// Adds a per-change predicate.
    pub fn filter<F>(&mut self, input: NodeId, predicate: F) -> Result<NodeId>
    where
        F: Fn(&Tuple) -> core::result::Result<bool, EvalError> + Send + Sync + 'static,
    {
        self.graph.add_node(Node::Filter {
            input,
            predicate: Box::new(predicate),
        })
    }

    /// Adds a per-change expansion.
    pub fn flat_map<F>(&mut self, input: NodeId, f: F) -> Result<NodeId>
    where
        F: Fn(&Tuple) -> core::result::Result<Vec<Tuple>, EvalError> + Send + Sync + 'static,
    {
        self.graph.add_node(Node::FlatMap {
            input,
            f: Box::new(f),
        })
    }

    /// Adds an equi-join whose output is the left tuple followed by the
    /// right tuple.
    pub fn join(
        &mut self,
        left: RelId,
        left_key: impl Into<KeyProjection>,
        right: RelId,
        right_key: impl Into<KeyProjection>,
    ) -> Result<NodeId> {
        self.join_with(left, left_key, right, right_key, |l: &Tuple, r: &Tuple| {
            Ok(l.concat(r))
        })
    }

    /// Adds an equi-join with a custom output.
    pub fn join_with<F>(
        &mut self,
        left: RelId,
        left_key: impl Into<KeyProjection>,
        right: RelId,
        right_key: impl Into<KeyProjection>,
        combine: F,
    ) -> Result<NodeId>
    where
        F: Fn(&Tuple, &Tuple) -> core::result::Result<Tuple, EvalError> + Send + Sync + 'static,
    {
        let left_key = left_key.into();
        let right_key = right_key.into();
        self.check_projection(left, &left_key)?;
        self.check_projection(right, &right_key)?;
        if left_key.len() != right_key.len() {
            return Err(Error::invalid_projection(
                self.catalog.name(left),
                format!(
                    "join key has {} columns but the key of {} has {}",
                    left_key.len(),
                    self.catalog.name(right),
                    right_key.len()
                ),
            ));
        }
        self.graph.add_node(Node::Join {
            left,
            left_key,
            right,
            right_key,
            combine: Box::new(combine),
        })
    }

    /// Adds an antijoin: tuples of `positive` without a match in `negative`.
    pub fn antijoin(
        &mut self,
        positive: RelId,
        positive_key: impl Into<KeyProjection>,
        negative: RelId,
        negative_key: impl Into<KeyProjection>,
    ) -> Result<NodeId> {
        let positive_key = positive_key.into();
        let negative_key = negative_key.into();
        self.check_projection(positive, &positive_key)?;
        self.check_projection(negative, &negative_key)?;
        if positive_key.len() != negative_key.len() {
            return Err(Error::invalid_projection(
                self.catalog.name(positive),
                format!(
                    "antijoin key has {} columns but the key of {} has {}",
                    positive_key.len(),
                    self.catalog.name(negative),
                    negative_key.len()
                ),
            ));
        }
        self.graph.add_node(Node::Antijoin {
            positive,
            positive_key,
            negative,
            negative_key,
        })
    }

    /// Adds a grouped aggregation whose output is the group key followed by
    /// the aggregate value.
    pub fn aggregate(
        &mut self,
        input: RelId,
        group_key: impl Into<KeyProjection>,
        aggregator: Aggregator,
    ) -> Result<NodeId> {
        self.aggregate_with(input, group_key, aggregator, |key: &Tuple, value: &Value| {
            Ok(key.concat(&Tuple::new(vec![value.clone()])))
        })
    }

    /// Adds a grouped aggregation with a custom output.
    pub fn aggregate_with<F>(
        &mut self,
        input: RelId,
        group_key: impl Into<KeyProjection>,
        aggregator: Aggregator,
        output: F,
    ) -> Result<NodeId>
    where
        F: Fn(&Tuple, &Value) -> core::result::Result<Tuple, EvalError> + Send + Sync + 'static,
    {
        let group_key = group_key.into();
        self.check_projection(input, &group_key)?;
        if let Some(column) = aggregator.column() {
            self.check_projection(input, &KeyProjection::new(vec![column]))?;
        }
        self.graph.add_node(Node::Aggregate {
            input,
            group_key,
            aggregator,
            output: Box::new(output),
        })
    }

    /// Adds a pass-through node reporting every change to `sink`.
    pub fn inspect<S>(&mut self, input: NodeId, sink: S) -> Result<NodeId>
    where
        S: InspectSink + 'static,
    {
        self.graph.add_node(Node::Inspect {
            input,
            sink: Box::new(sink),
        })
    }

    /// Declares that every change of `body` is a change of `head`.
    pub fn rule(&mut self, head: RelId, body: NodeId) -> Result<()> {
        let relation = self.catalog.require(head)?;
        if relation.is_input() {
            return Err(Error::invalid_plan(format!(
                "input relation {} cannot be the head of a rule",
                relation.name()
            )));
        }
        if self.graph.get_node(body).is_none() {
            return Err(Error::invalid_plan(format!(
                "rule for {} refers to unknown node {}",
                relation.name(),
                body
            )));
        }
        self.rules.push(Rule { head, body });
        Ok(())
    }

    /// Stratifies the program.
    pub fn build(self) -> Result<Program> {
        let plan = planner::plan(&self.catalog, &self.graph, &self.rules)?;
        debug!(
            relations = self.catalog.len(),
            nodes = self.graph.len(),
            rules = self.rules.len(),
            strata = plan.strata().len(),
            "program built"
        );
        Ok(Program {
            catalog: Arc::new(self.catalog),
            graph: self.graph,
            rules: self.rules,
            plan,
        })
    }

    fn check_projection(&self, relation: RelId, key: &KeyProjection) -> Result<()> {
        let schema = self.catalog.require(relation)?;
        match key.out_of_range(schema.arity()) {
            Some(column) => Err(Error::invalid_projection(
                schema.name(),
                format!("column {} is out of range for arity {}", column, schema.arity()),
            )),
            None => Ok(()),
        }
    }
}
