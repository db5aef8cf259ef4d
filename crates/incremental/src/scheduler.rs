//! Stratified semi-naive scheduler.
//!
//! A commit runs in three steps:
//!
//! 1. The transaction's weighted tuples are added to the derivation counts of
//!    their input relations and the resulting presence transitions are
//!    published to the arrangements.
//! 2. Every stratum, in plan order, is seeded with the net presence changes of
//!    the relations it reads from earlier strata. A stratum without seeds is
//!    skipped.
//! 3. The net presence changes of every observable relation are returned.
//!
//! A non-recursive stratum runs one round. A recursive stratum keeps counting
//! derivations but cannot trust counts alone, since a cycle can keep a tuple
//! alive on its own. It first over-deletes every tuple that lost a derivation,
//! transitively, and then re-derives every tuple that still has support,
//! semi-naively, until nothing changes.
//!
//! Every round applies its input changes to the arrangements before the
//! operators run, so operators always see the state after the round's input.

use crate::arrangement::ArrangementStore;
use crate::change::{Change, ChangeBatch, ChangeBatchExt, Timestamp, Weight};
use crate::dataflow::{Node, NodeId, OperatorGraph, Program, RelId};
use crate::journal::Journal;
use crate::operators::{
    antijoin_changes, filter_changes, flat_map_changes, inspect_changes, join_changes, map_changes,
    AggregateState, Diagnostic, EvalStats, JoinSide,
};
use crate::planner::Stratum;
use crate::state::{DataflowState, NodeHandles};
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::vec::Vec;
use hashbrown::HashMap;
use stratalog_core::{Error, EvalError, Result, Tuple};
use tracing::{debug, trace, warn};

/// Default bound on the rounds a single stratum may run in one commit.
pub const DEFAULT_ITERATION_LIMIT: u32 = 10_000;

/// Progress of one stratum during a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StratumState {
    /// No input changed; the stratum did not run.
    Idle,
    /// Running its `iteration`-th round.
    Iterating { iteration: u32 },
    /// Reached a fixpoint after `iterations` rounds.
    Converged { iterations: u32 },
}

/// Final state of one stratum after a commit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StratumReport {
    /// The stratum id.
    pub stratum: usize,
    /// Where the stratum ended.
    pub state: StratumState,
}

/// Counters collected during one commit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// One report per stratum, in evaluation order.
    pub strata: Vec<StratumReport>,
    /// Outputs dropped because an expression failed.
    pub eval_failures: u64,
    /// Changes returned to the caller.
    pub changes_emitted: usize,
}

impl CommitStats {
    /// Returns the total number of rounds run.
    pub fn rounds(&self) -> u32 {
        self.strata
            .iter()
            .map(|r| match r.state {
                StratumState::Converged { iterations } => iterations,
                StratumState::Iterating { iteration } => iteration,
                StratumState::Idle => 0,
            })
            .sum()
    }
}

/// Result of a successful run.
#[derive(Clone, Debug, Default)]
pub struct Outcome {
    /// Net presence changes of every observable relation that changed,
    /// sorted by tuple.
    pub changes: BTreeMap<RelId, ChangeBatch<Tuple>>,
    /// Commit counters.
    pub stats: CommitStats,
    /// Failed inspect callbacks.
    pub diagnostics: Vec<Diagnostic>,
}

/// Drives the strata of a program to a fixpoint for one commit.
#[derive(Clone, Copy, Debug)]
pub struct Scheduler {
    iteration_limit: u32,
    collect_diagnostics: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Tuples per relation.
type TupleSets = BTreeMap<RelId, BTreeSet<Tuple>>;

/// Changes per relation.
type Deltas = HashMap<RelId, ChangeBatch<Tuple>>;

impl Scheduler {
    /// Creates a scheduler with the default iteration limit.
    pub fn new() -> Self {
        Self {
            iteration_limit: DEFAULT_ITERATION_LIMIT,
            collect_diagnostics: true,
        }
    }

    /// Sets the bound on the rounds a stratum may run in one commit.
    pub fn with_iteration_limit(mut self, limit: u32) -> Self {
        self.iteration_limit = limit;
        self
    }

    /// Sets whether failed inspect callbacks are returned in the outcome.
    /// They are logged either way.
    pub fn with_diagnostics(mut self, collect: bool) -> Self {
        self.collect_diagnostics = collect;
        self
    }

    /// Returns the iteration limit.
    pub fn iteration_limit(&self) -> u32 {
        self.iteration_limit
    }

    /// Runs one commit.
    ///
    /// Every mutation of `state` is recorded in `journal`. On error the
    /// caller is expected to roll the journal back.
    pub fn run(
        &self,
        program: &Program,
        state: &mut DataflowState,
        journal: &mut Journal,
        epoch: u64,
        inputs: &[(RelId, Tuple, Weight)],
    ) -> Result<Outcome> {
        let time = Timestamp::at_epoch(epoch);
        let mut run = Run {
            scheduler: self,
            program,
            state,
            journal,
            epoch,
            changed: BTreeMap::new(),
            stats: EvalStats::default(),
            diagnostics: Vec::new(),
        };

        let mut touched = TupleSets::new();
        for (relation, tuple, weight) in inputs {
            program.catalog().require(*relation)?;
            run.state.add_count(*relation, tuple, *weight, run.journal);
            touched.entry(*relation).or_default().insert(tuple.clone());
        }
        for (relation, tuples) in &touched {
            let transitions = run.state.pending_transitions(*relation, tuples, time);
            run.publish(*relation, transitions);
        }
        trace!(epoch, inputs = inputs.len(), "inputs applied");

        let mut reports = Vec::with_capacity(program.plan().strata().len());
        for stratum in program.plan().strata() {
            let seeds = run.seeds(stratum);
            let state = if seeds.is_empty() {
                StratumState::Idle
            } else if stratum.recursive {
                run.recursive(stratum, seeds)?
            } else {
                run.once(stratum, seeds)
            };
            debug!(stratum = stratum.id, ?state, "stratum finished");
            reports.push(StratumReport {
                stratum: stratum.id,
                state,
            });
        }

        let mut changes = BTreeMap::new();
        for (relation, batch) in core::mem::take(&mut run.changed) {
            let observable = program
                .catalog()
                .relation(relation)
                .is_some_and(|r| r.role().is_observable());
            let batch = batch.consolidate();
            if observable && !batch.is_empty() {
                changes.insert(relation, batch);
            }
        }

        let stats = CommitStats {
            strata: reports,
            eval_failures: run.stats.eval_failures,
            changes_emitted: changes.values().map(Vec::len).sum(),
        };
        debug!(
            epoch,
            changes = stats.changes_emitted,
            rounds = stats.rounds(),
            eval_failures = stats.eval_failures,
            "commit evaluated"
        );
        Ok(Outcome {
            changes,
            stats,
            diagnostics: run.diagnostics,
        })
    }
}

/// State of one running commit.
struct Run<'a> {
    scheduler: &'a Scheduler,
    program: &'a Program,
    state: &'a mut DataflowState,
    journal: &'a mut Journal,
    epoch: u64,
    /// Presence transitions of every relation since the commit started
    changed: BTreeMap<RelId, ChangeBatch<Tuple>>,
    stats: EvalStats,
    diagnostics: Vec<Diagnostic>,
}

impl Run<'_> {
    fn time(&self, iteration: u32) -> Timestamp {
        Timestamp::new(self.epoch, iteration)
    }

    fn publish(&mut self, relation: RelId, transitions: ChangeBatch<Tuple>) {
        if transitions.is_empty() {
            return;
        }
        self.state.publish(relation, &transitions, self.journal);
        self.changed.entry(relation).or_default().extend(transitions);
    }

    /// Net changes of the relations a stratum reads from earlier strata.
    fn seeds(&self, stratum: &Stratum) -> Deltas {
        stratum
            .reads
            .iter()
            .filter(|relation| !stratum.relations.contains(relation))
            .filter_map(|relation| {
                let batch = self.changed.get(relation)?.clone().consolidate();
                (!batch.is_empty()).then_some((*relation, batch))
            })
            .collect()
    }

    /// Starts round `iteration`, failing once the limit is reached.
    fn enter_round(&self, stratum: &Stratum, iteration: u32) -> Result<()> {
        if iteration >= self.scheduler.iteration_limit {
            warn!(stratum = stratum.id, iteration, "stratum did not converge");
            return Err(Error::divergence(stratum.id, iteration));
        }
        trace!(stratum = stratum.id, state = ?StratumState::Iterating { iteration }, "round");
        Ok(())
    }

    /// Evaluates every rule of the stratum that reads a changed relation.
    fn round(&mut self, stratum: &Stratum, deltas: &Deltas) -> BTreeMap<RelId, ChangeBatch<Tuple>> {
        let program = self.program;
        let graph = program.graph();
        let (arrangements, handles, aggregates) = self.state.split();
        let mut evaluator = Evaluator {
            graph,
            arrangements,
            handles,
            aggregates,
            journal: &mut *self.journal,
            deltas,
            stats: &mut self.stats,
            diagnostics: &mut self.diagnostics,
            collect_diagnostics: self.scheduler.collect_diagnostics,
            cache: HashMap::new(),
        };

        let mut outputs: BTreeMap<RelId, ChangeBatch<Tuple>> = BTreeMap::new();
        for &index in &stratum.rules {
            let Some(rule) = program.rules().get(index) else {
                continue;
            };
            let reads_change = graph
                .dependencies(rule.body)
                .iter()
                .any(|(relation, _)| deltas.get(relation).is_some_and(|d| !d.is_empty()));
            if !reads_change {
                continue;
            }
            let Some(head) = program.catalog().relation(rule.head) else {
                continue;
            };
            let produced = evaluator.eval(rule.body);
            let target = outputs.entry(rule.head).or_default();
            for change in produced {
                match head.check_tuple(&change.data) {
                    Ok(()) => target.push(change),
                    Err(error) => evaluator
                        .stats
                        .record_failure(rule.body, &EvalError::Schema(format!("{}", error))),
                }
            }
        }
        outputs
    }

    /// Adds round outputs to the derivation counts.
    ///
    /// Records every output tuple in `touched`, including those whose
    /// derivations cancel out, and returns the present tuples that lost at
    /// least one derivation.
    fn absorb(&mut self, outputs: BTreeMap<RelId, ChangeBatch<Tuple>>, touched: &mut TupleSets) -> TupleSets {
        let mut lost = TupleSets::new();
        for (relation, batch) in outputs {
            let collection = self.state.collection(relation);
            let seen = touched.entry(relation).or_default();
            for change in &batch {
                if change.diff < 0 && collection.is_some_and(|c| c.contains(&change.data)) {
                    lost.entry(relation).or_default().insert(change.data.clone());
                }
                seen.insert(change.data.clone());
            }
            for change in batch.consolidate() {
                self.state.add_count(relation, &change.data, change.diff, self.journal);
            }
        }
        lost
    }

    fn once(&mut self, stratum: &Stratum, seeds: Deltas) -> StratumState {
        let time = self.time(0);
        trace!(stratum = stratum.id, state = ?StratumState::Iterating { iteration: 0 }, "round");
        let outputs = self.round(stratum, &seeds);
        let mut touched = TupleSets::new();
        self.absorb(outputs, &mut touched);
        for (relation, tuples) in &touched {
            let transitions = self.state.pending_transitions(*relation, tuples, time);
            self.publish(*relation, transitions);
        }
        StratumState::Converged { iterations: 1 }
    }

    fn recursive(&mut self, stratum: &Stratum, seeds: Deltas) -> Result<StratumState> {
        let mut iteration = 0;
        let mut touched = TupleSets::new();

        self.enter_round(stratum, iteration)?;
        let outputs = self.round(stratum, &seeds);
        let mut lost = self.absorb(outputs, &mut touched);
        iteration += 1;

        // Over-delete everything that lost a derivation
        loop {
            let time = self.time(iteration);
            let mut deltas = Deltas::new();
            for (relation, tuples) in &lost {
                let collection = self.state.collection(*relation);
                let removals: ChangeBatch<Tuple> = tuples
                    .iter()
                    .filter(|t| collection.is_some_and(|c| c.contains(t)))
                    .map(|t| Change::delete(t.clone(), time))
                    .collect();
                if !removals.is_empty() {
                    deltas.insert(*relation, removals);
                }
            }
            if deltas.is_empty() {
                break;
            }
            for (relation, removals) in &deltas {
                self.publish(*relation, removals.clone());
            }
            self.enter_round(stratum, iteration)?;
            let outputs = self.round(stratum, &deltas);
            lost = self.absorb(outputs, &mut touched);
            iteration += 1;
        }

        // Re-derive what still has support, then propagate insertions
        let mut candidates = touched.clone();
        loop {
            let time = self.time(iteration);
            let mut deltas = Deltas::new();
            for (relation, tuples) in &candidates {
                let insertions: ChangeBatch<Tuple> = self
                    .state
                    .pending_transitions(*relation, tuples, time)
                    .into_iter()
                    .filter(|c| c.is_insert())
                    .collect();
                if !insertions.is_empty() {
                    deltas.insert(*relation, insertions);
                }
            }
            if deltas.is_empty() {
                break;
            }
            for (relation, insertions) in &deltas {
                self.publish(*relation, insertions.clone());
            }
            self.enter_round(stratum, iteration)?;
            let outputs = self.round(stratum, &deltas);
            candidates = TupleSets::new();
            for (relation, batch) in &outputs {
                candidates
                    .entry(*relation)
                    .or_default()
                    .extend(batch.iter().map(|c| c.data.clone()));
            }
            self.absorb(outputs, &mut touched);
            iteration += 1;
        }

        Ok(StratumState::Converged {
            iterations: iteration,
        })
    }
}

/// Evaluates operator trees for one round.
struct Evaluator<'a> {
    graph: &'a OperatorGraph,
    arrangements: &'a ArrangementStore,
    handles: &'a [NodeHandles],
    aggregates: &'a mut HashMap<NodeId, AggregateState>,
    journal: &'a mut Journal,
    deltas: &'a Deltas,
    stats: &'a mut EvalStats,
    diagnostics: &'a mut Vec<Diagnostic>,
    collect_diagnostics: bool,
    /// Outputs of stateful nodes, so a shared node runs once per round
    cache: HashMap<NodeId, ChangeBatch<Tuple>>,
}

impl Evaluator<'_> {
    fn delta(&self, relation: RelId) -> &[Change<Tuple>] {
        self.deltas.get(&relation).map(Vec::as_slice).unwrap_or(&[])
    }

    fn eval(&mut self, id: NodeId) -> ChangeBatch<Tuple> {
        if let Some(cached) = self.cache.get(&id) {
            return cached.clone();
        }
        let graph = self.graph;
        let arrangements = self.arrangements;
        let Some(node) = graph.get_node(id) else {
            return Vec::new();
        };
        let handles = self.handles.get(id).copied().unwrap_or(NodeHandles::None);

        match (node, handles) {
            (Node::Scan { relation }, _) => self.delta(*relation).to_vec(),
            (Node::Map { input, f }, _) => {
                let input = self.eval(*input);
                map_changes(id, input, |t: &Tuple| f(t), self.stats)
            }
            (Node::Filter { input, predicate }, _) => {
                let input = self.eval(*input);
                filter_changes(id, input, |t: &Tuple| predicate(t), self.stats)
            }
            (Node::FlatMap { input, f }, _) => {
                let input = self.eval(*input);
                flat_map_changes(id, input, |t: &Tuple| f(t), self.stats)
            }
            (
                Node::Join {
                    left,
                    left_key,
                    right,
                    right_key,
                    combine,
                },
                NodeHandles::Join {
                    left: left_handle,
                    right: right_handle,
                },
            ) => {
                let deltas = self.deltas;
                let delta = |relation: &RelId| deltas.get(relation).map(Vec::as_slice).unwrap_or(&[]);
                join_changes(
                    id,
                    JoinSide {
                        delta: delta(left),
                        key: left_key,
                        arrangement: arrangements.get(left_handle),
                    },
                    JoinSide {
                        delta: delta(right),
                        key: right_key,
                        arrangement: arrangements.get(right_handle),
                    },
                    |l: &Tuple, r: &Tuple| combine(l, r),
                    self.stats,
                )
            }
            (
                Node::Antijoin {
                    positive,
                    positive_key,
                    negative,
                    negative_key,
                },
                NodeHandles::Antijoin {
                    positive: positive_handle,
                    negative: negative_handle,
                },
            ) => antijoin_changes(
                JoinSide {
                    delta: self.delta(*positive),
                    key: positive_key,
                    arrangement: arrangements.get(positive_handle),
                },
                JoinSide {
                    delta: self.delta(*negative),
                    key: negative_key,
                    arrangement: arrangements.get(negative_handle),
                },
            ),
            (
                Node::Aggregate {
                    input,
                    group_key,
                    aggregator,
                    output,
                },
                NodeHandles::Aggregate { input: input_handle },
            ) => {
                let deltas = self.deltas;
                let input = deltas.get(input).map(Vec::as_slice).unwrap_or(&[]);
                let journal = &mut *self.journal;
                let out = self.aggregates.entry(id).or_default().process(
                    id,
                    aggregator,
                    group_key,
                    |key: &Tuple, value: &stratalog_core::Value| output(key, value),
                    input,
                    arrangements.get(input_handle),
                    self.stats,
                    |key, previous| journal.record_group(id, key.clone(), previous.cloned()),
                );
                self.cache.insert(id, out.clone());
                out
            }
            (Node::Inspect { input, sink }, _) => {
                let input = self.eval(*input);
                let out = if self.collect_diagnostics {
                    inspect_changes(id, input, &**sink, self.diagnostics)
                } else {
                    inspect_changes(id, input, &**sink, &mut Vec::new())
                };
                self.cache.insert(id, out.clone());
                out
            }
            (node, _) => {
                warn!(node = id, kind = node.kind(), "node has no arrangements");
                Vec::new()
            }
        }
    }
}
