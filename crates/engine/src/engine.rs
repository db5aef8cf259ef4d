//! The engine: a built program, its evaluation state and its subscribers.

use crate::commit::Commit;
use crate::config::EngineConfig;
use crate::transaction::{Transaction, TransactionId};
use alloc::format;
use alloc::sync::Arc;
use alloc::vec::Vec;
use stratalog_core::{Error, InternTable, Interned, Result, Tuple, Value};
use stratalog_incremental::{Catalog, DataflowState, Journal, Program, RelId, Scheduler, Weight};
use stratalog_reactive::{ChangeSet, SubscriptionId, SubscriptionRegistry};
use tracing::{debug, warn};

/// An incremental Datalog engine.
///
/// The engine owns a stratified [`Program`] and keeps its derived relations
/// consistent with its input relations, one transaction at a time.
///
/// # Example
///
/// ```rust
/// use stratalog_core::schema::RelationBuilder;
/// use stratalog_core::{tuple, DataType};
/// use stratalog_engine::Engine;
/// use stratalog_incremental::{Aggregator, ProgramBuilder};
///
/// let mut builder = ProgramBuilder::new();
/// let sale = builder.relation(
///     RelationBuilder::new("sale").unwrap()
///         .add_column("region", DataType::String).unwrap()
///         .add_column("amount", DataType::Int).unwrap()
///         .input()
///         .build().unwrap(),
/// ).unwrap();
/// let total = builder.relation(
///     RelationBuilder::new("total").unwrap()
///         .add_column("region", DataType::String).unwrap()
///         .add_column("sum", DataType::Int).unwrap()
///         .output()
///         .build().unwrap(),
/// ).unwrap();
/// let sum = builder.aggregate(sale, [0], Aggregator::Sum(1)).unwrap();
/// builder.rule(total, sum).unwrap();
///
/// let mut engine = Engine::new(builder.build().unwrap());
/// let mut tx = engine.begin();
/// tx.insert(sale, tuple!["east", 3i64]).unwrap();
/// tx.insert(sale, tuple!["east", 5i64]).unwrap();
/// let commit = engine.commit(tx).unwrap();
///
/// assert_eq!(commit.added(total), vec![&tuple!["east", 8i64]]);
/// ```
pub struct Engine {
    program: Program,
    state: DataflowState,
    scheduler: Scheduler,
    config: EngineConfig,
    epoch: u64,
    next_transaction: TransactionId,
    subscriptions: SubscriptionRegistry,
    interner: InternTable,
}

impl Engine {
    /// Creates an engine with the default configuration.
    pub fn new(program: Program) -> Self {
        Self::with_config(program, EngineConfig::default())
    }

    /// Creates an engine with a custom configuration.
    pub fn with_config(program: Program, config: EngineConfig) -> Self {
        let state = DataflowState::new(&program);
        let scheduler = Scheduler::new()
            .with_iteration_limit(config.iteration_limit)
            .with_diagnostics(config.collect_inspect_diagnostics);
        debug!(
            relations = program.catalog().len(),
            strata = program.plan().strata().len(),
            "engine created"
        );
        Self {
            program,
            state,
            scheduler,
            config,
            epoch: 0,
            next_transaction: 1,
            subscriptions: SubscriptionRegistry::new(),
            interner: InternTable::new(),
        }
    }

    /// Returns the program.
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Returns the relation catalog.
    pub fn catalog(&self) -> &Arc<Catalog> {
        self.program.catalog()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the epoch of the last successful commit; 0 before the first.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Returns the id of a relation by name.
    pub fn relation_id(&self, name: &str) -> Result<RelId> {
        self.catalog()
            .id(name)
            .ok_or_else(|| Error::unknown_relation(name))
    }

    /// Starts a transaction.
    pub fn begin(&mut self) -> Transaction {
        let id = self.next_transaction;
        self.next_transaction += 1;
        Transaction::new(id, self.catalog().clone())
    }

    /// Applies a transaction atomically.
    ///
    /// On success the engine moves to the next epoch and subscribers are
    /// notified. On failure every change made by the commit is undone and the
    /// epoch stays where it was.
    pub fn commit(&mut self, mut transaction: Transaction) -> Result<Commit> {
        if !Arc::ptr_eq(transaction.catalog(), self.catalog()) {
            return Err(Error::invalid_operation("Transaction belongs to another engine"));
        }
        let updates = transaction.take_updates()?;
        self.apply(&updates)
    }

    fn apply(&mut self, updates: &[(RelId, Tuple, Weight)]) -> Result<Commit> {
        let epoch = self.epoch + 1;
        let mut journal = Journal::new();
        let outcome = match self
            .scheduler
            .run(&self.program, &mut self.state, &mut journal, epoch, updates)
        {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(epoch, %error, undo = journal.len(), "commit failed, rolling back");
                journal.rollback(&mut self.state);
                return Err(error);
            }
        };
        journal.commit();
        self.epoch = epoch;
        debug!(
            epoch,
            updates = updates.len(),
            changes = outcome.stats.changes_emitted,
            "commit applied"
        );

        self.subscriptions.on_commit(epoch, &outcome.changes);
        Ok(Commit {
            epoch,
            changes: outcome.changes,
            stats: outcome.stats,
            diagnostics: outcome.diagnostics,
        })
    }

    /// Rebuilds state by committing each batch in order.
    ///
    /// Stops at the first batch that fails; earlier batches stay committed.
    pub fn replay<I>(&mut self, batches: I) -> Result<Vec<Commit>>
    where
        I: IntoIterator<Item = Vec<(RelId, Tuple, Weight)>>,
    {
        let mut commits = Vec::new();
        for batch in batches {
            let mut tx = self.begin();
            for (relation, tuple, weight) in batch {
                tx.insert_weighted(relation, tuple, weight)?;
            }
            commits.push(self.commit(tx)?);
        }
        Ok(commits)
    }

    /// Returns the present tuples of a relation in sorted order.
    pub fn state(&self, relation: RelId) -> Vec<Tuple> {
        self.state.contents(relation)
    }

    /// Returns true if a tuple is present in a relation.
    pub fn contains(&self, relation: RelId, tuple: &Tuple) -> bool {
        self.state
            .collection(relation)
            .is_some_and(|c| c.contains(tuple))
    }

    /// Returns the evaluation state.
    pub fn dataflow(&self) -> &DataflowState {
        &self.state
    }

    /// Subscribes to the changes of a relation.
    ///
    /// The callback first receives the relation's current contents (if any),
    /// then one change set per commit that changes the relation. Only input
    /// and output relations can be subscribed to.
    pub fn subscribe<F>(&mut self, relation: RelId, callback: F) -> Result<SubscriptionId>
    where
        F: FnMut(&ChangeSet) + 'static,
    {
        let schema = self.catalog().require(relation)?;
        if !schema.role().is_observable() {
            return Err(Error::invalid_operation(format!(
                "Relation {} is internal and cannot be subscribed to",
                schema.name()
            )));
        }
        let state = &self.state;
        Ok(self
            .subscriptions
            .subscribe(relation, self.epoch, || state.contents(relation), callback))
    }

    /// Removes a subscription. Returns true if it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    /// Ends every subscription, sending each subscriber the removal of its
    /// view.
    pub fn complete_subscriptions(&mut self) {
        self.subscriptions.complete_all();
    }

    /// Interns a value, returning a handle equal for equal contents.
    pub fn intern(&mut self, value: Value) -> Interned {
        self.interner.intern(value)
    }

    /// Returns the value behind a handle.
    pub fn resolve(&self, handle: Interned) -> Option<&Value> {
        self.interner.resolve(handle)
    }
}

impl core::fmt::Debug for Engine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Engine")
            .field("epoch", &self.epoch)
            .field("relations", &self.catalog().len())
            .field("strata", &self.program.plan().strata().len())
            .field("subscriptions", &self.subscriptions.len())
            .finish_non_exhaustive()
    }
}
