//! Transactions: batches of weighted updates to input relations.
//!
//! A transaction only collects updates. Nothing reaches the engine until it
//! is passed to [`Engine::commit`](crate::Engine::commit), which applies the
//! whole batch atomically.

use alloc::sync::Arc;
use alloc::vec::Vec;
use stratalog_core::{Error, Result, Tuple};
use stratalog_incremental::{Catalog, RelId, Weight};

/// Transaction ID type.
pub type TransactionId = u64;

/// Transaction state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and accepts updates.
    Active,
    /// Transaction has been committed.
    Committed,
    /// Transaction has been aborted.
    Aborted,
}

/// A batch of updates to input relations.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    catalog: Arc<Catalog>,
    updates: Vec<(RelId, Tuple, Weight)>,
    state: TransactionState,
}

impl Transaction {
    pub(crate) fn new(id: TransactionId, catalog: Arc<Catalog>) -> Self {
        Self {
            id,
            catalog,
            updates: Vec::new(),
            state: TransactionState::Active,
        }
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns true if the transaction is active.
    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    /// Checks if the transaction is active, returns error if not.
    fn check_active(&self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(Error::invalid_operation("Transaction is not active"));
        }
        Ok(())
    }

    /// Inserts a tuple.
    pub fn insert(&mut self, relation: RelId, tuple: Tuple) -> Result<()> {
        self.insert_weighted(relation, tuple, 1)
    }

    /// Deletes a tuple.
    ///
    /// Deleting a tuple that is not present makes its count negative; it
    /// stays absent until enough inserts bring the count above zero.
    pub fn delete(&mut self, relation: RelId, tuple: Tuple) -> Result<()> {
        self.insert_weighted(relation, tuple, -1)
    }

    /// Adds `weight` to the count of a tuple.
    ///
    /// The tuple is checked against the relation schema. Only input
    /// relations accept updates.
    pub fn insert_weighted(&mut self, relation: RelId, tuple: Tuple, weight: Weight) -> Result<()> {
        self.check_active()?;
        let schema = self.catalog.require(relation)?;
        if !schema.is_input() {
            return Err(Error::not_an_input(schema.name()));
        }
        schema.check_tuple(&tuple)?;
        if weight != 0 {
            self.updates.push((relation, tuple, weight));
        }
        Ok(())
    }

    /// Inserts a tuple into the relation with the given name.
    pub fn insert_into(&mut self, relation: &str, tuple: Tuple) -> Result<()> {
        let id = self.resolve(relation)?;
        self.insert(id, tuple)
    }

    /// Deletes a tuple from the relation with the given name.
    pub fn delete_from(&mut self, relation: &str, tuple: Tuple) -> Result<()> {
        let id = self.resolve(relation)?;
        self.delete(id, tuple)
    }

    fn resolve(&self, name: &str) -> Result<RelId> {
        self.catalog.id(name).ok_or_else(|| Error::unknown_relation(name))
    }

    /// Discards every update.
    pub fn abort(&mut self) -> Result<()> {
        self.check_active()?;
        self.updates.clear();
        self.state = TransactionState::Aborted;
        Ok(())
    }

    /// Returns the updates collected so far, in order.
    pub fn updates(&self) -> &[(RelId, Tuple, Weight)] {
        &self.updates
    }

    /// Returns the number of updates.
    pub fn len(&self) -> usize {
        self.updates.len()
    }

    /// Returns true if no update was made.
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub(crate) fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Marks the transaction committed and hands over its updates.
    pub(crate) fn take_updates(&mut self) -> Result<Vec<(RelId, Tuple, Weight)>> {
        self.check_active()?;
        self.state = TransactionState::Committed;
        Ok(core::mem::take(&mut self.updates))
    }
}
