//! Subscription management for relation observers.
//!
//! This module provides subscription IDs and a manager for the callbacks
//! observing one relation.

use crate::change_set::ChangeSet;
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for change notifications.
pub type ChangeCallback = Box<dyn FnMut(&ChangeSet)>;

/// A subscription to relation changes.
pub struct Subscription {
    /// Unique identifier
    id: SubscriptionId,
    /// Callback to invoke on changes
    callback: ChangeCallback,
    /// Whether this subscription is active
    active: bool,
}

impl Subscription {
    /// Creates a new subscription.
    pub fn new<F>(id: SubscriptionId, callback: F) -> Self
    where
        F: FnMut(&ChangeSet) + 'static,
    {
        Self {
            id,
            callback: Box::new(callback),
            active: true,
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether this subscription is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Deactivates this subscription.
    #[inline]
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Notifies this subscription of changes.
    pub fn notify(&mut self, changes: &ChangeSet) {
        if self.active {
            (self.callback)(changes);
        }
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Manages the subscriptions of one relation.
///
/// Subscribers are notified in the order they subscribed. IDs are assigned
/// by the caller so they can be unique across relations.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
}

impl SubscriptionManager {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscription. Replaces any subscription with the same ID.
    pub fn subscribe<F>(&mut self, id: SubscriptionId, callback: F)
    where
        F: FnMut(&ChangeSet) + 'static,
    {
        self.subscriptions.insert(id, Subscription::new(id, callback));
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Returns true if the subscription exists.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.contains_key(&id)
    }

    /// Notifies a specific subscription of changes.
    pub fn notify(&mut self, id: SubscriptionId, changes: &ChangeSet) {
        if let Some(sub) = self.subscriptions.get_mut(&id) {
            sub.notify(changes);
        }
    }

    /// Notifies all active subscriptions of changes.
    pub fn notify_all(&mut self, changes: &ChangeSet) {
        for sub in self.subscriptions.values_mut() {
            sub.notify(changes);
        }
    }

    /// Returns the number of subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns all subscription IDs in notification order.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        self.subscriptions.keys().copied().collect()
    }

    /// Clears all subscriptions.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}
