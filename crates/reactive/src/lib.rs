//! Stratalog Reactive - Change notifications for Stratalog relations.
//!
//! This crate turns the net changes of each commit into per-relation change
//! sets and delivers them to subscribers.
//!
//! # Core Concepts
//!
//! - `ChangeSet`: What one commit did to one relation (added, removed tuples)
//! - `Accumulator`: Current state of one relation plus its subscribers
//! - `SubscriptionManager`: Callbacks observing one relation
//! - `SubscriptionRegistry`: Routes commit changes to relation observers
//!
//! # Key Features
//!
//! - Late subscribers first receive the relation's current state
//! - `complete()` sends every subscriber the removal of its view
//!
//! # Example
//!
//! ```rust
//! use stratalog_core::tuple;
//! use stratalog_reactive::{Accumulator, ChangeSet};
//!
//! let mut relation = Accumulator::new(0, 0, [tuple![1i64]]);
//! relation.subscribe(1, |changes: &ChangeSet| {
//!     // First call: the current state, tuple![1i64]
//!     println!("added: {}, removed: {}", changes.added.len(), changes.removed.len());
//! });
//! relation.apply(&ChangeSet::clearing(0, 1, vec![tuple![1i64]]));
//! assert!(relation.current().is_empty());
//! ```

#![no_std]

extern crate alloc;

pub mod accumulator;
pub mod change_set;
pub mod notify;
pub mod subscription;

pub use accumulator::Accumulator;
pub use change_set::ChangeSet;
pub use notify::SubscriptionRegistry;
pub use subscription::{ChangeCallback, Subscription, SubscriptionId, SubscriptionManager};

// Re-export commonly used types from dependencies
pub use stratalog_incremental::{Change, RelId};
