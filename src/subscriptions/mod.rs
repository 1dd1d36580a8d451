//! Change notifications for live store updates.
//!
//! Every `store` or `delete` call that touches at least one entity publishes a
//! single [`ChangeSet`](crate::ChangeSet) carrying the affected IDs.
//!
//! Subscriptions support:
//! - Queued delivery, one notification per mutation, with slow-subscriber dropping
//! - Coalesced delivery, merging whatever piled up since the last receive
//! - Disconnect on unsubscribe or store teardown
//!
//! # Example
//!
//! ```ignore
//! let changes = store.subscribe_changes(SubscriptionConfig::default());
//!
//! loop {
//!     match changes.recv() {
//!         Ok(change_set) => println!("changed: {:?}", change_set.ids()),
//!         Err(_) => break, // store is gone
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::ChangeFeed;
pub use types::{
    ChangeSubscription, Delivery, SubscriptionConfig, SubscriptionId, DEFAULT_BUFFER_SIZE,
};
