//! # Live Store
//!
//! A reactive in-memory entity store. Entities are kept by ID, looked up
//! with a small fixed query vocabulary, and watched with live queries that
//! re-run whenever the data changes.
//!
//! ## Core Concepts
//!
//! - **Entities**: Values with a stable ID and a searchable text projection
//! - **Queries**: `All`, `ByIds`, or a case- and diacritic-insensitive `Search`
//! - **Change notifications**: One ID set per mutating call, fanned out to subscribers
//! - **Live queries**: Blocking iterators that yield fresh results after every change
//!
//! ## Example
//!
//! ```ignore
//! use livestore::{DataStore, MemoryStore, Query};
//!
//! let store = MemoryStore::<User>::new();
//!
//! // Watch the whole collection
//! let mut users = store.list_stream(Query::All);
//! let initial = users.next().unwrap()?;
//!
//! // Write from anywhere; the live query sees it
//! store.store([user])?;
//! let updated = users.next().unwrap()?;
//!
//! // Keyword search
//! let matches = store.list(&Query::search("smith"))?;
//! ```

pub mod error;
pub mod live;
pub mod search;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{Result, StoreError};
pub use live::{CancelHandle, LivePoll, LiveQuery, QuerySource};
pub use store::{DataStore, MemoryStore, StoreConfig, WeakStore};
pub use subscriptions::{
    ChangeFeed, ChangeSubscription, Delivery, SubscriptionConfig, SubscriptionId,
};
pub use types::{ChangeSet, Entity, Query};
