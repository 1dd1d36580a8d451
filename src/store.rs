//! The in-memory store and the `DataStore` interface it implements.

use crate::error::{Result, StoreError};
use crate::live::{LiveQuery, QuerySource};
use crate::subscriptions::{
    ChangeFeed, ChangeSubscription, SubscriptionConfig, SubscriptionId, DEFAULT_BUFFER_SIZE,
};
use crate::types::{ChangeSet, Entity, Query};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::debug;

/// CRUD access to a collection of entities, plus live queries.
///
/// Every operation is fallible so that backends with real I/O can slot in
/// behind the same interface; the in-memory store never fails.
pub trait DataStore<T: Entity> {
    /// Evaluate a query. Result order is unspecified.
    fn list(&self, query: &Query<T::Id>) -> Result<Vec<T>>;

    /// Insert or replace every item by ID. One change notification is
    /// published for the whole batch, and none if the batch is empty.
    fn store<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>;

    /// Remove everything the query matches, as one atomic step.
    fn delete(&self, query: &Query<T::Id>) -> Result<()>;

    /// Up-to-date results for `query`, re-evaluated after every change
    /// until the store goes away.
    fn list_stream(&self, query: Query<T::Id>) -> LiveQuery<T>;
}

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Label used in log output.
    pub name: String,

    /// Default queue depth for change subscriptions made through
    /// [`MemoryStore::subscribe`].
    pub change_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            change_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// State shared between a [`MemoryStore`] and the weak handles and live
/// queries pointing at it.
pub(crate) struct StoreCore<T: Entity> {
    config: StoreConfig,
    /// The authoritative map. Every read and write goes through this lock.
    entities: RwLock<HashMap<T::Id, T>>,
    feed: ChangeFeed<T::Id>,
}

impl<T: Entity> StoreCore<T> {
    fn new(config: StoreConfig) -> Self {
        Self {
            config,
            entities: RwLock::new(HashMap::new()),
            feed: ChangeFeed::new(),
        }
    }

    fn list(&self, query: &Query<T::Id>) -> Vec<T> {
        let entities = self.entities.read();
        select::<T>(&entities, query).cloned().collect()
    }

    fn store<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut entities = self.entities.write();

        let mut updated = HashSet::new();
        for item in items {
            let id = item.id();
            updated.insert(id.clone());
            entities.insert(id, item);
        }

        if updated.is_empty() {
            return;
        }
        debug!(store = %self.config.name, updated = updated.len(), "stored entities");
        // Published under the write lock so notification order matches
        // mutation order.
        self.feed.publish(&ChangeSet::new(updated));
    }

    fn delete(&self, query: &Query<T::Id>) {
        let mut entities = self.entities.write();

        let doomed: Vec<T::Id> = select::<T>(&entities, query)
            .map(|entity| entity.id())
            .collect();
        let removed: HashSet<T::Id> = doomed
            .into_iter()
            .filter(|id| entities.remove(id).is_some())
            .collect();

        if removed.is_empty() {
            return;
        }
        debug!(store = %self.config.name, removed = removed.len(), "deleted entities");
        self.feed.publish(&ChangeSet::new(removed));
    }

    fn get(&self, id: &T::Id) -> Option<T> {
        self.entities.read().get(id).cloned()
    }

    fn len(&self) -> usize {
        self.entities.read().len()
    }
}

impl<T: Entity> QuerySource<T> for StoreCore<T> {
    fn evaluate(&self, query: &Query<T::Id>) -> Result<Vec<T>> {
        Ok(self.list(query))
    }

    fn feed(&self) -> &ChangeFeed<T::Id> {
        &self.feed
    }
}

/// Entities in `entities` matched by `query`, in map order.
fn select<'a, T: Entity>(
    entities: &'a HashMap<T::Id, T>,
    query: &'a Query<T::Id>,
) -> impl Iterator<Item = &'a T> + 'a {
    let filter = query.filter();
    entities.values().filter(move |entity| filter.matches(*entity))
}

/// A store that keeps entities in memory.
///
/// `MemoryStore` is the sole owner of its data. Share it between threads by
/// reference or behind an `Arc`; hand out a [`WeakStore`] to collaborators
/// that must not keep it alive. Dropping the store ends every live query and
/// disconnects every change subscription attached to it.
///
/// # Example
///
/// ```ignore
/// let store = MemoryStore::<User>::new();
/// let mut users = store.list_stream(Query::All);
///
/// assert_eq!(users.next().unwrap()?.len(), 0);
/// store.store([user])?;
/// assert_eq!(users.next().unwrap()?.len(), 1);
/// ```
pub struct MemoryStore<T: Entity> {
    core: Arc<StoreCore<T>>,
}

impl<T: Entity> MemoryStore<T> {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            core: Arc::new(StoreCore::new(config)),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.core.config
    }

    /// Look up a single entity.
    pub fn get(&self, id: &T::Id) -> Option<T> {
        self.core.get(id)
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribe to raw change notifications with the configured buffer size.
    pub fn subscribe(&self) -> ChangeSubscription<T::Id> {
        self.subscribe_changes(SubscriptionConfig::queued(self.core.config.change_buffer_size))
    }

    pub fn subscribe_changes(&self, config: SubscriptionConfig) -> ChangeSubscription<T::Id> {
        self.core.feed.subscribe(config)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.core.feed.unsubscribe(id)
    }

    /// Number of attached subscribers, live queries included.
    pub fn subscription_count(&self) -> usize {
        self.core.feed.subscription_count()
    }

    /// A handle that does not keep the store alive.
    pub fn downgrade(&self) -> WeakStore<T> {
        WeakStore {
            core: Arc::downgrade(&self.core),
        }
    }
}

impl<T: Entity> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity> fmt::Debug for MemoryStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("name", &self.core.config.name)
            .field("len", &self.len())
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

impl<T: Entity> Drop for MemoryStore<T> {
    fn drop(&mut self) {
        debug!(store = %self.core.config.name, "tearing down store");
        // A live query may hold a short-lived strong reference while it
        // evaluates; closing the feed here ends it regardless.
        self.core.feed.close();
    }
}

impl<T: Entity> DataStore<T> for MemoryStore<T> {
    fn list(&self, query: &Query<T::Id>) -> Result<Vec<T>> {
        Ok(self.core.list(query))
    }

    fn store<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        self.core.store(items);
        Ok(())
    }

    fn delete(&self, query: &Query<T::Id>) -> Result<()> {
        self.core.delete(query);
        Ok(())
    }

    fn list_stream(&self, query: Query<T::Id>) -> LiveQuery<T> {
        LiveQuery::attach(&self.core, query)
    }
}

/// Non-owning handle to a [`MemoryStore`].
///
/// Operations fail with [`StoreError::Unavailable`] once the store has been
/// dropped.
pub struct WeakStore<T: Entity> {
    core: Weak<StoreCore<T>>,
}

impl<T: Entity> Clone for WeakStore<T> {
    fn clone(&self) -> Self {
        Self {
            core: Weak::clone(&self.core),
        }
    }
}

impl<T: Entity> WeakStore<T> {
    pub fn is_available(&self) -> bool {
        self.core().is_ok()
    }

    fn core(&self) -> Result<Arc<StoreCore<T>>> {
        self.core
            .upgrade()
            .filter(|core| !core.feed.is_closed())
            .ok_or(StoreError::Unavailable)
    }
}

impl<T: Entity> DataStore<T> for WeakStore<T> {
    fn list(&self, query: &Query<T::Id>) -> Result<Vec<T>> {
        Ok(self.core()?.list(query))
    }

    fn store<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        self.core()?.store(items);
        Ok(())
    }

    fn delete(&self, query: &Query<T::Id>) -> Result<()> {
        self.core()?.delete(query);
        Ok(())
    }

    fn list_stream(&self, query: Query<T::Id>) -> LiveQuery<T> {
        match self.core() {
            Ok(core) => LiveQuery::attach(&core, query),
            Err(_) => LiveQuery::finished(query),
        }
    }
}
