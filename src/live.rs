//! Live queries: a query re-evaluated every time the store changes.
//!
//! A [`LiveQuery`] is a blocking iterator. The first call to `next` evaluates
//! the query against the current state; every later call waits for a change
//! notification and evaluates again. Iteration ends, once, when the store is
//! torn down or the query is cancelled.
//!
//! The engine only holds a [`Weak`] reference to its source, so a live query
//! never keeps a store alive. Notifications use coalesced delivery: while the
//! consumer is busy, any number of changes fold into one pending wake-up.

use crate::error::Result;
use crate::subscriptions::{ChangeFeed, ChangeSubscription, SubscriptionConfig, SubscriptionId};
use crate::types::{Entity, Query};
use crossbeam_channel::{RecvTimeoutError, TryRecvError};
use std::iter::FusedIterator;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, trace};

/// Anything a live query can run against.
///
/// The in-memory store implements this; other backends embed a
/// [`ChangeFeed`] and publish to it after each mutation.
pub trait QuerySource<T: Entity>: Send + Sync + 'static {
    fn evaluate(&self, query: &Query<T::Id>) -> Result<Vec<T>>;

    fn feed(&self) -> &ChangeFeed<T::Id>;
}

/// Result of a bounded wait on a live query.
#[derive(Debug)]
pub enum LivePoll<T> {
    /// A fresh evaluation.
    Item(Result<Vec<T>>),
    /// Nothing changed within the wait.
    Pending,
    /// The query has terminated and will not produce anything else.
    Finished,
}

impl<T> LivePoll<T> {
    pub fn is_finished(&self) -> bool {
        matches!(self, LivePoll::Finished)
    }

    pub fn into_item(self) -> Option<Result<Vec<T>>> {
        match self {
            LivePoll::Item(item) => Some(item),
            _ => None,
        }
    }
}

enum Wait {
    Block,
    Timeout(Duration),
    Poll,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Initial,
    Listening,
    Finished,
}

/// Cancels a [`LiveQuery`] from any thread.
///
/// Cancelling detaches the query from its change feed right away, which also
/// wakes a consumer blocked in `next`. No evaluation starts after `cancel`
/// returns and no result evaluated concurrently with it is handed out.
pub struct CancelHandle<T: Entity> {
    cancelled: Arc<AtomicBool>,
    source: Option<Weak<dyn QuerySource<T>>>,
    subscription: Option<SubscriptionId>,
}

impl<T: Entity> Clone for CancelHandle<T> {
    fn clone(&self) -> Self {
        Self {
            cancelled: Arc::clone(&self.cancelled),
            source: self.source.clone(),
            subscription: self.subscription,
        }
    }
}

impl<T: Entity> CancelHandle<T> {
    /// Idempotent.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("live query cancelled");
        self.detach();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn detach(&self) {
        let source = self.source.as_ref().and_then(Weak::upgrade);
        if let (Some(id), Some(source)) = (self.subscription, source) {
            source.feed().unsubscribe(id);
        }
    }
}

/// A cancellable stream of results for one query.
///
/// Yields `Ok(entities)` for each evaluation, or `Err` when an evaluation
/// fails; a failed evaluation does not end the stream.
pub struct LiveQuery<T: Entity> {
    query: Query<T::Id>,
    source: Option<Weak<dyn QuerySource<T>>>,
    subscription: Option<ChangeSubscription<T::Id>>,
    cancel: CancelHandle<T>,
    phase: Phase,
}

impl<T: Entity> LiveQuery<T> {
    /// Bind a live query to `source`.
    ///
    /// The change subscription is taken out immediately, so changes made
    /// between this call and the first `next` are not missed.
    pub fn attach<S>(source: &Arc<S>, query: Query<T::Id>) -> Self
    where
        S: QuerySource<T>,
    {
        let strong: Arc<dyn QuerySource<T>> = source.clone();
        let subscription = strong.feed().subscribe(SubscriptionConfig::coalesced());
        let weak = Arc::downgrade(&strong);

        Self {
            query,
            cancel: CancelHandle {
                cancelled: Arc::new(AtomicBool::new(false)),
                source: Some(Weak::clone(&weak)),
                subscription: Some(subscription.id()),
            },
            source: Some(weak),
            subscription: Some(subscription),
            phase: Phase::Initial,
        }
    }

    /// A live query whose source is already gone. It yields nothing.
    pub fn finished(query: Query<T::Id>) -> Self {
        Self {
            query,
            cancel: CancelHandle {
                cancelled: Arc::new(AtomicBool::new(false)),
                source: None,
                subscription: None,
            },
            source: None,
            subscription: None,
            phase: Phase::Finished,
        }
    }

    pub fn query(&self) -> &Query<T::Id> {
        &self.query
    }

    pub fn cancel_handle(&self) -> CancelHandle<T> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Wait at most `timeout` for the next result.
    pub fn next_timeout(&mut self, timeout: Duration) -> LivePoll<T> {
        self.poll(Wait::Timeout(timeout))
    }

    /// Return the next result only if one is ready now.
    pub fn try_next(&mut self) -> LivePoll<T> {
        self.poll(Wait::Poll)
    }

    fn poll(&mut self, wait: Wait) -> LivePoll<T> {
        match self.phase {
            Phase::Finished => return LivePoll::Finished,
            Phase::Initial => {
                self.phase = Phase::Listening;
                return self.evaluate();
            }
            Phase::Listening => {}
        }

        if self.cancel.is_cancelled() {
            return self.finish();
        }

        let woke = match (&self.subscription, wait) {
            (None, _) => Err(()),
            (Some(sub), Wait::Block) => sub.recv().map_err(|_| ()),
            (Some(sub), Wait::Timeout(timeout)) => match sub.recv_timeout(timeout) {
                Ok(changes) => Ok(changes),
                Err(RecvTimeoutError::Timeout) => return LivePoll::Pending,
                Err(RecvTimeoutError::Disconnected) => Err(()),
            },
            (Some(sub), Wait::Poll) => match sub.try_recv() {
                Ok(changes) => Ok(changes),
                Err(TryRecvError::Empty) => return LivePoll::Pending,
                Err(TryRecvError::Disconnected) => Err(()),
            },
        };

        match woke {
            Ok(changes) => {
                trace!(changed = changes.len(), "live query woke");
                self.evaluate()
            }
            Err(()) => self.finish(),
        }
    }

    fn evaluate(&mut self) -> LivePoll<T> {
        if self.cancel.is_cancelled() {
            return self.finish();
        }
        let Some(source) = self.source.as_ref().and_then(Weak::upgrade) else {
            return self.finish();
        };
        if source.feed().is_closed() {
            return self.finish();
        }

        let result = source.evaluate(&self.query);
        drop(source);

        if self.cancel.is_cancelled() {
            return self.finish();
        }
        match &result {
            Ok(entities) => trace!(count = entities.len(), "live query evaluated"),
            Err(e) => debug!(error = %e, "live query evaluation failed"),
        }
        LivePoll::Item(result)
    }

    fn finish(&mut self) -> LivePoll<T> {
        if self.phase != Phase::Finished {
            self.phase = Phase::Finished;
            self.subscription = None;
            self.cancel.detach();
            debug!("live query finished");
        }
        LivePoll::Finished
    }
}

impl<T: Entity> Iterator for LiveQuery<T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.poll(Wait::Block) {
            LivePoll::Item(item) => Some(item),
            LivePoll::Pending | LivePoll::Finished => None,
        }
    }
}

impl<T: Entity> FusedIterator for LiveQuery<T> {}

impl<T: Entity> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.subscription = None;
        self.cancel.detach();
    }
}
