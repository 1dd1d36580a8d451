//! Shared fixtures for integration tests.

#![allow(dead_code)]

use livestore::{Entity, LivePoll, LiveQuery};
use std::borrow::Cow;
use std::time::Duration;

/// How long a test waits for something that should happen.
pub const WAIT: Duration = Duration::from_secs(2);

/// How long a test waits to be confident something will not happen.
pub const QUIET: Duration = Duration::from_millis(100);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: String,
}

impl User {
    pub fn new(id: i64, display_name: &str) -> Self {
        let username = display_name.to_lowercase().replace(' ', ".");
        Self {
            id,
            email: format!("{username}@example.com"),
            username,
            display_name: display_name.to_string(),
        }
    }
}

impl Entity for User {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }

    fn search_string(&self) -> Cow<'_, str> {
        Cow::Owned(format!(
            "{} {} {}",
            self.display_name, self.username, self.email
        ))
    }
}

/// Route store logs to the test harness. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Sorted IDs, since list order is unspecified.
pub fn ids(users: &[User]) -> Vec<i64> {
    let mut ids: Vec<i64> = users.iter().map(|u| u.id).collect();
    ids.sort_unstable();
    ids
}

/// Next successful evaluation, panicking on error, timeout, or termination.
pub fn next_ids(live: &mut LiveQuery<User>) -> Vec<i64> {
    match live.next_timeout(WAIT) {
        LivePoll::Item(Ok(users)) => ids(&users),
        LivePoll::Item(Err(e)) => panic!("evaluation failed: {e}"),
        LivePoll::Pending => panic!("timed out waiting for live query"),
        LivePoll::Finished => panic!("live query finished early"),
    }
}
