//! Core types for the entity store.

use crate::search::Needle;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::hash_set;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// A value the store can hold.
///
/// The store keeps its own clone of every entity it is given, keyed by
/// [`Entity::id`]. [`Entity::search_string`] is the projection that keyword
/// queries match against.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Stable identifier; two entities with equal IDs are the same item.
    type Id: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;

    fn id(&self) -> Self::Id;

    /// Text matched by [`Query::Search`].
    fn search_string(&self) -> Cow<'_, str>;
}

/// The closed set of queries a store can answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Query<Id>
where
    Id: Eq + Hash,
{
    /// Everything currently stored.
    All,
    /// Only entities whose ID is in the set. Unknown IDs are ignored.
    ByIds(HashSet<Id>),
    /// Entities whose search string contains the trimmed keyword, ignoring
    /// case and diacritics. A blank keyword behaves like [`Query::All`].
    Search(String),
}

impl<Id: Eq + Hash> Query<Id> {
    pub fn by_id(id: Id) -> Self {
        Query::ByIds(HashSet::from([id]))
    }

    pub fn by_ids(ids: impl IntoIterator<Item = Id>) -> Self {
        Query::ByIds(ids.into_iter().collect())
    }

    pub fn search(keyword: impl Into<String>) -> Self {
        Query::Search(keyword.into())
    }

    /// The trimmed search keyword, or `None` if this query is not a search or
    /// the keyword is blank.
    pub fn keyword(&self) -> Option<&str> {
        match self {
            Query::Search(keyword) => {
                let trimmed = keyword.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    /// Check a single entity against this query.
    pub fn matches<T>(&self, entity: &T) -> bool
    where
        T: Entity<Id = Id>,
    {
        self.filter().matches(entity)
    }

    /// Compile the query into a reusable per-entity filter.
    pub(crate) fn filter(&self) -> Filter<'_, Id> {
        match self {
            Query::All => Filter::All,
            Query::ByIds(ids) => Filter::Ids(ids),
            Query::Search(keyword) => match Needle::new(keyword) {
                Some(needle) => Filter::Keyword(needle),
                None => Filter::All,
            },
        }
    }
}

/// A query prepared for evaluation; the search needle is folded once.
pub(crate) enum Filter<'a, Id> {
    All,
    Ids(&'a HashSet<Id>),
    Keyword(Needle),
}

impl<Id: Eq + Hash> Filter<'_, Id> {
    pub(crate) fn matches<T>(&self, entity: &T) -> bool
    where
        T: Entity<Id = Id>,
    {
        match self {
            Filter::All => true,
            Filter::Ids(ids) => ids.contains(&entity.id()),
            Filter::Keyword(needle) => needle.matches(&entity.search_string()),
        }
    }
}

/// IDs inserted, updated, or removed by a single `store` or `delete` call.
///
/// A change set is never published empty.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet<Id>
where
    Id: Eq + Hash,
{
    ids: HashSet<Id>,
}

impl<Id: Eq + Hash> ChangeSet<Id> {
    pub fn new(ids: HashSet<Id>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &HashSet<Id> {
        &self.ids
    }

    pub fn into_ids(self) -> HashSet<Id> {
        self.ids
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> hash_set::Iter<'_, Id> {
        self.ids.iter()
    }

    /// Fold another change set into this one.
    pub fn merge(&mut self, other: ChangeSet<Id>) {
        self.ids.extend(other.ids);
    }
}

impl<Id: Eq + Hash> FromIterator<Id> for ChangeSet<Id> {
    fn from_iter<I: IntoIterator<Item = Id>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<Id: Eq + Hash> IntoIterator for ChangeSet<Id> {
    type Item = Id;
    type IntoIter = hash_set::IntoIter<Id>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug)]
    struct Tag {
        id: u32,
        label: &'static str,
    }

    impl Entity for Tag {
        type Id = u32;

        fn id(&self) -> u32 {
            self.id
        }

        fn search_string(&self) -> Cow<'_, str> {
            Cow::Borrowed(self.label)
        }
    }

    #[test]
    fn test_keyword_trims_whitespace() {
        let query: Query<u32> = Query::search("  rust \n");
        assert_eq!(query.keyword(), Some("rust"));

        let blank: Query<u32> = Query::search(" \t ");
        assert_eq!(blank.keyword(), None);
        assert_eq!(Query::<u32>::All.keyword(), None);
    }

    #[test]
    fn test_matches() {
        let tag = Tag { id: 7, label: "Café Society" };

        assert!(Query::All.matches(&tag));
        assert!(Query::by_id(7).matches(&tag));
        assert!(!Query::by_ids([1, 2]).matches(&tag));
        assert!(Query::search("cafe").matches(&tag));
        assert!(Query::search("SOCIETY").matches(&tag));
        assert!(Query::search("   ").matches(&tag));
        assert!(!Query::search("bar").matches(&tag));
    }

    #[test]
    fn test_change_set_merge() {
        let mut changes: ChangeSet<u32> = [1, 2].into_iter().collect();
        changes.merge([2, 3].into_iter().collect());

        assert_eq!(changes.len(), 3);
        assert!(changes.contains(&3));
    }

    #[test]
    fn test_query_serialization() {
        let query: Query<u32> = Query::search("alpha");
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["type"], "search");
        assert_eq!(json["value"], "alpha");

        let back: Query<u32> = serde_json::from_value(json).unwrap();
        assert_eq!(back, query);
    }
}
