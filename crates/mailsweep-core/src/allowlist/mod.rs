//! The safe-sender allow-list.
//!
//! Entries are opaque patterns; how they match a sender is decided by
//! [`crate::classify::MatchStrategy`]. The list only ever grows within this
//! crate: approvals are unioned in and nothing is removed.

mod store;

pub use store::AllowListStore;

use std::collections::BTreeSet;

/// A deduplicated, sorted set of allow-list patterns.
///
/// Entries are trimmed on insertion and empty entries are dropped. Case is
/// preserved, so `Foo@x.com` and `foo@x.com` are kept as distinct entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList(BTreeSet<String>);

impl AllowList {
    /// Creates an empty allow-list.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Builds an allow-list from arbitrary entries.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::new();
        for entry in entries {
            list.insert(entry.as_ref());
        }
        list
    }

    /// Parses newline- or comma-separated user input.
    #[must_use]
    pub fn parse_lines(input: &str) -> Self {
        Self::from_entries(input.split(['\n', ',']))
    }

    /// Adds one entry. Returns `true` if it was not already present.
    pub fn insert(&mut self, entry: &str) -> bool {
        let entry = entry.trim();
        if entry.is_empty() {
            return false;
        }
        self.0.insert(entry.to_string())
    }

    /// Returns the union of both lists.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0).cloned().collect())
    }

    /// Whether `entry` is present verbatim.
    #[must_use]
    pub fn contains(&self, entry: &str) -> bool {
        self.0.contains(entry.trim())
    }

    /// Iterates entries in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for AllowList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_entries(iter)
    }
}

impl<'a> IntoIterator for &'a AllowList {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_trimmed_and_deduplicated() {
        let list = AllowList::from_entries(["  a@x.com", "a@x.com ", "", "   ", "b.org"]);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec!["a@x.com", "b.org"]);
    }

    #[test]
    fn test_case_distinct() {
        let list = AllowList::from_entries(["Foo@x.com", "foo@x.com"]);
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_parse_lines() {
        let list = AllowList::parse_lines("a@x.com, b@y.com\n\n@corp.io\n");
        assert_eq!(
            list.iter().collect::<Vec<_>>(),
            vec!["@corp.io", "a@x.com", "b@y.com"]
        );
    }

    #[test]
    fn test_union_keeps_everything() {
        let a = AllowList::from_entries(["one", "two"]);
        let b = AllowList::from_entries(["two", "three"]);
        let merged = a.union(&b);
        assert_eq!(merged.len(), 3);
        assert!(merged.contains("one") && merged.contains("three"));
    }

    #[test]
    fn test_insert_reports_novelty() {
        let mut list = AllowList::new();
        assert!(list.insert("x.com"));
        assert!(!list.insert(" x.com "));
        assert!(!list.insert(""));
    }
}
