//! Safe/unapproved classification.
//!
//! A sender is safe when at least one allow-list entry matches it under the
//! configured [`MatchStrategy`]. Every strategy is case-insensitive and
//! monotone: adding entries can only turn unapproved senders into safe ones.

mod reconcile;

pub use reconcile::{Reconciliation, reconcile};

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::str::FromStr;

use crate::allowlist::AllowList;
use crate::sender::SenderIdentity;

/// Senders from one scan that match no allow-list entry.
pub type UnapprovedSet = BTreeSet<SenderIdentity>;

/// How an allow-list entry is compared with a sender address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// The entry appears anywhere in the address.
    ///
    /// Broad on purpose: `@trusted.com` covers a whole domain. Short entries
    /// over-match, e.g. `a` makes nearly every sender safe.
    #[default]
    Substring,
    /// The entry equals the whole address.
    Exact,
    /// The entry, minus a leading `@`, is the sender's domain or a parent
    /// domain of it (`example.com` covers `mail.example.com`).
    DomainSuffix,
}

impl MatchStrategy {
    /// Parse from config string representation. Unknown values fall back to
    /// [`MatchStrategy::Substring`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "exact" => Self::Exact,
            "domain" | "domain_suffix" | "domain-suffix" => Self::DomainSuffix,
            _ => Self::Substring,
        }
    }

    /// Convert to config string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Substring => "substring",
            Self::Exact => "exact",
            Self::DomainSuffix => "domain",
        }
    }

    /// Whether a single `entry` matches `sender`.
    #[must_use]
    pub fn matches(self, entry: &str, sender: &SenderIdentity) -> bool {
        let entry = entry.trim().to_lowercase();
        if entry.is_empty() {
            return false;
        }

        match self {
            Self::Substring => sender.normalized().contains(&entry),
            Self::Exact => sender.normalized() == entry,
            Self::DomainSuffix => {
                let wanted = entry.strip_prefix('@').unwrap_or(&entry);
                sender.domain().is_some_and(|domain| {
                    domain == wanted
                        || domain
                            .strip_suffix(wanted)
                            .is_some_and(|head| head.ends_with('.'))
                })
            }
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Applies a [`MatchStrategy`] to whole allow-lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classifier {
    strategy: MatchStrategy,
}

impl Classifier {
    /// Creates a classifier using `strategy`.
    #[must_use]
    pub const fn new(strategy: MatchStrategy) -> Self {
        Self { strategy }
    }

    /// The strategy in use.
    #[must_use]
    pub const fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    /// Whether some entry of `allow_list` matches `sender`.
    #[must_use]
    pub fn is_safe(&self, sender: &SenderIdentity, allow_list: &AllowList) -> bool {
        allow_list
            .iter()
            .any(|entry| self.strategy.matches(entry, sender))
    }

    /// Returns the senders that are not safe under `allow_list`.
    #[must_use]
    pub fn classify<'a, I>(&self, senders: I, allow_list: &AllowList) -> UnapprovedSet
    where
        I: IntoIterator<Item = &'a SenderIdentity>,
    {
        senders
            .into_iter()
            .filter(|sender| !self.is_safe(sender, allow_list))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sender(s: &str) -> SenderIdentity {
        SenderIdentity::new(s)
    }

    #[test]
    fn test_substring_is_case_insensitive() {
        let list = AllowList::from_entries(["@Trusted.COM"]);
        let classifier = Classifier::default();
        assert!(classifier.is_safe(&sender("Boss@trusted.com"), &list));
        assert!(!classifier.is_safe(&sender("boss@untrusted.org"), &list));
    }

    #[test]
    fn test_substring_over_matches_short_entries() {
        let list = AllowList::from_entries(["a"]);
        assert!(Classifier::default().is_safe(&sender("spam@lottery.biz"), &list));
    }

    #[test]
    fn test_exact() {
        let classifier = Classifier::new(MatchStrategy::Exact);
        let list = AllowList::from_entries(["Alice@Example.com"]);
        assert!(classifier.is_safe(&sender("alice@example.com"), &list));
        assert!(!classifier.is_safe(&sender("malice@example.com"), &list));
    }

    #[test]
    fn test_domain_suffix() {
        let classifier = Classifier::new(MatchStrategy::DomainSuffix);
        let list = AllowList::from_entries(["@example.com"]);
        assert!(classifier.is_safe(&sender("a@example.com"), &list));
        assert!(classifier.is_safe(&sender("a@mail.example.com"), &list));
        assert!(!classifier.is_safe(&sender("a@badexample.com"), &list));
        assert!(!classifier.is_safe(&sender("example.com@evil.io"), &list));
    }

    #[test]
    fn test_classify_returns_unsafe_subset() {
        let senders: BTreeSet<_> = ["a@x.com", "b@y.com", "c@y.com"].map(sender).into();
        let list = AllowList::from_entries(["y.com"]);
        let unapproved = Classifier::default().classify(&senders, &list);
        assert_eq!(unapproved, UnapprovedSet::from([sender("a@x.com")]));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!(MatchStrategy::parse("EXACT"), MatchStrategy::Exact);
        assert_eq!(MatchStrategy::parse("domain"), MatchStrategy::DomainSuffix);
        assert_eq!(MatchStrategy::parse("whatever"), MatchStrategy::Substring);
        for s in [
            MatchStrategy::Substring,
            MatchStrategy::Exact,
            MatchStrategy::DomainSuffix,
        ] {
            assert_eq!(MatchStrategy::parse(s.as_str()), s);
        }
    }

    fn strategies() -> impl Strategy<Value = MatchStrategy> {
        prop_oneof![
            Just(MatchStrategy::Substring),
            Just(MatchStrategy::Exact),
            Just(MatchStrategy::DomainSuffix),
        ]
    }

    proptest! {
        #[test]
        fn prop_adding_entries_never_unsafes(
            strategy in strategies(),
            address in "[a-z]{1,8}@[a-z]{1,8}\\.(com|org|io)",
            base in proptest::collection::vec("@?[a-z.@]{1,10}", 0..6),
            extra in proptest::collection::vec("@?[a-z.@]{1,10}", 0..6),
        ) {
            let classifier = Classifier::new(strategy);
            let sender = SenderIdentity::new(address);
            let l1 = AllowList::from_entries(&base);
            let l2 = l1.union(&AllowList::from_entries(&extra));

            if classifier.is_safe(&sender, &l1) {
                prop_assert!(classifier.is_safe(&sender, &l2));
            }
        }
    }
}
