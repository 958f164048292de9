//! Incremental reclassification after approvals.

use tracing::info;

use super::{Classifier, UnapprovedSet};
use crate::allowlist::{AllowList, AllowListStore};
use crate::error::Result;

/// State after applying a round of approvals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Previous allow-list plus the new approvals, as persisted.
    pub allow_list: AllowList,
    /// Previously unapproved senders still not matched by any new approval.
    pub unapproved: UnapprovedSet,
}

/// Merges `newly_approved` into `allow_list`, persists the result, and drops
/// every unapproved sender that one of the new entries matches.
///
/// Only the new entries are checked against `unapproved`; there is no
/// rescan. The allow-list is written before anything is returned.
///
/// # Errors
///
/// Returns [`crate::Error::Storage`] if the merged list cannot be saved. In
/// that case nothing has changed from the caller's point of view.
pub async fn reconcile(
    store: &AllowListStore,
    classifier: &Classifier,
    unapproved: &UnapprovedSet,
    newly_approved: &AllowList,
    allow_list: &AllowList,
) -> Result<Reconciliation> {
    let merged = allow_list.union(newly_approved);
    store.save(&merged).await?;

    let remaining = classifier.classify(unapproved, newly_approved);

    info!(
        "Approved {} entries; {} of {} senders still unapproved",
        newly_approved.len(),
        remaining.len(),
        unapproved.len()
    );

    Ok(Reconciliation {
        allow_list: merged,
        unapproved: remaining,
    })
}
