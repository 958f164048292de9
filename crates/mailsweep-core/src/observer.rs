//! Progress callbacks for scans and mutations.
//!
//! The engine reports what it skips and what it deletes through a
//! [`SweepObserver`]. Its own results never depend on what the observer
//! does with them.

use std::fmt;

use crate::mailbox::MailboxError;
use crate::sender::SenderIdentity;

/// Receives engine progress events.
///
/// Every method has a no-op default; implement only the ones you need.
pub trait SweepObserver {
    /// A scan is about to fetch headers for `selected` of `total` messages.
    fn on_scan_started(&mut self, folder: &str, total: usize, selected: usize) {
        let _ = (folder, total, selected);
    }

    /// Fetching a message's sender header failed; the message is skipped.
    fn on_fetch_failed(&mut self, handle: &dyn fmt::Debug, error: &MailboxError) {
        let _ = (handle, error);
    }

    /// No sender address could be extracted; the message is excluded.
    fn on_unclassifiable(&mut self, handle: &dyn fmt::Debug, raw: Option<&str>) {
        let _ = (handle, raw);
    }

    /// A message from an unapproved sender was found.
    fn on_unapproved(&mut self, handle: &dyn fmt::Debug, sender: &SenderIdentity) {
        let _ = (handle, sender);
    }

    /// A batch delete failed; its messages will be retried one at a time.
    fn on_batch_failed(&mut self, size: usize, error: &MailboxError) {
        let _ = (size, error);
    }

    /// Deleting a single message failed; it is skipped.
    fn on_delete_failed(&mut self, handle: &dyn fmt::Debug, error: &MailboxError) {
        let _ = (handle, error);
    }

    /// A mutation finished with `count` messages deleted (or, for a dry
    /// run, that would have been deleted).
    fn on_mutation_finished(&mut self, count: usize, dry_run: bool) {
        let _ = (count, dry_run);
    }
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SweepObserver for NoopObserver {}

/// Emits every event as a `tracing` record.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SweepObserver for TracingObserver {
    fn on_scan_started(&mut self, folder: &str, total: usize, selected: usize) {
        tracing::info!(folder, total, selected, "scan started");
    }

    fn on_fetch_failed(&mut self, handle: &dyn fmt::Debug, error: &MailboxError) {
        tracing::warn!(?handle, %error, "header fetch failed, skipping");
    }

    fn on_unclassifiable(&mut self, handle: &dyn fmt::Debug, raw: Option<&str>) {
        tracing::debug!(?handle, raw, "no sender address, excluded");
    }

    fn on_unapproved(&mut self, handle: &dyn fmt::Debug, sender: &SenderIdentity) {
        tracing::debug!(?handle, sender = sender.as_str(), "unapproved");
    }

    fn on_batch_failed(&mut self, size: usize, error: &MailboxError) {
        tracing::warn!(size, %error, "batch delete failed, retrying individually");
    }

    fn on_delete_failed(&mut self, handle: &dyn fmt::Debug, error: &MailboxError) {
        tracing::warn!(?handle, %error, "delete failed, skipping");
    }

    fn on_mutation_finished(&mut self, count: usize, dry_run: bool) {
        tracing::info!(count, dry_run, "mutation finished");
    }
}
