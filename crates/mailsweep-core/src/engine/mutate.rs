//! Bulk deletion of unapproved mail.

use tracing::info;

use super::scan::{ScanOptions, scan_messages};
use crate::allowlist::AllowList;
use crate::classify::Classifier;
use crate::error::Result;
use crate::mailbox::MailboxClient;
use crate::observer::SweepObserver;

/// Whether a mutation deletes or only counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationMode {
    /// Count what would be deleted without touching the mailbox.
    #[default]
    DryRun,
    /// Delete.
    Live,
}

impl MutationMode {
    /// Maps a `--dry-run` style flag.
    #[must_use]
    pub const fn from_dry_run(dry_run: bool) -> Self {
        if dry_run { Self::DryRun } else { Self::Live }
    }

    /// Whether this is a dry run.
    #[must_use]
    pub const fn is_dry_run(self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Outcome of a [`mutate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MutationReport {
    /// Whether nothing was actually deleted.
    pub dry_run: bool,
    /// Messages in the scan window with an identifiable sender.
    pub examined: usize,
    /// Messages from unapproved senders.
    pub targeted: usize,
    /// Messages deleted, or that would be deleted in a dry run.
    pub affected: usize,
    /// Messages whose deletion failed and was skipped.
    pub failed: usize,
}

impl MutationReport {
    /// The headline count: successful (or projected) deletions.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.affected
    }
}

/// Re-scans, classifies, and deletes every message from an unapproved
/// sender.
///
/// Classification always runs fresh against `allow_list`, never from an
/// earlier scan. Live deletions go out in chunks of the client's
/// [`batch_limit`](MailboxClient::batch_limit). A failed chunk is retried
/// message by message; a message that still fails is counted in
/// [`MutationReport::failed`] and skipped.
///
/// # Errors
///
/// Fails if the scan fails or the client reports a fatal (auth or
/// connection) error while deleting. A successful run may report zero.
pub async fn mutate<C, O>(
    client: &mut C,
    options: &ScanOptions,
    classifier: &Classifier,
    allow_list: &AllowList,
    mode: MutationMode,
    observer: &mut O,
) -> Result<MutationReport>
where
    C: MailboxClient,
    O: SweepObserver + ?Sized,
{
    let messages = scan_messages(client, options, observer).await?;

    let mut report = MutationReport {
        dry_run: mode.is_dry_run(),
        examined: messages.len(),
        ..MutationReport::default()
    };

    let mut targets = Vec::new();
    for message in messages {
        if !classifier.is_safe(&message.sender, allow_list) {
            observer.on_unapproved(&message.handle, &message.sender);
            targets.push(message.handle);
        }
    }
    report.targeted = targets.len();

    match mode {
        MutationMode::DryRun => report.affected = targets.len(),
        MutationMode::Live => {
            let chunk_size = client.batch_limit().max(1);
            for chunk in targets.chunks(chunk_size) {
                delete_chunk(client, chunk, &mut report, observer).await?;
            }
        }
    }

    info!(
        "{} {} of {} unapproved messages ({} failed)",
        if report.dry_run { "Would delete" } else { "Deleted" },
        report.affected,
        report.targeted,
        report.failed
    );
    observer.on_mutation_finished(report.affected, report.dry_run);

    Ok(report)
}

async fn delete_chunk<C, O>(
    client: &mut C,
    chunk: &[C::Handle],
    report: &mut MutationReport,
    observer: &mut O,
) -> Result<()>
where
    C: MailboxClient,
    O: SweepObserver + ?Sized,
{
    match client.delete_batch(chunk).await {
        Ok(()) => {
            report.affected += chunk.len();
            return Ok(());
        }
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => observer.on_batch_failed(chunk.len(), &e),
    }

    for handle in chunk {
        match client.delete(handle).await {
            Ok(()) => report.affected += 1,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                report.failed += 1;
                observer.on_delete_failed(handle, &e);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_flag() {
        assert_eq!(MutationMode::from_dry_run(true), MutationMode::DryRun);
        assert_eq!(MutationMode::from_dry_run(false), MutationMode::Live);
        assert!(MutationMode::default().is_dry_run());
    }
}
