//! Engine integration tests.
//!
//! These drive scanning, classification, reconciliation and bulk deletion
//! against an in-memory mailbox, so no server is needed.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mailsweep_core::{
    AllowList, AllowListStore, Authenticator, Classifier, Error, MailboxClient, MailboxError,
    MockClock, MutationMode, NoopObserver, ReviewSession, ScanLimit, ScanOptions, SenderIdentity,
    SweepObserver, mutate, scan, scan_unapproved, with_session,
};

/// In-memory mailbox with scriptable failures.
#[derive(Debug, Default)]
struct MockMailbox {
    /// `(uid, From header)` in arrival order.
    messages: Vec<(u32, Option<String>)>,
    batch_limit: usize,
    fail_fetch: HashSet<u32>,
    fatal_fetch: Option<u32>,
    fail_list_auth: bool,
    fail_delete: HashSet<u32>,
    fail_batches: bool,
    fetched: Vec<u32>,
    batch_calls: Vec<Vec<u32>>,
    single_calls: Vec<u32>,
    closed: Arc<AtomicBool>,
}

impl MockMailbox {
    fn with_senders(senders: &[&str]) -> Self {
        let messages = senders
            .iter()
            .zip(1..)
            .map(|(from, uid)| (uid, Some((*from).to_string())))
            .collect();
        Self {
            messages,
            batch_limit: 100,
            ..Self::default()
        }
    }

    fn numbered(count: u32) -> Self {
        let messages = (1..=count)
            .map(|uid| (uid, Some(format!("Sender {uid} <s{uid}@bulk.example>"))))
            .collect();
        Self {
            messages,
            batch_limit: 100,
            ..Self::default()
        }
    }

    fn remaining(&self) -> Vec<u32> {
        self.messages.iter().map(|(uid, _)| *uid).collect()
    }

    fn delete_calls(&self) -> usize {
        self.batch_calls.len() + self.single_calls.len()
    }

    fn remove(&mut self, uid: u32) {
        self.messages.retain(|(u, _)| *u != uid);
    }
}

impl MailboxClient for MockMailbox {
    type Handle = u32;

    fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    async fn list_message_ids(&mut self, _folder: &str) -> Result<Vec<u32>, MailboxError> {
        if self.fail_list_auth {
            return Err(MailboxError::Auth("token revoked".into()));
        }
        Ok(self.remaining())
    }

    async fn fetch_header_field(
        &mut self,
        uid: &u32,
        field: &str,
    ) -> Result<Option<String>, MailboxError> {
        assert_eq!(field, "From");
        self.fetched.push(*uid);

        if self.fatal_fetch == Some(*uid) {
            return Err(MailboxError::Connection("connection reset".into()));
        }
        if self.fail_fetch.contains(uid) {
            return Err(MailboxError::message(uid, "NO message vanished"));
        }
        Ok(self
            .messages
            .iter()
            .find(|(u, _)| u == uid)
            .and_then(|(_, from)| from.clone()))
    }

    async fn delete(&mut self, uid: &u32) -> Result<(), MailboxError> {
        self.single_calls.push(*uid);
        if self.fail_delete.contains(uid) {
            return Err(MailboxError::message(uid, "delete refused"));
        }
        self.remove(*uid);
        Ok(())
    }

    async fn delete_batch(&mut self, uids: &[u32]) -> Result<(), MailboxError> {
        self.batch_calls.push(uids.to_vec());
        if self.fail_batches || uids.iter().any(|u| self.fail_delete.contains(u)) {
            return Err(MailboxError::message("batch", "batch refused"));
        }
        for uid in uids {
            self.remove(*uid);
        }
        Ok(())
    }

    async fn close(self) -> Result<(), MailboxError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out a prepared mailbox once.
struct MockAuthenticator {
    mailbox: Option<MockMailbox>,
}

impl Authenticator for MockAuthenticator {
    type Client = MockMailbox;

    async fn open_session(&mut self) -> mailsweep_core::Result<MockMailbox> {
        self.mailbox
            .take()
            .ok_or_else(|| Error::Auth("session already used".into()))
    }
}

/// Counts observer callbacks.
#[derive(Debug, Default)]
struct RecordingObserver {
    fetch_failed: usize,
    unclassifiable: usize,
    unapproved: usize,
    batch_failed: usize,
    delete_failed: usize,
    finished: Option<(usize, bool)>,
}

impl SweepObserver for RecordingObserver {
    fn on_fetch_failed(&mut self, _handle: &dyn fmt::Debug, _error: &MailboxError) {
        self.fetch_failed += 1;
    }

    fn on_unclassifiable(&mut self, _handle: &dyn fmt::Debug, _raw: Option<&str>) {
        self.unclassifiable += 1;
    }

    fn on_unapproved(&mut self, _handle: &dyn fmt::Debug, _sender: &SenderIdentity) {
        self.unapproved += 1;
    }

    fn on_batch_failed(&mut self, _size: usize, _error: &MailboxError) {
        self.batch_failed += 1;
    }

    fn on_delete_failed(&mut self, _handle: &dyn fmt::Debug, _error: &MailboxError) {
        self.delete_failed += 1;
    }

    fn on_mutation_finished(&mut self, count: usize, dry_run: bool) {
        self.finished = Some((count, dry_run));
    }
}

fn options(limit: &str) -> ScanOptions {
    ScanOptions::new("INBOX", ScanLimit::parse(limit))
}

fn senders(list: &[&str]) -> BTreeSet<SenderIdentity> {
    list.iter().copied().map(SenderIdentity::new).collect()
}

#[tokio::test]
async fn test_scan_limit_fetches_most_recent() {
    let mut mailbox = MockMailbox::numbered(10);
    scan(&mut mailbox, &options("3"), &mut NoopObserver)
        .await
        .unwrap();
    assert_eq!(mailbox.fetched, vec![8, 9, 10]);
}

#[tokio::test]
async fn test_scan_limit_all_and_bogus_fetch_everything() {
    for limit in ["all", "bogus"] {
        let mut mailbox = MockMailbox::numbered(10);
        let found = scan(&mut mailbox, &options(limit), &mut NoopObserver)
            .await
            .unwrap();
        assert_eq!(mailbox.fetched, (1..=10).collect::<Vec<_>>(), "limit {limit}");
        assert_eq!(found.len(), 10);
    }
}

#[tokio::test]
async fn test_scan_collapses_duplicates_and_skips_bad_messages() {
    let mut mailbox = MockMailbox::with_senders(&[
        "Alice <alice@x.com>",
        "ALICE@X.COM",
        "Mailer Daemon",
        "Bob <bob@y.com>",
        "Carol <carol@z.com>",
    ]);
    mailbox.messages.push((6, None));
    mailbox.fail_fetch.insert(4);

    let mut observer = RecordingObserver::default();
    let found = scan(&mut mailbox, &options("all"), &mut observer)
        .await
        .unwrap();

    assert_eq!(found, senders(&["alice@x.com", "carol@z.com"]));
    assert_eq!(observer.fetch_failed, 1);
    assert_eq!(observer.unclassifiable, 2);
}

#[tokio::test]
async fn test_connection_failure_aborts_scan() {
    let mut mailbox = MockMailbox::numbered(5);
    mailbox.fatal_fetch = Some(3);

    let result = scan(&mut mailbox, &options("all"), &mut NoopObserver).await;

    assert!(matches!(result, Err(Error::Transport(_))));
    assert_eq!(mailbox.fetched, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_auth_failure_is_not_an_empty_result() {
    let mut mailbox = MockMailbox::numbered(5);
    mailbox.fail_list_auth = true;

    let scanned = scan_unapproved(
        &mut mailbox,
        &options("all"),
        &Classifier::default(),
        &AllowList::new(),
        &mut NoopObserver,
    )
    .await;
    assert!(matches!(scanned, Err(Error::Auth(_))));

    let mutated = mutate(
        &mut mailbox,
        &options("all"),
        &Classifier::default(),
        &AllowList::new(),
        MutationMode::Live,
        &mut NoopObserver,
    )
    .await;
    assert!(matches!(mutated, Err(Error::Auth(_))));
}

#[tokio::test]
async fn test_scan_unapproved_applies_allow_list() {
    let mut mailbox = MockMailbox::with_senders(&[
        "Boss <boss@work.com>",
        "Deals <deals@shop.example>",
        "Team <team@work.com>",
    ]);
    let unapproved = scan_unapproved(
        &mut mailbox,
        &options("all"),
        &Classifier::default(),
        &AllowList::from_entries(["@work.com"]),
        &mut NoopObserver,
    )
    .await
    .unwrap();

    assert_eq!(unapproved, senders(&["deals@shop.example"]));
}

#[tokio::test]
async fn test_single_delete_failure_is_skipped() {
    let mut mailbox = MockMailbox::numbered(5);
    mailbox.fail_delete.insert(3);

    let mut observer = RecordingObserver::default();
    let report = mutate(
        &mut mailbox,
        &options("all"),
        &Classifier::default(),
        &AllowList::new(),
        MutationMode::Live,
        &mut observer,
    )
    .await
    .unwrap();

    assert_eq!(report.count(), 4);
    assert_eq!(report.failed, 1);
    assert_eq!(report.targeted, 5);
    assert_eq!(mailbox.remaining(), vec![3]);
    assert_eq!(mailbox.single_calls, vec![1, 2, 3, 4, 5]);
    assert_eq!(observer.batch_failed, 1);
    assert_eq!(observer.delete_failed, 1);
    assert_eq!(observer.finished, Some((4, false)));
}

#[tokio::test]
async fn test_deletes_are_chunked_by_batch_limit() {
    let mut mailbox = MockMailbox::numbered(5);
    mailbox.batch_limit = 2;

    let report = mutate(
        &mut mailbox,
        &options("all"),
        &Classifier::default(),
        &AllowList::new(),
        MutationMode::Live,
        &mut NoopObserver,
    )
    .await
    .unwrap();

    assert_eq!(report.count(), 5);
    assert_eq!(mailbox.batch_calls, vec![vec![1, 2], vec![3, 4], vec![5]]);
    assert!(mailbox.single_calls.is_empty());
    assert!(mailbox.remaining().is_empty());
}

#[tokio::test]
async fn test_failed_batch_falls_back_per_message() {
    let mut mailbox = MockMailbox::numbered(4);
    mailbox.batch_limit = 2;
    mailbox.fail_batches = true;

    let report = mutate(
        &mut mailbox,
        &options("all"),
        &Classifier::default(),
        &AllowList::new(),
        MutationMode::Live,
        &mut NoopObserver,
    )
    .await
    .unwrap();

    assert_eq!(report.count(), 4);
    assert_eq!(report.failed, 0);
    assert_eq!(mailbox.single_calls, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_dry_run_matches_live_without_deleting() {
    let headers = [
        "Boss <boss@work.com>",
        "Spam <win@lottery.example>",
        "Mailer Daemon",
        "News <news@paper.example>",
        "Team <team@work.com>",
        "Spam again <win@lottery.example>",
    ];
    let allow_list = AllowList::from_entries(["work.com"]);

    let mut dry = MockMailbox::with_senders(&headers);
    let mut observer = RecordingObserver::default();
    let projected = mutate(
        &mut dry,
        &options("all"),
        &Classifier::default(),
        &allow_list,
        MutationMode::DryRun,
        &mut observer,
    )
    .await
    .unwrap();

    let mut live = MockMailbox::with_senders(&headers);
    let actual = mutate(
        &mut live,
        &options("all"),
        &Classifier::default(),
        &allow_list,
        MutationMode::Live,
        &mut NoopObserver,
    )
    .await
    .unwrap();

    assert_eq!(projected.count(), 3);
    assert_eq!(projected.count(), actual.count());
    assert!(projected.dry_run);
    assert_eq!(dry.delete_calls(), 0);
    assert_eq!(dry.remaining().len(), headers.len());
    assert_eq!(observer.finished, Some((3, true)));
    assert_eq!(live.remaining(), vec![1, 3, 5]);
}

#[tokio::test]
async fn test_nothing_to_delete_is_a_successful_zero() {
    let mut mailbox = MockMailbox::with_senders(&["Boss <boss@work.com>"]);
    let report = mutate(
        &mut mailbox,
        &options("all"),
        &Classifier::default(),
        &AllowList::from_entries(["boss@work.com"]),
        MutationMode::Live,
        &mut NoopObserver,
    )
    .await
    .unwrap();

    assert_eq!(report.count(), 0);
    assert_eq!(mailbox.delete_calls(), 0);
}

#[tokio::test]
async fn test_with_session_closes_on_success_and_error() {
    let ok_mailbox = MockMailbox::numbered(2);
    let ok_closed = Arc::clone(&ok_mailbox.closed);
    let mut auth = MockAuthenticator {
        mailbox: Some(ok_mailbox),
    };
    let found = with_session(&mut auth, async |client| {
        scan(client, &options("all"), &mut NoopObserver).await
    })
    .await
    .unwrap();
    assert_eq!(found.len(), 2);
    assert!(ok_closed.load(Ordering::SeqCst));

    let mut failing = MockMailbox::numbered(2);
    failing.fatal_fetch = Some(1);
    let err_closed = Arc::clone(&failing.closed);
    let mut auth = MockAuthenticator {
        mailbox: Some(failing),
    };
    let result = with_session(&mut auth, async |client| {
        scan(client, &options("all"), &mut NoopObserver).await
    })
    .await;
    assert!(result.is_err());
    assert!(err_closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_review_then_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = AllowListStore::new(dir.path().join("safe_list.json"));
    let classifier = Classifier::default();
    let headers = [
        "A <a@x.com>",
        "B <b@y.com>",
        "B again <b@y.com>",
        "Boss <boss@work.com>",
    ];

    let mut mailbox = MockMailbox::with_senders(&headers);
    let allow_list = AllowList::from_entries(["work.com"]);
    let unapproved = scan_unapproved(
        &mut mailbox,
        &options("all"),
        &classifier,
        &allow_list,
        &mut NoopObserver,
    )
    .await
    .unwrap();
    assert_eq!(unapproved, senders(&["a@x.com", "b@y.com"]));

    let clock = MockClock::shared();
    let mut session = ReviewSession::new(
        Arc::clone(&clock),
        Duration::from_secs(600),
        ScanLimit::All,
        allow_list,
        unapproved,
    );
    session
        .approve(&store, &classifier, &AllowList::from_entries(["y.com"]))
        .await
        .unwrap();
    assert_eq!(session.unapproved(), &senders(&["a@x.com"]));

    // The deletion reloads the list from disk, as a later invocation would.
    let persisted = store.load().await;
    assert_eq!(persisted, AllowList::from_entries(["work.com", "y.com"]));

    let report = mutate(
        &mut mailbox,
        &options("all"),
        &classifier,
        &persisted,
        MutationMode::Live,
        &mut NoopObserver,
    )
    .await
    .unwrap();
    session.clear();

    assert_eq!(report.count(), 1);
    assert_eq!(mailbox.remaining(), vec![2, 3, 4]);
    assert!(session.is_expired());
}
