//! Review session state.
//!
//! Between a scan and the final deletion the user reviews the unapproved
//! senders and approves some of them. That state lives in an explicit
//! [`ReviewSession`] value with a fixed lifetime instead of anything
//! process-wide.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::allowlist::{AllowList, AllowListStore};
use crate::classify::{Classifier, Reconciliation, UnapprovedSet, reconcile};
use crate::engine::ScanLimit;
use crate::error::{Error, Result};
use crate::time::{Clock, SystemClock};

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

/// One review round: a scan's unapproved senders plus the allow-list they
/// were classified against.
#[derive(Debug)]
pub struct ReviewSession<C: Clock = SystemClock> {
    clock: C,
    ttl: Duration,
    started: Instant,
    cleared: bool,
    scan_limit: ScanLimit,
    allow_list: AllowList,
    unapproved: UnapprovedSet,
}

impl ReviewSession<SystemClock> {
    /// Starts a session on the system clock that lasts `ttl`.
    #[must_use]
    pub fn start(
        ttl: Duration,
        scan_limit: ScanLimit,
        allow_list: AllowList,
        unapproved: UnapprovedSet,
    ) -> Self {
        Self::new(SystemClock, ttl, scan_limit, allow_list, unapproved)
    }
}

impl<C: Clock> ReviewSession<C> {
    /// Starts a session that expires `ttl` after now on `clock`.
    #[must_use]
    pub fn new(
        clock: C,
        ttl: Duration,
        scan_limit: ScanLimit,
        allow_list: AllowList,
        unapproved: UnapprovedSet,
    ) -> Self {
        let started = clock.now();
        Self {
            clock,
            ttl,
            started,
            cleared: false,
            scan_limit,
            allow_list,
            unapproved,
        }
    }

    /// Whether the session has timed out or been cleared.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.cleared || self.clock.elapsed(self.started) >= self.ttl
    }

    /// Time left before expiry.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        if self.cleared {
            return Duration::ZERO;
        }
        self.ttl.saturating_sub(self.clock.elapsed(self.started))
    }

    /// Scan window the session was created with.
    #[must_use]
    pub const fn scan_limit(&self) -> ScanLimit {
        self.scan_limit
    }

    /// Allow-list as of the last scan or reconciliation.
    #[must_use]
    pub const fn allow_list(&self) -> &AllowList {
        &self.allow_list
    }

    /// Senders still awaiting a decision.
    #[must_use]
    pub const fn unapproved(&self) -> &UnapprovedSet {
        &self.unapproved
    }

    /// Replaces the session state with a reconciliation result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionExpired`] if the session is no longer active.
    pub fn apply(&mut self, result: Reconciliation) -> Result<()> {
        if self.is_expired() {
            return Err(Error::SessionExpired);
        }
        self.allow_list = result.allow_list;
        self.unapproved = result.unapproved;
        Ok(())
    }

    /// Reconciles `newly_approved` against this session and applies the
    /// result.
    ///
    /// The expiry check happens before anything is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionExpired`] for an inactive session, or the
    /// storage error from persisting the allow-list.
    pub async fn approve(
        &mut self,
        store: &AllowListStore,
        classifier: &Classifier,
        newly_approved: &AllowList,
    ) -> Result<()> {
        if self.is_expired() {
            return Err(Error::SessionExpired);
        }
        let result = reconcile(
            store,
            classifier,
            &self.unapproved,
            newly_approved,
            &self.allow_list,
        )
        .await?;
        self.apply(result)
    }

    /// Ends the session, dropping its state.
    pub fn clear(&mut self) {
        debug!("Clearing review session");
        self.cleared = true;
        self.allow_list = AllowList::new();
        self.unapproved.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::sender::SenderIdentity;
    use crate::time::MockClock;

    fn session(clock: &Arc<MockClock>) -> ReviewSession<Arc<MockClock>> {
        ReviewSession::new(
            Arc::clone(clock),
            Duration::from_secs(60),
            ScanLimit::All,
            AllowList::new(),
            ["a@x.com", "b@y.com"].map(SenderIdentity::new).into(),
        )
    }

    #[test]
    fn test_expires_after_ttl() {
        let clock = MockClock::shared();
        let session = session(&clock);

        clock.advance(Duration::from_secs(59));
        assert!(!session.is_expired());
        assert_eq!(session.remaining(), Duration::from_secs(1));

        clock.advance(Duration::from_secs(1));
        assert!(session.is_expired());
    }

    #[test]
    fn test_start_uses_given_ttl() {
        let session = ReviewSession::start(
            DEFAULT_SESSION_TTL,
            ScanLimit::parse("50"),
            AllowList::new(),
            UnapprovedSet::new(),
        );
        assert!(!session.is_expired());
        assert!(session.remaining() <= DEFAULT_SESSION_TTL);
        assert_eq!(session.scan_limit(), ScanLimit::parse("50"));

        let zero = ReviewSession::start(
            Duration::ZERO,
            ScanLimit::All,
            AllowList::new(),
            UnapprovedSet::new(),
        );
        assert!(zero.is_expired());
    }

    #[test]
    fn test_expired_session_refuses_apply() {
        let clock = MockClock::shared();
        let mut session = session(&clock);
        clock.advance(Duration::from_secs(120));

        let result = session.apply(Reconciliation {
            allow_list: AllowList::from_entries(["x.com"]),
            unapproved: UnapprovedSet::new(),
        });
        assert!(matches!(result, Err(Error::SessionExpired)));
        assert_eq!(session.unapproved().len(), 2);
    }

    #[tokio::test]
    async fn test_approve_reconciles_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let store = AllowListStore::new(dir.path().join("safe_list.json"));
        let clock = MockClock::shared();
        let mut session = session(&clock);

        session
            .approve(&store, &Classifier::default(), &AllowList::from_entries(["y.com"]))
            .await
            .unwrap();

        assert_eq!(
            session.unapproved(),
            &UnapprovedSet::from([SenderIdentity::new("a@x.com")])
        );
        assert!(store.load().await.contains("y.com"));
    }

    #[tokio::test]
    async fn test_expired_approve_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("safe_list.json");
        let store = AllowListStore::new(&path);
        let clock = MockClock::shared();
        let mut session = session(&clock);
        clock.advance(Duration::from_secs(61));

        let result = session
            .approve(&store, &Classifier::default(), &AllowList::from_entries(["y.com"]))
            .await;

        assert!(matches!(result, Err(Error::SessionExpired)));
        assert!(!path.exists());
    }

    #[test]
    fn test_clear_is_terminal() {
        let clock = MockClock::shared();
        let mut session = session(&clock);
        session.clear();

        assert!(session.is_expired());
        assert!(session.unapproved().is_empty());
        assert_eq!(session.remaining(), Duration::ZERO);
    }
}
