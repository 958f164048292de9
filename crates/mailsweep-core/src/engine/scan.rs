//! Bounded mailbox scanning.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use tracing::warn;

use crate::allowlist::AllowList;
use crate::classify::{Classifier, UnapprovedSet};
use crate::error::Result;
use crate::mailbox::MailboxClient;
use crate::observer::SweepObserver;
use crate::sender::SenderIdentity;

/// Header carrying the sender address.
pub const SENDER_FIELD: &str = "From";

/// How many of the most recent messages a scan considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanLimit {
    /// Only the last `n` messages in enumeration order.
    Latest(NonZeroUsize),
    /// Every message in the folder.
    All,
}

impl Default for ScanLimit {
    fn default() -> Self {
        Self::Latest(NonZeroUsize::new(500).unwrap_or(NonZeroUsize::MIN))
    }
}

impl ScanLimit {
    /// Parses user input.
    ///
    /// Never fails: `all`, `0`, and anything that is not a non-negative
    /// integer select every message. Invalid input is logged.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Self::All;
        }

        match s.parse::<usize>() {
            Ok(n) => NonZeroUsize::new(n).map_or(Self::All, Self::Latest),
            Err(_) => {
                warn!("Invalid scan limit {s:?}, scanning all messages");
                Self::All
            }
        }
    }

    /// Keeps the tail of `handles` allowed by this limit.
    #[must_use]
    pub fn apply<T>(self, mut handles: Vec<T>) -> Vec<T> {
        if let Self::Latest(n) = self
            && handles.len() > n.get()
        {
            handles.drain(..handles.len() - n.get());
        }
        handles
    }
}

impl FromStr for ScanLimit {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ScanLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest(n) => write!(f, "{n}"),
            Self::All => f.write_str("all"),
        }
    }
}

/// Where and how far to scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Folder (IMAP mailbox or Gmail label) to enumerate.
    pub folder: String,
    /// Window of recent messages.
    pub limit: ScanLimit,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            folder: "INBOX".to_string(),
            limit: ScanLimit::default(),
        }
    }
}

impl ScanOptions {
    /// Creates options for `folder` with `limit`.
    #[must_use]
    pub fn new(folder: impl Into<String>, limit: ScanLimit) -> Self {
        Self {
            folder: folder.into(),
            limit,
        }
    }
}

/// A message whose sender was identified.
#[derive(Debug, Clone)]
pub struct ScannedMessage<H> {
    /// Transport handle, passed back to the client for deletion.
    pub handle: H,
    /// Extracted sender.
    pub sender: SenderIdentity,
}

/// Enumerates the scan window and resolves each message to its sender.
///
/// Messages whose header fetch fails, or whose sender cannot be extracted,
/// are reported to `observer` and left out.
///
/// # Errors
///
/// Fails on listing errors and on fatal (auth or connection) fetch errors.
pub async fn scan_messages<C, O>(
    client: &mut C,
    options: &ScanOptions,
    observer: &mut O,
) -> Result<Vec<ScannedMessage<C::Handle>>>
where
    C: MailboxClient,
    O: SweepObserver + ?Sized,
{
    let all = client.list_message_ids(&options.folder).await?;
    let total = all.len();
    let selected = options.limit.apply(all);
    observer.on_scan_started(&options.folder, total, selected.len());

    let mut scanned = Vec::with_capacity(selected.len());
    for handle in selected {
        let raw = match client.fetch_header_field(&handle, SENDER_FIELD).await {
            Ok(raw) => raw,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                observer.on_fetch_failed(&handle, &e);
                continue;
            }
        };

        match raw.as_deref().and_then(SenderIdentity::extract) {
            Some(sender) => scanned.push(ScannedMessage { handle, sender }),
            None => observer.on_unclassifiable(&handle, raw.as_deref()),
        }
    }

    Ok(scanned)
}

/// Returns the distinct senders in the scan window.
///
/// # Errors
///
/// See [`scan_messages`].
pub async fn scan<C, O>(
    client: &mut C,
    options: &ScanOptions,
    observer: &mut O,
) -> Result<BTreeSet<SenderIdentity>>
where
    C: MailboxClient,
    O: SweepObserver + ?Sized,
{
    let messages = scan_messages(client, options, observer).await?;
    Ok(messages.into_iter().map(|m| m.sender).collect())
}

/// Scans and keeps the senders `allow_list` does not cover.
///
/// # Errors
///
/// See [`scan_messages`].
pub async fn scan_unapproved<C, O>(
    client: &mut C,
    options: &ScanOptions,
    classifier: &Classifier,
    allow_list: &AllowList,
    observer: &mut O,
) -> Result<UnapprovedSet>
where
    C: MailboxClient,
    O: SweepObserver + ?Sized,
{
    let senders = scan(client, options, observer).await?;
    Ok(classifier.classify(&senders, allow_list))
}
