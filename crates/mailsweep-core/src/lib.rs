//! # mailsweep-core
//!
//! Sender classification and bulk deletion engine for `mailsweep`.
//!
//! This crate provides:
//! - **Allow-list** - a persisted, sorted set of safe-sender patterns
//! - **Sender extraction** - a normalized address from a raw `From` header
//! - **Scanning** - bounded enumeration of a folder's most recent messages
//! - **Classification** - safe/unapproved split under a swappable match rule
//! - **Reconciliation** - incremental reclassification as senders are approved
//! - **Bulk deletion** - batched, failure-tolerant deletes with a dry-run mode
//! - **Backends** - IMAP (password) and Gmail API (`OAuth2`) mailbox clients
//!
//! The usual flow is scan, review (reconcile repeatedly), then delete:
//!
//! ```no_run
//! use mailsweep_core::{
//!     Config, MutationMode, TracingObserver, with_session, mutate,
//!     service::ImapAuthenticator,
//! };
//!
//! # async fn run() -> mailsweep_core::Result<()> {
//! let config = Config::load(&Config::default_path()).await?;
//! let allow_list = config.allow_list_store().load().await;
//! let mut auth = ImapAuthenticator::from_config(&config.imap, "app-password")?;
//!
//! let report = with_session(&mut auth, async |client| {
//!     mutate(
//!         client,
//!         &config.scan_options(),
//!         &config.classifier(),
//!         &allow_list,
//!         MutationMode::DryRun,
//!         &mut TracingObserver,
//!     )
//!     .await
//! })
//! .await?;
//!
//! println!("Would delete {}", report.count());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod allowlist;
pub mod classify;
pub mod config;
pub mod credentials;
pub mod engine;
mod error;
pub mod mailbox;
pub mod observer;
pub mod sender;
pub mod service;
pub mod session;
pub mod time;

pub use allowlist::{AllowList, AllowListStore};
pub use classify::{Classifier, MatchStrategy, Reconciliation, UnapprovedSet, reconcile};
pub use config::{Config, GmailConfig, ImapConfig};
pub use credentials::{CredentialError, CredentialResult};
pub use engine::{
    MutationMode, MutationReport, ScanLimit, ScanOptions, ScannedMessage, mutate, scan,
    scan_messages, scan_unapproved,
};
pub use error::{Error, Result};
pub use mailbox::{Authenticator, MailboxClient, MailboxError, with_session};
pub use observer::{NoopObserver, SweepObserver, TracingObserver};
pub use sender::SenderIdentity;
pub use session::ReviewSession;
pub use time::{Clock, MockClock, SystemClock};
