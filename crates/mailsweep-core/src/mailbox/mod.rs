//! Mailbox collaborator contracts.
//!
//! The engine never speaks a wire protocol itself. It drives a
//! [`MailboxClient`] obtained from an [`Authenticator`], and only ever hands
//! the client's opaque message handles back to it.
//!
//! Two adapters ship with the crate: [`crate::service::imap`] (password
//! login over IMAP) and [`crate::service::gmail`] (`OAuth2` token against the
//! Gmail REST API).

use std::fmt;

use thiserror::Error;
use tracing::warn;

use crate::error::Result;

/// Failures reported by a mailbox client.
#[derive(Debug, Error)]
pub enum MailboxError {
    /// Credentials were rejected or have expired.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The connection itself failed; nothing further can be done on it.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A single message could not be fetched or deleted.
    #[error("Message {id}: {reason}")]
    Message {
        /// Transport identifier of the message, for logs.
        id: String,
        /// What went wrong.
        reason: String,
    },
}

impl MailboxError {
    /// Creates a message-level error.
    #[must_use]
    pub fn message(id: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::Message {
            id: id.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the error aborts the current operation.
    ///
    /// Message-level failures are skipped; everything else surfaces.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::Message { .. })
    }
}

/// An open session against one mailbox.
///
/// Calls are made sequentially; implementations need not be reentrant.
#[allow(async_fn_in_trait)]
pub trait MailboxClient {
    /// Transport-specific message identifier.
    type Handle: Clone + fmt::Debug;

    /// Largest number of handles [`MailboxClient::delete_batch`] accepts at once.
    fn batch_limit(&self) -> usize;

    /// Lists every message in `folder`, oldest first.
    async fn list_message_ids(&mut self, folder: &str)
    -> std::result::Result<Vec<Self::Handle>, MailboxError>;

    /// Fetches one header field without downloading the message body.
    ///
    /// Returns `Ok(None)` when the message has no such header.
    async fn fetch_header_field(
        &mut self,
        handle: &Self::Handle,
        field: &str,
    ) -> std::result::Result<Option<String>, MailboxError>;

    /// Deletes one message.
    async fn delete(&mut self, handle: &Self::Handle) -> std::result::Result<(), MailboxError>;

    /// Deletes up to [`MailboxClient::batch_limit`] messages in one request.
    ///
    /// An error means the batch may have been partially applied.
    async fn delete_batch(
        &mut self,
        handles: &[Self::Handle],
    ) -> std::result::Result<(), MailboxError>;

    /// Releases the session.
    async fn close(self) -> std::result::Result<(), MailboxError>
    where
        Self: Sized;
}

/// Produces ready-to-use mailbox sessions.
#[allow(async_fn_in_trait)]
pub trait Authenticator {
    /// The client this authenticator opens.
    type Client: MailboxClient;

    /// Connects and authenticates.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Auth`] when credentials are rejected and
    /// [`crate::Error::Transport`] when the server cannot be reached.
    async fn open_session(&mut self) -> Result<Self::Client>;
}

/// Opens a session, runs `f` on it, and closes it on every exit path.
///
/// A failure to close after `f` succeeded is logged rather than returned,
/// since the work (possibly deletions) has already happened.
///
/// # Errors
///
/// Returns the error from opening the session or from `f`.
pub async fn with_session<A, T, F>(auth: &mut A, f: F) -> Result<T>
where
    A: Authenticator,
    F: AsyncFnOnce(&mut A::Client) -> Result<T>,
{
    let mut client = auth.open_session().await?;
    let result = f(&mut client).await;

    if let Err(e) = client.close().await {
        warn!("Failed to close mailbox session: {e}");
    }

    result
}
