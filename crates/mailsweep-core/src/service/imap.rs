//! Password-authenticated IMAP backend.
//!
//! Messages are addressed by UID, and UID order is arrival order. Only the
//! requested header field is ever fetched, with `BODY.PEEK` so nothing gets
//! marked as read.

use std::fmt::Debug;
use std::sync::{Arc, LazyLock};

use async_imap::{Client, Session};
use futures::TryStreamExt;
use mailparse::MailHeaderMap;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info};

use crate::config::ImapConfig;
use crate::error::{Error, Result};
use crate::mailbox::{Authenticator, MailboxClient, MailboxError};

/// Largest UID set sent in one STORE/EXPUNGE pair.
pub const IMAP_BATCH_LIMIT: usize = 500;

static TLS_CONNECTOR: LazyLock<TlsConnector> = LazyLock::new(|| {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
});

/// Stream types an IMAP session can run over.
pub trait ImapStream: AsyncRead + AsyncWrite + Unpin + Debug + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Debug + Send> ImapStream for T {}

/// Consumes the untagged greeting a server sends on connect.
///
/// # Errors
///
/// Returns [`MailboxError::Connection`] if the server hangs up first or the
/// greeting cannot be read.
pub async fn read_greeting<T: ImapStream>(
    client: &mut Client<T>,
) -> std::result::Result<(), MailboxError> {
    client
        .read_response()
        .await
        .ok_or_else(|| MailboxError::Connection("server closed before greeting".into()))?
        .map_err(|e| MailboxError::Connection(format!("bad server greeting: {e}")))?;
    Ok(())
}

/// Opens IMAP sessions with a username and password.
#[derive(Clone)]
pub struct ImapAuthenticator {
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl std::fmt::Debug for ImapAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapAuthenticator")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl ImapAuthenticator {
    /// Creates an authenticator for `username` on `host:port`.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Creates an authenticator from config plus a resolved password.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no username is configured.
    pub fn from_config(config: &ImapConfig, password: impl Into<String>) -> Result<Self> {
        let username = config
            .username
            .clone()
            .ok_or_else(|| Error::Config("imap.username is not set".into()))?;
        Ok(Self::new(config.host.clone(), config.port, username, password))
    }

    async fn connect(&self) -> std::result::Result<Client<TlsStream<TcpStream>>, MailboxError> {
        debug!("Connecting to {}:{}", self.host, self.port);

        let tcp = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| MailboxError::Connection(format!("{}: {e}", self.host)))?;

        let domain = ServerName::try_from(self.host.clone())
            .map_err(|e| MailboxError::Connection(format!("invalid host {}: {e}", self.host)))?;

        let tls = TLS_CONNECTOR
            .connect(domain, tcp)
            .await
            .map_err(|e| MailboxError::Connection(format!("TLS handshake failed: {e}")))?;

        let mut client = Client::new(tls);
        read_greeting(&mut client).await?;
        Ok(client)
    }
}

impl Authenticator for ImapAuthenticator {
    type Client = ImapMailbox;

    async fn open_session(&mut self) -> Result<ImapMailbox> {
        let client = self.connect().await?;
        let mailbox = ImapMailbox::login(client, &self.username, &self.password).await?;
        info!("Logged in to {} as {}", self.host, self.username);
        Ok(mailbox)
    }
}

/// An authenticated IMAP session.
pub struct ImapMailbox<T: ImapStream = TlsStream<TcpStream>> {
    session: Session<T>,
    uidplus: bool,
}

impl<T: ImapStream> std::fmt::Debug for ImapMailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImapMailbox")
            .field("uidplus", &self.uidplus)
            .finish_non_exhaustive()
    }
}

impl<T: ImapStream> ImapMailbox<T> {
    /// Logs in on a greeted connection and checks for UIDPLUS.
    ///
    /// # Errors
    ///
    /// Returns [`MailboxError::Auth`] if the server rejects the login.
    pub async fn login(
        client: Client<T>,
        username: &str,
        password: &str,
    ) -> std::result::Result<Self, MailboxError> {
        let mut session = client
            .login(username, password)
            .await
            .map_err(|(e, _)| MailboxError::Auth(format!("login failed for {username}: {e}")))?;

        let uidplus = session
            .capabilities()
            .await
            .map(|caps| caps.has_str("UIDPLUS"))
            .map_err(connection_error)?;

        Ok(Self { session, uidplus })
    }

    async fn mark_and_expunge(&mut self, uid_set: &str) -> std::result::Result<(), MailboxError> {
        self.session
            .uid_store(uid_set, "+FLAGS.SILENT (\\Deleted)")
            .await
            .map_err(|e| message_error(uid_set, e))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| message_error(uid_set, e))?;

        // Without UIDPLUS a plain EXPUNGE also removes anything else already
        // flagged \Deleted in this folder.
        if self.uidplus {
            self.session
                .uid_expunge(uid_set)
                .await
                .map_err(|e| message_error(uid_set, e))?
                .try_collect::<Vec<_>>()
                .await
                .map_err(|e| message_error(uid_set, e))?;
        } else {
            self.session
                .expunge()
                .await
                .map_err(|e| message_error(uid_set, e))?
                .try_collect::<Vec<_>>()
                .await
                .map_err(|e| message_error(uid_set, e))?;
        }

        Ok(())
    }
}

impl<T: ImapStream> MailboxClient for ImapMailbox<T> {
    type Handle = u32;

    fn batch_limit(&self) -> usize {
        IMAP_BATCH_LIMIT
    }

    async fn list_message_ids(
        &mut self,
        folder: &str,
    ) -> std::result::Result<Vec<u32>, MailboxError> {
        self.session.select(folder).await.map_err(connection_error)?;

        let mut uids: Vec<u32> = self
            .session
            .uid_search("ALL")
            .await
            .map_err(connection_error)?
            .into_iter()
            .collect();
        uids.sort_unstable();

        debug!("{folder} has {} messages", uids.len());
        Ok(uids)
    }

    async fn fetch_header_field(
        &mut self,
        uid: &u32,
        field: &str,
    ) -> std::result::Result<Option<String>, MailboxError> {
        let query = format!("BODY.PEEK[HEADER.FIELDS ({})]", field.to_ascii_uppercase());
        let fetches: Vec<_> = self
            .session
            .uid_fetch(uid.to_string(), &query)
            .await
            .map_err(|e| message_error(uid, e))?
            .try_collect()
            .await
            .map_err(|e| message_error(uid, e))?;

        let header = fetches
            .iter()
            .find_map(async_imap::types::Fetch::header)
            .ok_or_else(|| MailboxError::message(uid, "no header in FETCH response"))?;

        let (headers, _) =
            mailparse::parse_headers(header).map_err(|e| MailboxError::message(uid, e.to_string()))?;
        Ok(headers.get_first_value(field))
    }

    async fn delete(&mut self, uid: &u32) -> std::result::Result<(), MailboxError> {
        self.mark_and_expunge(&uid.to_string()).await
    }

    async fn delete_batch(&mut self, uids: &[u32]) -> std::result::Result<(), MailboxError> {
        let uid_set = uids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        self.mark_and_expunge(&uid_set).await
    }

    async fn close(mut self) -> std::result::Result<(), MailboxError> {
        self.session.logout().await.map_err(connection_error)
    }
}

fn connection_error(err: async_imap::error::Error) -> MailboxError {
    MailboxError::Connection(err.to_string())
}

/// Server refusals (NO/BAD, parse trouble) stay per-message; a broken
/// stream does not.
fn message_error(id: impl std::fmt::Display, err: async_imap::error::Error) -> MailboxError {
    match err {
        async_imap::error::Error::Io(_) | async_imap::error::Error::ConnectionLost => {
            connection_error(err)
        }
        other => MailboxError::message(id, other.to_string()),
    }
}
