//! Gmail REST API backend.
//!
//! Sessions are bearer tokens: a cached token is reused while valid,
//! refreshed when expired, and only when neither works does the user go
//! through browser consent.

use std::path::PathBuf;

use mailsweep_oauth::{
    AuthorizationCodeFlow, ClientSecrets, LoopbackReceiver, OAuthClient, Provider, Token,
    TokenStore,
};
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::GmailConfig;
use crate::error::{Error, Result};
use crate::mailbox::{Authenticator, MailboxClient, MailboxError};

/// Gmail API base URL.
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Maximum ids accepted by `messages.batchDelete`.
pub const GMAIL_BATCH_LIMIT: usize = 1000;

const PAGE_SIZE: &str = "500";
const CONSENT_TIMEOUT_SECS: u64 = 300;

/// Obtains Gmail access tokens and opens API sessions with them.
#[derive(Debug)]
pub struct GmailAuthenticator {
    secrets_path: PathBuf,
    store: TokenStore,
    base_url: String,
    http: Client,
    token: Option<Token>,
    consented: bool,
}

impl GmailAuthenticator {
    /// Creates an authenticator using the configured secrets and token paths.
    #[must_use]
    pub fn new(config: &GmailConfig) -> Self {
        Self {
            secrets_path: config.client_secrets_path.clone(),
            store: TokenStore::new(config.token_path.clone()),
            base_url: GMAIL_API_BASE.to_string(),
            http: Client::new(),
            token: None,
            consented: false,
        }
    }

    /// Points sessions at a different API root (for testing).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Returns a usable access token, refreshing or asking for consent as
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be loaded, refreshed, or
    /// obtained through consent.
    pub async fn access_token(&mut self) -> Result<String> {
        if let Some(token) = &self.token
            && !token.is_expired()
        {
            return Ok(token.access_token.clone());
        }

        let stored = match self.token.take() {
            Some(token) => Some(token),
            None => self.store.load().await?,
        };

        let token = match stored {
            Some(token) if !token.is_expired() => token,
            Some(token) if token.can_refresh() => match self.refresh(&token).await {
                Ok(token) => token,
                Err(Error::OAuth(e)) if e.requires_consent() => {
                    warn!("Stored refresh token was rejected, asking for consent again");
                    self.authorize().await?
                }
                Err(e) => return Err(e),
            },
            _ => self.authorize().await?,
        };

        let access = token.access_token.clone();
        self.token = Some(token);
        Ok(access)
    }

    /// Runs the browser consent flow and stores the resulting token.
    ///
    /// # Errors
    ///
    /// Returns an error if the client secrets are missing, the user denies
    /// access, or the code exchange fails. A second consent in the same
    /// process is refused.
    pub async fn authorize(&mut self) -> Result<Token> {
        if self.consented {
            return Err(Error::Auth(
                "consent was already granted in this run but the token is unusable".into(),
            ));
        }
        self.consented = true;

        let secrets = ClientSecrets::load(&self.secrets_path).await?;
        let receiver = LoopbackReceiver::bind().await?;
        let redirect_uri = receiver.redirect_uri();

        let client = OAuthClient::from_secrets(&secrets, Provider::google()?)?
            .with_redirect_uri(&redirect_uri);
        let flow = AuthorizationCodeFlow::new(client).with_pkce();

        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let url = flow.authorization_url(None, Some(&state))?;

        info!("Opening browser for Gmail consent");
        if let Err(e) = opener::open(url.as_str()) {
            warn!("Could not open a browser ({e}); visit this URL to continue: {url}");
        }

        let code = receiver.wait_for_code(&state, CONSENT_TIMEOUT_SECS).await?;
        let token = flow.exchange_code(&code, Some(&redirect_uri)).await?;

        self.store.save(&token).await?;
        info!("Gmail authorization saved to {}", self.store.path().display());
        Ok(token)
    }

    async fn refresh(&self, token: &Token) -> Result<Token> {
        debug!("Gmail access token expired, refreshing");
        let secrets = ClientSecrets::load(&self.secrets_path).await?;
        let client = OAuthClient::from_secrets(&secrets, Provider::google()?)?;

        let refreshed = client.refresh_token(token).await?;
        self.store.save(&refreshed).await?;
        Ok(refreshed)
    }
}

impl Authenticator for GmailAuthenticator {
    type Client = GmailMailbox;

    async fn open_session(&mut self) -> Result<GmailMailbox> {
        let access_token = self.access_token().await?;
        Ok(GmailMailbox::new(self.http.clone(), &self.base_url, access_token))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

/// An authorized Gmail API session.
#[derive(Clone)]
pub struct GmailMailbox {
    http: Client,
    base_url: String,
    access_token: String,
}

impl std::fmt::Debug for GmailMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GmailMailbox")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GmailMailbox {
    /// Creates a session against `base_url` with a ready access token.
    #[must_use]
    pub fn new(http: Client, base_url: &str, access_token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    fn message_url(&self, id: &str) -> std::result::Result<String, MailboxError> {
        if id.is_empty() || id.contains(['/', '\\', '?', '#']) || id.contains("..") {
            return Err(MailboxError::message(id, "invalid message id"));
        }
        Ok(format!("{}/messages/{id}", self.base_url))
    }
}

impl MailboxClient for GmailMailbox {
    type Handle = String;

    fn batch_limit(&self) -> usize {
        GMAIL_BATCH_LIMIT
    }

    async fn list_message_ids(
        &mut self,
        folder: &str,
    ) -> std::result::Result<Vec<String>, MailboxError> {
        let url = format!("{}/messages", self.base_url);
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(&self.access_token)
                .query(&[("labelIds", folder), ("maxResults", PAGE_SIZE)]);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page)]);
            }

            let response = request.send().await.map_err(connection_error)?;
            let page: ListResponse = check(response, None)
                .await?
                .json()
                .await
                .map_err(connection_error)?;

            ids.extend(page.messages.into_iter().map(|m| m.id));
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        // The API lists newest first.
        ids.reverse();
        debug!("{folder} has {} messages", ids.len());
        Ok(ids)
    }

    async fn fetch_header_field(
        &mut self,
        id: &String,
        field: &str,
    ) -> std::result::Result<Option<String>, MailboxError> {
        let response = self
            .http
            .get(self.message_url(id)?)
            .bearer_auth(&self.access_token)
            .query(&[("format", "metadata"), ("metadataHeaders", field)])
            .send()
            .await
            .map_err(connection_error)?;

        let metadata: MetadataResponse = check(response, Some(id.as_str()))
            .await?
            .json()
            .await
            .map_err(|e| MailboxError::message(id, e.to_string()))?;

        Ok(metadata.payload.and_then(|payload| {
            payload
                .headers
                .into_iter()
                .find(|h| h.name.eq_ignore_ascii_case(field))
                .map(|h| h.value)
        }))
    }

    async fn delete(&mut self, id: &String) -> std::result::Result<(), MailboxError> {
        let response = self
            .http
            .delete(self.message_url(id)?)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(connection_error)?;

        check(response, Some(id.as_str())).await?;
        Ok(())
    }

    async fn delete_batch(&mut self, ids: &[String]) -> std::result::Result<(), MailboxError> {
        let response = self
            .http
            .post(format!("{}/messages/batchDelete", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&serde_json::json!({ "ids": ids }))
            .send()
            .await
            .map_err(connection_error)?;

        let label = format!("batch of {}", ids.len());
        check(response, Some(label.as_str())).await?;
        Ok(())
    }

    async fn close(self) -> std::result::Result<(), MailboxError> {
        Ok(())
    }
}

fn connection_error(err: reqwest::Error) -> MailboxError {
    MailboxError::Connection(err.to_string())
}

#[derive(Debug, Default, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Whether an error response means "slow down" rather than "not allowed".
/// Gmail sends quota errors as 403 with a rate-limit reason, or as 429.
fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    status == StatusCode::FORBIDDEN
        && serde_json::from_str::<ErrorResponse>(body)
            .unwrap_or_default()
            .error
            .errors
            .iter()
            .any(|e| matches!(e.reason.as_str(), "rateLimitExceeded" | "userRateLimitExceeded"))
}

/// Maps a status and error body to the matching error. Requests about a
/// single message (`id` is set) fail per-message, listing failures are
/// fatal. Throttling is never an authentication failure.
fn classify_failure(status: StatusCode, body: &str, id: Option<&str>) -> MailboxError {
    let reason = format!("{status}: {}", body.trim());

    if is_rate_limited(status, body) {
        return match id {
            Some(id) => MailboxError::message(id, reason),
            None => MailboxError::Connection(reason),
        };
    }

    match (status, id) {
        (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN, _) => MailboxError::Auth(reason),
        (_, Some(id)) => MailboxError::message(id, reason),
        (_, None) => MailboxError::Connection(reason),
    }
}

async fn check(response: Response, id: Option<&str>) -> std::result::Result<Response, MailboxError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_failure(status, &body, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_url_rejects_traversal() {
        let mailbox = GmailMailbox::new(Client::new(), "https://example.test/", "t");
        assert_eq!(
            mailbox.message_url("18c3f").ok().as_deref(),
            Some("https://example.test/messages/18c3f")
        );
        assert!(mailbox.message_url("../labels").is_err());
        assert!(mailbox.message_url("").is_err());
    }

    const USER_RATE_LIMIT: &str = r#"{"error":{"code":403,"message":"User-rate limit exceeded",
        "errors":[{"domain":"usageLimits","reason":"userRateLimitExceeded"}]}}"#;

    #[test]
    fn test_throttling_is_not_an_auth_failure() {
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, USER_RATE_LIMIT, Some("m1")),
            MailboxError::Message { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, "", Some("m1")),
            MailboxError::Message { .. }
        ));
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, USER_RATE_LIMIT, None),
            MailboxError::Connection(_)
        ));
    }

    #[test]
    fn test_permission_denied_is_an_auth_failure() {
        let scope = r#"{"error":{"code":403,"errors":[{"reason":"insufficientPermissions"}]}}"#;
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, scope, Some("m1")),
            MailboxError::Auth(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::FORBIDDEN, "not json", Some("m1")),
            MailboxError::Auth(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "", None),
            MailboxError::Auth(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::NOT_FOUND, "", Some("m1")),
            MailboxError::Message { .. }
        ));
    }

    #[test]
    fn test_debug_hides_token() {
        let mailbox = GmailMailbox::new(Client::new(), GMAIL_API_BASE, "ya29.secret");
        assert!(!format!("{mailbox:?}").contains("ya29"));
    }
}
