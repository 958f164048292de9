//! `OAuth2` provider configurations.

use crate::error::{Error, Result};
use url::Url;

/// Full mailbox scope. Gmail's `messages.delete` and `messages.batchDelete`
/// accept nothing narrower.
pub const GMAIL_FULL_ACCESS_SCOPE: &str = "https://mail.google.com/";

/// `OAuth2` provider configuration.
#[derive(Debug, Clone)]
pub struct Provider {
    /// Provider name (e.g., "Google").
    pub name: String,
    /// Authorization endpoint URL.
    pub auth_url: Url,
    /// Token endpoint URL.
    pub token_url: Url,
    /// Default scopes.
    pub default_scopes: Vec<String>,
}

impl Provider {
    /// Creates a new provider configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if URLs are invalid.
    pub fn new(
        name: impl Into<String>,
        auth_url: impl AsRef<str>,
        token_url: impl AsRef<str>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            auth_url: Url::parse(auth_url.as_ref())?,
            token_url: Url::parse(token_url.as_ref())?,
            default_scopes: Vec::new(),
        })
    }

    /// Sets the default scopes.
    #[must_use]
    pub fn with_default_scopes(mut self, scopes: Vec<String>) -> Self {
        self.default_scopes = scopes;
        self
    }

    /// Google configuration scoped for Gmail message deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if URL parsing fails.
    pub fn google() -> Result<Self> {
        Ok(Self::new(
            "Google",
            "https://accounts.google.com/o/oauth2/v2/auth",
            "https://oauth2.googleapis.com/token",
        )?
        .with_default_scopes(vec![GMAIL_FULL_ACCESS_SCOPE.to_string()]))
    }

    /// Overrides the endpoints from a client secrets file, keeping the name and scopes.
    ///
    /// # Errors
    ///
    /// Returns an error if either URL is invalid.
    pub fn with_endpoints(mut self, auth_url: &str, token_url: &str) -> Result<Self> {
        self.auth_url = Url::parse(auth_url)?;
        self.token_url = Url::parse(token_url)?;
        Ok(self)
    }

    /// Whether Google-specific authorization parameters apply.
    #[must_use]
    pub fn is_google(&self) -> bool {
        self.name == "Google"
    }

    /// Validates that required URLs are set.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.auth_url.as_str().is_empty() {
            return Err(Error::InvalidConfig("auth_url is empty".into()));
        }
        if self.token_url.as_str().is_empty() {
            return Err(Error::InvalidConfig("token_url is empty".into()));
        }
        if self.default_scopes.is_empty() {
            return Err(Error::InvalidConfig("no scopes configured".into()));
        }
        Ok(())
    }
}
