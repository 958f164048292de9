//! `OAuth2` authorization flows.

mod code;
mod loopback;
mod pkce;

pub use code::AuthorizationCodeFlow;
pub use loopback::LoopbackReceiver;
pub use pkce::PkceChallenge;

use crate::error::Result;
use crate::provider::Provider;
use crate::secrets::ClientSecrets;
use crate::token::{ErrorResponse, Token, TokenResponse};
use reqwest::Client;
use tracing::debug;

/// Common `OAuth2` client configuration.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    /// Client ID from provider.
    pub client_id: String,
    /// Client secret (optional for public clients).
    pub client_secret: Option<String>,
    /// Redirect URI for authorization code flow.
    pub redirect_uri: Option<String>,
    /// Provider configuration.
    pub provider: Provider,
    /// HTTP client.
    http_client: Client,
}

impl OAuthClient {
    /// Creates a new OAuth client.
    #[must_use]
    pub fn new(client_id: impl Into<String>, provider: Provider) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: None,
            provider,
            http_client: Client::new(),
        }
    }

    /// Creates a client from downloaded client secrets.
    ///
    /// # Errors
    ///
    /// Returns an error if the secrets override the provider with an invalid URL.
    pub fn from_secrets(secrets: &ClientSecrets, provider: Provider) -> Result<Self> {
        let provider = secrets.apply_to(provider)?;
        let mut client = Self::new(secrets.client_id.clone(), provider);
        client.client_secret.clone_from(&secrets.client_secret);
        Ok(client)
    }

    /// Sets the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Sets the redirect URI.
    #[must_use]
    pub fn with_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.redirect_uri = Some(uri.into());
        self
    }

    /// Refreshes an access token using its refresh token.
    ///
    /// The returned token keeps the old refresh token when the server does
    /// not issue a new one.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh fails or if the token has no refresh token.
    pub async fn refresh_token(&self, token: &Token) -> Result<Token> {
        let refresh_token = token.refresh_token()?;

        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        debug!("Refreshing access token at {}", self.provider.token_url);
        let mut new_token = self.request_token(&params).await?;

        if new_token.refresh_token.is_none() {
            new_token.refresh_token.clone_from(&token.refresh_token);
        }

        Ok(new_token)
    }

    /// Exchanges an authorization code for tokens.
    pub(crate) async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: Option<&str>,
        code_verifier: Option<&str>,
    ) -> Result<Token> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(uri) = redirect_uri.or(self.redirect_uri.as_deref()) {
            params.push(("redirect_uri", uri));
        }
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret.as_str()));
        }
        if let Some(verifier) = code_verifier {
            params.push(("code_verifier", verifier));
        }

        debug!("Exchanging authorization code at {}", self.provider.token_url);
        self.request_token(&params).await
    }

    async fn request_token(&self, params: &[(&str, &str)]) -> Result<Token> {
        let response = self
            .http_client
            .post(self.provider.token_url.clone())
            .form(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let error: ErrorResponse = response.json().await?;
            return Err(error.into_error());
        }

        let token_response: TokenResponse = response.json().await?;
        Ok(Token::from_response(token_response))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_client_from_secrets() {
        let secrets = ClientSecrets::parse(
            r#"{"installed":{"client_id":"cid","client_secret":"shh"}}"#,
        )
        .unwrap();
        let client = OAuthClient::from_secrets(&secrets, Provider::google().unwrap()).unwrap();

        assert_eq!(client.client_id, "cid");
        assert_eq!(client.client_secret.as_deref(), Some("shh"));
        assert!(client.redirect_uri.is_none());
    }

    #[tokio::test]
    async fn test_refresh_without_refresh_token_fails_fast() {
        let client = OAuthClient::new("cid", Provider::google().unwrap());
        let err = client
            .refresh_token(&Token::new("a", "Bearer"))
            .await
            .unwrap_err();
        assert!(err.requires_consent());
    }
}
