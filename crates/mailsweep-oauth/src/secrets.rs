//! Google client secrets (`credentials.json`) loading.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::provider::Provider;

/// OAuth client identity downloaded from the Google Cloud Console.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecrets {
    /// Client ID.
    pub client_id: String,
    /// Client secret (installed apps still receive one).
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Authorization endpoint, if the file names one.
    #[serde(default)]
    pub auth_uri: Option<String>,
    /// Token endpoint, if the file names one.
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// The file wraps the secrets in an `installed` or `web` object.
#[derive(Debug, Deserialize)]
struct SecretsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

impl ClientSecrets {
    /// Parses the contents of a `credentials.json` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or has neither an
    /// `installed` nor a `web` section.
    pub fn parse(contents: &str) -> Result<Self> {
        let file: SecretsFile = serde_json::from_str(contents)?;
        file.installed.or(file.web).ok_or_else(|| {
            Error::InvalidConfig("client secrets file has no `installed` or `web` section".into())
        })
    }

    /// Reads and parses a `credentials.json` file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] naming the path when the file does not exist.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::InvalidConfig(format!(
                    "download your OAuth 2.0 client credentials from the Google Cloud Console \
                     and save them as '{}'",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        Self::parse(&contents)
    }

    /// Applies endpoint overrides from the file to a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if an override URL is invalid.
    pub fn apply_to(&self, provider: Provider) -> Result<Provider> {
        match (&self.auth_uri, &self.token_uri) {
            (Some(auth), Some(token)) => provider.with_endpoints(auth, token),
            _ => Ok(provider),
        }
    }
}
