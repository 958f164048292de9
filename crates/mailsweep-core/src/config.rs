//! Persistent configuration.
//!
//! Stored as pretty JSON at `<config_dir>/mailsweep/config.json`. A missing
//! file means defaults; any field left out of the file also takes its
//! default.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::allowlist::AllowListStore;
use crate::classify::{Classifier, MatchStrategy};
use crate::engine::{ScanLimit, ScanOptions};
use crate::error::{Error, Result};
use crate::session::DEFAULT_SESSION_TTL;

const APP_DIR: &str = "mailsweep";

/// Platform config directory for the application.
#[must_use]
pub fn app_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Platform data directory for the application.
#[must_use]
pub fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Location of the allow-list file.
    pub allow_list_path: PathBuf,
    /// Scan window: a positive count or `all`. Invalid values mean `all`.
    pub scan_limit: String,
    /// Folder (IMAP) or label (Gmail) to sweep.
    pub folder: String,
    /// How allow-list entries match senders.
    #[serde(with = "match_strategy_serde")]
    pub match_strategy: MatchStrategy,
    /// Review session lifetime in seconds.
    pub session_ttl_secs: u64,
    /// Password backend settings.
    pub imap: ImapConfig,
    /// Gmail API backend settings.
    pub gmail: GmailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_list_path: app_data_dir().join("safe_list.json"),
            scan_limit: ScanLimit::default().to_string(),
            folder: "INBOX".to_string(),
            match_strategy: MatchStrategy::default(),
            session_ttl_secs: DEFAULT_SESSION_TTL.as_secs(),
            imap: ImapConfig::default(),
            gmail: GmailConfig::default(),
        }
    }
}

/// IMAP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    /// Server hostname.
    pub host: String,
    /// Implicit-TLS port.
    pub port: u16,
    /// Login name, usually the email address.
    pub username: Option<String>,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: "imap.gmail.com".to_string(),
            port: 993,
            username: None,
        }
    }
}

/// Gmail API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GmailConfig {
    /// `OAuth2` client secrets downloaded from Google Cloud Console.
    pub client_secrets_path: PathBuf,
    /// Where the access/refresh token is cached.
    pub token_path: PathBuf,
}

impl Default for GmailConfig {
    fn default() -> Self {
        let dir = app_config_dir();
        Self {
            client_secrets_path: dir.join("credentials.json"),
            token_path: dir.join("token.json"),
        }
    }
}

impl Config {
    /// Default config file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        app_config_dir().join("config.json")
    }

    /// Loads config from `path`, or defaults if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file exists but cannot be read or
    /// parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "cannot read {}: {e}",
                    path.display()
                )));
            }
        };

        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))
    }

    /// Writes config to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;

        info!("Config saved to {}", path.display());
        Ok(())
    }

    /// Parsed scan window.
    #[must_use]
    pub fn scan_limit(&self) -> ScanLimit {
        ScanLimit::parse(&self.scan_limit)
    }

    /// Folder and scan window for the engine.
    #[must_use]
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions::new(self.folder.clone(), self.scan_limit())
    }

    /// Classifier for the configured strategy.
    #[must_use]
    pub const fn classifier(&self) -> Classifier {
        Classifier::new(self.match_strategy)
    }

    /// Allow-list store at the configured path.
    #[must_use]
    pub fn allow_list_store(&self) -> AllowListStore {
        AllowListStore::new(self.allow_list_path.clone())
    }

    /// Review session lifetime.
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Serde helpers for `MatchStrategy`, kept as its string form.
mod match_strategy_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::classify::MatchStrategy;

    #[allow(clippy::trivially_copy_pass_by_ref)] // Required by serde with= signature
    pub fn serialize<S>(strategy: &MatchStrategy, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(strategy.as_str())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<MatchStrategy, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(MatchStrategy::parse(&s))
    }
}
