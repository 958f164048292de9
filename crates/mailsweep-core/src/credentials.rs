//! IMAP password lookup.
//!
//! Passwords come from, in order: an explicit value (a command-line flag),
//! the `MAILSWEEP_PASSWORD` environment variable, or the platform keyring:
//! - Linux: Secret Service (GNOME Keyring, `KWallet`)
//! - macOS: Keychain
//! - Windows: Credential Manager

use keyring::Entry;
use tracing::debug;

/// Service name used for keyring entries.
const SERVICE_NAME: &str = "mailsweep";

/// Environment variable consulted before the keyring.
pub const PASSWORD_ENV: &str = "MAILSWEEP_PASSWORD";

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Failed to access keyring.
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// No password was supplied and none is stored.
    #[error(
        "No password for {0}; pass --password, set MAILSWEEP_PASSWORD, or run `mailsweep store-password`"
    )]
    Missing(String),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

fn entry(username: &str) -> CredentialResult<Entry> {
    Ok(Entry::new(SERVICE_NAME, &format!("imap_{username}"))?)
}

/// Stores the IMAP password for `username` in the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn store_password(username: &str, password: &str) -> CredentialResult<()> {
    entry(username)?.set_password(password)?;
    debug!("Stored IMAP password for {username}");
    Ok(())
}

/// Retrieves the IMAP password for `username` from the system keyring.
///
/// # Errors
///
/// Returns an error if the keyring operation fails.
pub fn get_password(username: &str) -> CredentialResult<Option<String>> {
    match entry(username)?.get_password() {
        Ok(password) => Ok(Some(password)),
        Err(keyring::Error::NoEntry) => {
            debug!("No IMAP password found for {username}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Removes the stored password, if any.
///
/// # Errors
///
/// Returns an error if the keyring operation fails (except for missing entries).
pub fn delete_password(username: &str) -> CredentialResult<()> {
    match entry(username)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Picks the first available password source.
///
/// # Errors
///
/// Returns [`CredentialError::Missing`] if no source has a password, or a
/// keyring error if the keyring could not be queried.
pub fn resolve_password(username: &str, explicit: Option<String>) -> CredentialResult<String> {
    resolve_with(username, explicit, std::env::var(PASSWORD_ENV).ok(), || {
        get_password(username)
    })
}

fn resolve_with(
    username: &str,
    explicit: Option<String>,
    from_env: Option<String>,
    from_keyring: impl FnOnce() -> CredentialResult<Option<String>>,
) -> CredentialResult<String> {
    if let Some(password) = explicit.filter(|p| !p.is_empty()) {
        return Ok(password);
    }
    if let Some(password) = from_env.filter(|p| !p.is_empty()) {
        debug!("Using IMAP password from {PASSWORD_ENV}");
        return Ok(password);
    }
    from_keyring()?.ok_or_else(|| CredentialError::Missing(username.to_string()))
}
