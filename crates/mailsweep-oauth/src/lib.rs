//! # mailsweep-oauth
//!
//! `OAuth2` support for the token-based (Gmail API) mailsweep backend.
//!
//! ## Features
//!
//! - **Consent flow**: Authorization Code Flow with PKCE, answered by a
//!   one-shot loopback redirect receiver
//! - **Token management**: expiry checking, refresh, persisted token store
//! - **Client secrets**: reads Google "installed app" `credentials.json` files
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailsweep_oauth::{AuthorizationCodeFlow, LoopbackReceiver, OAuthClient, Provider};
//!
//! let receiver = LoopbackReceiver::bind().await?;
//! let client = OAuthClient::new("client_id", Provider::google()?)
//!     .with_client_secret("secret")
//!     .with_redirect_uri(receiver.redirect_uri());
//!
//! let flow = AuthorizationCodeFlow::new(client).with_pkce();
//! let url = flow.authorization_url(None, Some("state123"))?;
//! println!("Visit: {url}");
//!
//! let code = receiver.wait_for_code("state123", 300).await?;
//! let token = flow.exchange_code(&code, None).await?;
//! ```
//!
//! ### Token Refresh
//!
//! ```ignore
//! if token.is_expired() {
//!     let fresh = client.refresh_token(&token).await?;
//!     store.save(&fresh).await?;
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
pub mod flow;
pub mod provider;
pub mod secrets;
pub mod token;

pub use error::{Error, Result};
pub use flow::{AuthorizationCodeFlow, LoopbackReceiver, OAuthClient, PkceChallenge};
pub use provider::Provider;
pub use secrets::ClientSecrets;
pub use token::{Token, TokenStore};
