//! Concrete mailbox backends.
//!
//! Both implement [`crate::mailbox::Authenticator`] and
//! [`crate::mailbox::MailboxClient`], so the engine runs unchanged against
//! either.

pub mod gmail;
pub mod imap;

pub use gmail::{GmailAuthenticator, GmailMailbox};
pub use imap::{ImapAuthenticator, ImapMailbox, ImapStream, read_greeting};
