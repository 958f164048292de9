//! Scan, classify and delete.
//!
//! Both entry points run against an already-open [`MailboxClient`]; pair
//! them with [`crate::mailbox::with_session`] so the session is released on
//! every path.
//!
//! [`MailboxClient`]: crate::mailbox::MailboxClient

mod mutate;
mod scan;

pub use mutate::{MutationMode, MutationReport, mutate};
pub use scan::{
    SENDER_FIELD, ScanLimit, ScanOptions, ScannedMessage, scan, scan_messages, scan_unapproved,
};
