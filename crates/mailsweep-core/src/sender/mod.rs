//! Sender identity extraction.
//!
//! Turns a raw `From` header value into a normalized address. A header that
//! yields no address is unclassifiable: the caller excludes the message from
//! both the safe and the unapproved side, never defaulting it to either.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use regex::Regex;

static BRACKETED: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"<([^>]+)>").unwrap()
});

static BARE_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap()
});

/// Decodes RFC 2047 encoded words by parsing `raw` as a header value.
/// Values mailparse cannot read are returned as-is.
fn decode(raw: &str) -> Cow<'_, str> {
    if !raw.contains("=?") {
        return Cow::Borrowed(raw);
    }
    match mailparse::parse_header(format!("From: {raw}").as_bytes()) {
        Ok((header, _)) => Cow::Owned(header.get_value()),
        Err(_) => Cow::Borrowed(raw),
    }
}

/// A sender's email address.
///
/// Equality, ordering and hashing ignore case; the original spelling is
/// kept for display.
#[derive(Debug, Clone)]
pub struct SenderIdentity {
    display: String,
    normalized: String,
}

impl SenderIdentity {
    /// Wraps an already-extracted address.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        let display = address.into();
        let normalized = display.to_lowercase();
        Self {
            display,
            normalized,
        }
    }

    /// Extracts the sender address from a raw header value.
    ///
    /// Encoded words are decoded first. An address in angle brackets wins
    /// over any bare address elsewhere in the value, because display names
    /// often contain address-like text. Returns `None` when no address can
    /// be found.
    #[must_use]
    pub fn extract(raw: &str) -> Option<Self> {
        let decoded = decode(raw);

        let bracketed = BRACKETED
            .captures(&decoded)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .filter(|addr| addr.contains('@'));

        let address = bracketed.or_else(|| {
            BARE_ADDRESS
                .find(&decoded)
                .map(|m| m.as_str().trim())
        })?;

        Some(Self::new(address))
    }

    /// The address as it appeared in the header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.display
    }

    /// The lower-cased address used for comparisons.
    #[must_use]
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// The part after the last `@`, lower-cased.
    #[must_use]
    pub fn domain(&self) -> Option<&str> {
        self.normalized.rsplit_once('@').map(|(_, domain)| domain)
    }
}

impl PartialEq for SenderIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for SenderIdentity {}

impl PartialOrd for SenderIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SenderIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl Hash for SenderIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl fmt::Display for SenderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn extract(raw: &str) -> Option<String> {
        SenderIdentity::extract(raw).map(|s| s.as_str().to_string())
    }

    #[test]
    fn test_named_address() {
        assert_eq!(
            extract("Alice Smith <alice@example.com>").as_deref(),
            Some("alice@example.com")
        );
    }

    #[test]
    fn test_bare_address() {
        assert_eq!(extract("bob@example.org").as_deref(), Some("bob@example.org"));
    }

    #[test]
    fn test_no_address() {
        assert_eq!(extract("Mailer Daemon"), None);
        assert_eq!(extract(""), None);
        assert_eq!(extract("undisclosed <recipients>"), None);
    }

    #[test]
    fn test_bracket_wins_over_address_like_name() {
        assert_eq!(
            extract("\"support@bank.com\" <phish@evil.example>").as_deref(),
            Some("phish@evil.example")
        );
    }

    #[test]
    fn test_encoded_display_name() {
        assert_eq!(
            extract("=?UTF-8?B?SsO2cmc=?= <joerg@example.de>").as_deref(),
            Some("joerg@example.de")
        );
    }

    #[test]
    fn test_any_charset_display_name() {
        assert_eq!(decode("=?koi8-r?B?8NLJ18XU?= <a@b.ru>"), "Привет <a@b.ru>");
        assert_eq!(extract("=?koi8-r?B?8NLJ18XU?= <a@b.ru>").as_deref(), Some("a@b.ru"));
        assert_eq!(
            extract("=?ISO-8859-1?Q?Caf=E9?= <cafe@example.fr>").as_deref(),
            Some("cafe@example.fr")
        );
    }

    #[test]
    fn test_address_inside_encoded_word() {
        assert_eq!(extract("=?UTF-8?B?YUBiLmNvbQ==?=").as_deref(), Some("a@b.com"));
    }

    #[test]
    fn test_bare_address_requires_tld() {
        assert_eq!(extract("root@localhost"), None);
        assert_eq!(
            extract("contact: root@localhost or admin@corp.io").as_deref(),
            Some("admin@corp.io")
        );
    }

    #[test]
    fn test_case_preserved_but_ignored_for_equality() {
        let a = SenderIdentity::new("News@Example.COM");
        let b = SenderIdentity::new("news@example.com");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "News@Example.COM");
        assert_eq!(a.domain(), Some("example.com"));
    }

    proptest! {
        #[test]
        fn prop_named_and_bare_round_trip(
            name in "[A-Za-z][A-Za-z .'-]{0,20}",
            local in "[a-z0-9][a-z0-9._+-]{0,15}",
            domain in "[a-z0-9]{1,12}",
            tld in "[a-z]{2,6}",
        ) {
            let address = format!("{local}@{domain}.{tld}");

            prop_assert_eq!(extract(&format!("{name} <{address}>")), Some(address.clone()));
            prop_assert_eq!(extract(&address), Some(address));
        }

        #[test]
        fn prop_no_at_sign_is_unclassifiable(header in "[^@=]{0,40}") {
            prop_assert_eq!(extract(&header), None);
        }
    }
}
