//! Response header parsing.
//!
//! Headers are kept in a sorted map keyed by the lower-cased header name, so
//! lookups are case-insensitive and two parses of the same input compare equal.

use http::HeaderMap;
use std::collections::BTreeMap;

/// Name of the header carrying the account's compression count
pub const COMPRESSION_COUNT_HEADER: &str = "compression-count";

/// Parsed response headers with lower-cased names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    /// Case-insensitive header lookup
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Value of the `location` header, if any
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.get("location")
    }

    /// Numeric value of the `compression-count` header
    ///
    /// Returns `None` when the header is missing or not an unsigned integer.
    #[must_use]
    pub fn compression_count(&self) -> Option<u64> {
        self.get(COMPRESSION_COUNT_HEADER)?.parse().ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn insert(&mut self, name: &str, value: &str) {
        self.0
            .insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
    }
}

/// Sources that can be turned into [`Headers`]
pub trait IntoHeaders {
    fn into_headers(self) -> Headers;
}

impl IntoHeaders for Headers {
    fn into_headers(self) -> Headers {
        self
    }
}

impl IntoHeaders for &Headers {
    fn into_headers(self) -> Headers {
        self.clone()
    }
}

impl IntoHeaders for &str {
    fn into_headers(self) -> Headers {
        let mut headers = Headers::default();
        for line in self.lines() {
            if line.trim().is_empty() {
                continue;
            }
            // Status lines ("HTTP/1.1 200 OK") carry no colon
            let Some((name, value)) = line.split_once(':') else {
                continue;
            };
            if name.trim().is_empty() {
                continue;
            }
            headers.insert(name, value);
        }
        headers
    }
}

impl IntoHeaders for &String {
    fn into_headers(self) -> Headers {
        self.as_str().into_headers()
    }
}

impl IntoHeaders for &HeaderMap {
    fn into_headers(self) -> Headers {
        let mut headers = Headers::default();
        for (name, value) in self {
            // Non-visible-ASCII values are kept lossily
            let value = String::from_utf8_lossy(value.as_bytes());
            headers.insert(name.as_str(), &value);
        }
        headers
    }
}

/// Parse a raw header block, a header map or already-parsed headers.
///
/// Raw blocks are split on line breaks; blank lines and lines without a
/// colon are skipped, names are lower-cased and values trimmed. A later
/// duplicate overwrites an earlier one. Parsing [`Headers`] returns them
/// unchanged.
#[must_use]
pub fn parse_headers(source: impl IntoHeaders) -> Headers {
    source.into_headers()
}
