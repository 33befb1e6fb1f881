use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Placeholder key meaning "no account": only the free web endpoint is usable
pub const DEMO_KEY: &str = "crazy";

/// Opaque wrapper around an API key or secret.
///
/// `Debug` and `Display` both print `[REDACTED]`. Use [`expose`](Self::expose)
/// when building credentials. The backing buffer is zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The demo sentinel key
    #[must_use]
    pub fn demo() -> Self {
        Self::new(DEMO_KEY)
    }

    /// Read-only access to the secret; never log the returned slice.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// True when the key cannot authenticate against the paid endpoint
    #[must_use]
    pub fn is_unusable(&self) -> bool {
        self.0.is_empty() || self.0 == DEMO_KEY
    }
}

impl Default for ApiKey {
    fn default() -> Self {
        Self::demo()
    }
}

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Serializes as `[REDACTED]` so dumped configuration never carries secrets
impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_are_redacted() {
        let key = ApiKey::new("hunter2");
        assert_eq!(format!("{key:?}"), "[REDACTED]");
        assert_eq!(format!("{key}"), "[REDACTED]");
    }

    #[test]
    fn test_demo_and_empty_keys_are_unusable() {
        assert!(ApiKey::demo().is_unusable());
        assert!(ApiKey::default().is_unusable());
        assert!(ApiKey::new("").is_unusable());
        assert!(!ApiKey::new("real-key").is_unusable());
    }

    #[test]
    fn test_deserializes_from_plain_string() {
        let key: ApiKey = serde_json::from_str(r#""abc""#).unwrap();
        assert_eq!(key.expose(), "abc");
    }
}
