//! Redaction wrapper for secrets
//!
//! [`Redacted`] hides its value from `Debug`, `Display` and `Serialize`, so a
//! private key held in configuration cannot leak through logs or JSON.

use std::fmt;

/// Holds a secret and prints `<redacted>` wherever it is formatted
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Redacted<T>(pub T);

impl<T> Redacted<T> {
    /// Borrow the secret. Call sites are the only places it is visible.
    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Redacted<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

impl<T> fmt::Debug for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> fmt::Display for Redacted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl<T> serde::Serialize for Redacted<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<redacted>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_formats_value() {
        let key = Redacted("0xdeadbeef".to_string());
        assert_eq!(format!("{}", key), "<redacted>");
        assert_eq!(format!("{:?}", key), "<redacted>");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"<redacted>\"");
        assert_eq!(key.expose(), "0xdeadbeef");
    }

    #[test]
    fn test_debug_of_containing_struct() {
        #[derive(Debug)]
        struct Settings {
            rpc: String,
            key: Redacted<String>,
        }
        let settings = Settings {
            rpc: "http://localhost:8545".to_string(),
            key: Redacted("secret".to_string()),
        };
        let rendered = format!("{:?}", settings);
        assert!(rendered.contains("localhost"));
        assert!(!rendered.contains("secret"));
    }
}
