use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StorageError;

/// Maximum length of the sanitized hint portion of a generated key.
const MAX_HINT_LEN: usize = 96;

/// Location of a stored object.
///
/// Persisted in database columns as a single `{bucket}/{key}` string; the key
/// itself may contain further `/` separators.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self, StorageError> {
        let object = Self {
            bucket: bucket.into(),
            key: key.into(),
        };
        object.validate()?;
        Ok(object)
    }

    /// Parse a `{bucket}/{key}` string as stored in script rows.
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        let (bucket, key) = s
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidRef(format!("missing bucket separator: {s}")))?;
        Self::new(bucket, key)
    }

    fn validate(&self) -> Result<(), StorageError> {
        if self.bucket.is_empty()
            || !self
                .bucket
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(StorageError::InvalidRef(format!(
                "invalid bucket name: {}",
                self.bucket
            )));
        }
        if self.key.is_empty() || self.key.len() > 512 {
            return Err(StorageError::InvalidRef("empty or oversized key".into()));
        }
        if self.key.contains('\0') || self.key.starts_with('/') || self.key.ends_with('/') {
            return Err(StorageError::InvalidRef(format!(
                "malformed key: {}",
                self.key
            )));
        }
        if self.key.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(StorageError::InvalidRef(format!(
                "key contains traversal or empty segments: {}",
                self.key
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

impl Serialize for ObjectRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ObjectRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Generate an unguessable object key from a caller-supplied hint.
///
/// The random prefix makes keys collision-resistant and non-enumerable even
/// when the hint repeats across requests; the sanitized hint keeps keys
/// debuggable in storage listings.
pub fn unique_key(key_hint: &str) -> String {
    let prefix = Uuid::new_v4().simple().to_string();
    format!("{prefix}-{}", sanitize_key_hint(key_hint))
}

/// Reduce a hint to filesystem- and URL-safe characters.
pub fn sanitize_key_hint(hint: &str) -> String {
    let mut out = String::with_capacity(hint.len().min(MAX_HINT_LEN));
    let mut last_was_dash = false;
    for c in hint.trim().chars() {
        if out.len() >= MAX_HINT_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            out.push(c);
            last_was_dash = false;
        } else if !last_was_dash && !out.is_empty() {
            out.push('-');
            last_was_dash = true;
        }
    }
    let trimmed = out.trim_matches(|c| c == '-' || c == '.').to_string();
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_through_display() {
        let object = ObjectRef::parse("scripts/abc123-hamlet.pdf").unwrap();
        assert_eq!(object.bucket, "scripts");
        assert_eq!(object.key, "abc123-hamlet.pdf");
        assert_eq!(object.to_string(), "scripts/abc123-hamlet.pdf");
    }

    #[test]
    fn parse_allows_nested_keys() {
        let object = ObjectRef::parse("downloads/2026/xyz.pdf").unwrap();
        assert_eq!(object.key, "2026/xyz.pdf");
    }

    #[test]
    fn parse_rejects_missing_separator() {
        assert!(matches!(
            ObjectRef::parse("no-separator"),
            Err(StorageError::InvalidRef(_))
        ));
    }

    #[test]
    fn parse_rejects_traversal() {
        assert!(ObjectRef::parse("scripts/../etc/passwd").is_err());
        assert!(ObjectRef::parse("scripts/a/../b").is_err());
        assert!(ObjectRef::parse("scripts//double").is_err());
    }

    #[test]
    fn parse_rejects_bad_bucket_names() {
        assert!(ObjectRef::new("bad bucket", "key").is_err());
        assert!(ObjectRef::new("", "key").is_err());
        assert!(ObjectRef::new("ok-bucket", "key").is_ok());
    }

    #[test]
    fn unique_keys_differ_for_same_hint() {
        let a = unique_key("hamlet.pdf");
        let b = unique_key("hamlet.pdf");
        assert_ne!(a, b);
        assert!(a.ends_with("-hamlet.pdf"));
    }

    #[test]
    fn sanitize_collapses_unsafe_characters() {
        assert_eq!(sanitize_key_hint("A Doll's House.pdf"), "A-Doll-s-House.pdf");
        assert_eq!(sanitize_key_hint("  weird//name  "), "weird-name");
        assert_eq!(sanitize_key_hint("!!!"), "file");
        assert_eq!(sanitize_key_hint(""), "file");
    }

    #[test]
    fn sanitize_truncates_long_hints() {
        let long = "x".repeat(500);
        assert!(sanitize_key_hint(&long).len() <= MAX_HINT_LEN);
    }

    #[test]
    fn serde_round_trip() {
        let object = ObjectRef::parse("scripts/key.pdf").unwrap();
        let json = serde_json::to_string(&object).unwrap();
        assert_eq!(json, "\"scripts/key.pdf\"");
        let parsed: ObjectRef = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, object);
    }
}
