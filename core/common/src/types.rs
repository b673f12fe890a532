//! Common types used throughout Stowage.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key identifying one stored object inside a bucket.
///
/// Produced by interpolating an attachment's path template for one style.
/// Keys are recomputed from the attachment on every call and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Create a new StorageKey.
    ///
    /// # Errors
    /// - Returns error if the key is empty
    pub fn new(key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Storage key cannot be empty".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the key, returning the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Name of a bucket in the object store.
///
/// Bucket names are not required to be valid DNS labels, which is why
/// object URLs are always built with path-style addressing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BucketName(String);

impl BucketName {
    /// Create a new BucketName.
    ///
    /// # Errors
    /// - Returns error if the name is empty or contains a `/`
    pub fn new(name: impl Into<String>) -> crate::Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Bucket name cannot be empty".to_string(),
            ));
        }
        if name.contains('/') {
            return Err(crate::Error::InvalidInput(format!(
                "Bucket name cannot contain '/': {}",
                name
            )));
        }
        Ok(Self(name))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_storage_key_creation() {
        let key = StorageKey::new("photos/1/original/cat.png").unwrap();
        assert_eq!(key.as_str(), "photos/1/original/cat.png");
        assert_eq!(key.to_string(), "photos/1/original/cat.png");
    }

    #[test]
    fn test_storage_key_empty_fails() {
        assert!(StorageKey::new("").is_err());
    }

    #[test]
    fn test_bucket_name_validation() {
        assert!(BucketName::new("my_bucket.Uploads").is_ok());
        assert!(BucketName::new("").is_err());
        assert!(BucketName::new("a/b").is_err());
    }

    #[test]
    fn test_storage_key_serializes_as_string() {
        let key = StorageKey::new("a/b").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"a/b\"");
    }

    proptest! {
        #[test]
        fn prop_non_empty_keys_are_preserved(s in ".+") {
            let key = StorageKey::new(s.clone()).unwrap();
            prop_assert_eq!(key.into_string(), s);
        }
    }
}
