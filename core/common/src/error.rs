//! Common error types for Stowage.

use thiserror::Error;

/// Top-level error type for Stowage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A provider name arrived that is not one of `s3`, `cloudfront`, `maxcdn`.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// Uploading an object to the store failed.
    #[error("Upload of '{key}' failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: Box<Error>,
    },

    /// A batched delete failed, wholly or for some keys.
    #[error("Delete from bucket '{bucket}' failed: {source}")]
    Delete {
        bucket: String,
        #[source]
        source: Box<Error>,
    },

    /// Checking for or creating the bucket failed.
    #[error("Provisioning bucket '{bucket}' failed: {source}")]
    Provision {
        bucket: String,
        #[source]
        source: Box<Error>,
    },

    /// The CDN signer could not produce a signed URL.
    #[error("Signing error: {0}")]
    Signing(String),

    /// Configuration failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Object store reported a failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Wrap a collaborator error as an upload failure for `key`.
    pub fn upload(key: impl Into<String>, source: Error) -> Self {
        Self::Upload {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a collaborator error as a delete failure against `bucket`.
    pub fn delete(bucket: impl Into<String>, source: Error) -> Self {
        Self::Delete {
            bucket: bucket.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a collaborator error as a provisioning failure for `bucket`.
    pub fn provision(bucket: impl Into<String>, source: Error) -> Self {
        Self::Provision {
            bucket: bucket.into(),
            source: Box::new(source),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_wrapped_error_keeps_source() {
        let err = Error::upload("photos/1/thumb.png", Error::Storage("timed out".to_string()));
        assert_eq!(
            err.to_string(),
            "Upload of 'photos/1/thumb.png' failed: Storage error: timed out"
        );
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "Storage error: timed out");
    }

    #[test]
    fn test_serde_error_converts() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
