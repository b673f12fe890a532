//! Object store client interface.
//!
//! The backend never speaks the store's wire protocol itself; it goes
//! through [`ObjectStoreClient`]. Timeouts and retries belong to the
//! implementation behind this trait.

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use url::Url;

use crate::config::ObjectConfig;
use stowage_common::{BucketName, Result, StorageKey};

/// Characters escaped inside a key when it is placed in a URL path.
/// `/` is kept so key prefixes read as path segments.
const KEY_PATH: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'+');

/// Field names set per call; they always override the object config.
const PER_CALL_FIELDS: [&str; 3] = ["Key", "SourceFile", "ContentType"];

/// A single upload.
#[derive(Debug, Clone, PartialEq)]
pub struct PutObjectRequest {
    pub bucket: BucketName,
    pub key: StorageKey,
    pub source_file: PathBuf,
    pub content_type: Option<String>,
    /// Passthrough fields from the object config (ACL, CacheControl, ...).
    pub extra: BTreeMap<String, Value>,
}

impl PutObjectRequest {
    /// Merge the attachment's object config with the per-call fields.
    ///
    /// Per-call `Key`, `SourceFile` and `ContentType` take precedence over
    /// anything in `config`. The configured content type is only kept when
    /// the file itself has none.
    pub fn merged(
        config: &ObjectConfig,
        bucket: BucketName,
        key: StorageKey,
        source_file: impl Into<PathBuf>,
        content_type: Option<&str>,
    ) -> Self {
        let extra = config
            .extra
            .iter()
            .filter(|(name, _)| !PER_CALL_FIELDS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Self {
            bucket,
            key,
            source_file: source_file.into(),
            content_type: content_type
                .map(String::from)
                .or_else(|| config.content_type.clone()),
            extra,
        }
    }
}

/// Parameters for creating a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateBucketRequest {
    pub acl: String,
    pub bucket: BucketName,
    pub location_constraint: String,
}

/// A key the store could not delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteObjectError {
    pub key: StorageKey,
    pub code: String,
    pub message: String,
}

/// What the store reported for a batched delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteObjectsOutput {
    pub deleted: Vec<StorageKey>,
    pub errors: Vec<DeleteObjectError>,
}

impl DeleteObjectsOutput {
    /// True when the store reported no per-key failures.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Narrow client for the remote object store.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Upload the request's source file under its key.
    async fn put_object(&self, request: PutObjectRequest) -> Result<()>;

    /// Delete several keys from one bucket in a single request.
    ///
    /// Per-key failures are reported in the output rather than as an error.
    async fn delete_objects(
        &self,
        bucket: &BucketName,
        keys: &[StorageKey],
    ) -> Result<DeleteObjectsOutput>;

    /// Check whether a bucket exists.
    async fn does_bucket_exist(&self, bucket: &BucketName) -> Result<bool>;

    /// Create a bucket with the given ACL and location constraint.
    async fn create_bucket(&self, request: CreateBucketRequest) -> Result<()>;

    /// Native URL for an object. No network access.
    fn object_url(&self, bucket: &BucketName, key: &StorageKey, path_style: bool) -> String;
}

/// Build an object URL against a store endpoint.
///
/// Path-style puts the bucket in the path (`https://host/bucket/key`),
/// virtual-hosted style puts it in the host (`https://bucket.host/key`).
/// Buckets that cannot appear in a host name always get path-style URLs.
pub fn object_url_for(
    endpoint: &Url,
    bucket: &BucketName,
    key: &StorageKey,
    path_style: bool,
) -> String {
    let encoded_key = utf8_percent_encode(key.as_str(), KEY_PATH).to_string();
    let base = endpoint.as_str().trim_end_matches('/');

    match endpoint.host_str() {
        Some(host) if !path_style && is_host_label(bucket.as_str()) => format!(
            "{}://{}.{}{}/{}",
            endpoint.scheme(),
            bucket,
            host,
            endpoint.port().map(|p| format!(":{}", p)).unwrap_or_default(),
            encoded_key
        ),
        _ => format!(
            "{}/{}/{}",
            base,
            utf8_percent_encode(bucket.as_str(), KEY_PATH),
            encoded_key
        ),
    }
}

/// Lowercase letters, digits, `-` and `.`, not starting or ending with a
/// separator.
fn is_host_label(bucket: &str) -> bool {
    bucket
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'.')
        && !bucket.starts_with(['-', '.'])
        && !bucket.ends_with(['-', '.'])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> StorageKey {
        StorageKey::new(s).unwrap()
    }

    fn bucket(s: &str) -> BucketName {
        BucketName::new(s).unwrap()
    }

    #[test]
    fn test_merge_per_call_fields_win() {
        let mut config = ObjectConfig::new("uploads");
        config.content_type = Some("application/octet-stream".to_string());
        config.extra.insert("Key".to_string(), Value::from("stale/key"));
        config.extra.insert("SourceFile".to_string(), Value::from("/tmp/stale"));
        config.extra.insert("CacheControl".to_string(), Value::from("max-age=60"));

        let request = PutObjectRequest::merged(
            &config,
            bucket("uploads"),
            key("avatars/1/original/me.png"),
            "/tmp/upload-123",
            Some("image/png"),
        );

        assert_eq!(request.key.as_str(), "avatars/1/original/me.png");
        assert_eq!(request.source_file, PathBuf::from("/tmp/upload-123"));
        assert_eq!(request.content_type.as_deref(), Some("image/png"));
        assert!(!request.extra.contains_key("Key"));
        assert!(!request.extra.contains_key("SourceFile"));
        assert_eq!(request.extra.get("CacheControl"), Some(&Value::from("max-age=60")));
    }

    #[test]
    fn test_merge_keeps_configured_content_type_when_unknown() {
        let mut config = ObjectConfig::new("uploads");
        config.content_type = Some("application/pdf".to_string());

        let request =
            PutObjectRequest::merged(&config, bucket("uploads"), key("a"), "/tmp/a", None);
        assert_eq!(request.content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_path_style_url() {
        let endpoint = Url::parse("https://s3.amazonaws.com").unwrap();
        let url = object_url_for(&endpoint, &bucket("my_bucket"), &key("a b/c.png"), true);
        assert_eq!(url, "https://s3.amazonaws.com/my_bucket/a%20b/c.png");
    }

    #[test]
    fn test_virtual_hosted_url() {
        let endpoint = Url::parse("http://localhost:9000").unwrap();
        let url = object_url_for(&endpoint, &bucket("media"), &key("x/y.txt"), false);
        assert_eq!(url, "http://media.localhost:9000/x/y.txt");
    }

    #[test]
    fn test_bucket_segment_is_encoded() {
        let endpoint = Url::parse("https://s3.amazonaws.com").unwrap();
        let url = object_url_for(&endpoint, &bucket("odd bucket?#"), &key("a.png"), true);
        assert_eq!(url, "https://s3.amazonaws.com/odd%20bucket%3F%23/a.png");
        assert_eq!(Url::parse(&url).unwrap().path(), "/odd%20bucket%3F%23/a.png");
    }

    #[test]
    fn test_non_label_bucket_falls_back_to_path_style() {
        let endpoint = Url::parse("http://localhost:9000").unwrap();
        let url = object_url_for(&endpoint, &bucket("My_Bucket"), &key("x.txt"), false);
        assert_eq!(url, "http://localhost:9000/My_Bucket/x.txt");
    }

    #[test]
    fn test_delete_output_completeness() {
        let mut output = DeleteObjectsOutput::default();
        assert!(output.is_complete());
        output.errors.push(DeleteObjectError {
            key: key("a"),
            code: "AccessDenied".to_string(),
            message: "Access Denied".to_string(),
        });
        assert!(!output.is_complete());
    }
}
