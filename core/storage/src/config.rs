//! Storage configuration for attachments.
//!
//! Configuration is loaded and validated once, when the attachment type is
//! set up, so the backend never has to second-guess provider settings at
//! call time.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

use stowage_common::{BucketName, Error, Result};

/// Default path template for stored objects.
pub const DEFAULT_PATH_TEMPLATE: &str = ":attachment/:id_partition/:style/:filename";
/// Default canned ACL applied to newly created buckets.
pub const DEFAULT_ACL: &str = "public-read";
/// Default bucket region.
pub const DEFAULT_REGION: &str = "us-east-1";
/// Default lifetime of signed CDN URLs, in seconds.
pub const DEFAULT_EXPIRY_SECS: u64 = 3600;

/// Complete storage configuration for one attachment type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path template interpolated into object keys.
    #[serde(default = "default_path")]
    pub path: String,
    /// Canned ACL used when the bucket has to be created.
    #[serde(default = "default_acl", rename = "ACL")]
    pub acl: String,
    /// Region used as the bucket's location constraint.
    #[serde(default = "default_region")]
    pub region: String,
    /// Base object configuration merged into every upload.
    pub s3_object_config: ObjectConfig,
    /// Direct object store delivery.
    #[serde(default)]
    pub s3: S3Config,
    /// Signed CDN delivery.
    #[serde(default)]
    pub cloudfront: CloudFrontConfig,
    /// Passthrough CDN delivery.
    #[serde(default)]
    pub maxcdn: MaxCdnConfig,
}

fn default_path() -> String {
    DEFAULT_PATH_TEMPLATE.to_string()
}

fn default_acl() -> String {
    DEFAULT_ACL.to_string()
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

/// Object-level upload parameters.
///
/// Fields other than `Bucket` and `ContentType` are carried through to the
/// object store client untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectConfig {
    pub bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ObjectConfig {
    /// Create an object config for a bucket with no extra fields.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            content_type: None,
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for S3Config {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Settings for the signed CDN provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudFrontConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Distribution host, without scheme (e.g. `d111111abcdef8.cloudfront.net`).
    #[serde(default)]
    pub distribution_url: String,
    /// Lifetime of signed URLs in seconds.
    #[serde(default = "default_expiry")]
    pub expiry_time: u64,
    /// Key pair id handed to the signer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pair_id: Option<String>,
    /// Path to the private key handed to the signer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

fn default_expiry() -> u64 {
    DEFAULT_EXPIRY_SECS
}

impl Default for CloudFrontConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            distribution_url: String::new(),
            expiry_time: DEFAULT_EXPIRY_SECS,
            key_pair_id: None,
            private_key: None,
        }
    }
}

/// Settings for the passthrough CDN provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaxCdnConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub distribution_url: String,
}

impl StorageConfig {
    /// Create a configuration with defaults for everything but the bucket.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            path: default_path(),
            acl: default_acl(),
            region: default_region(),
            s3_object_config: ObjectConfig::new(bucket),
            s3: S3Config::default(),
            cloudfront: CloudFrontConfig::default(),
            maxcdn: MaxCdnConfig::default(),
        }
    }

    /// Parse and validate a JSON configuration.
    ///
    /// # Errors
    /// - Malformed JSON
    /// - Any check in [`StorageConfig::validate`] fails
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&contents)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// - Empty path template, ACL or region
    /// - Missing or malformed bucket name
    /// - An enabled CDN provider without a usable distribution host
    /// - A zero expiry on an enabled CloudFront provider
    pub fn validate(&self) -> Result<()> {
        if self.path.trim().is_empty() {
            return Err(Error::InvalidConfig("path template cannot be empty".to_string()));
        }
        if self.acl.is_empty() {
            return Err(Error::InvalidConfig("ACL cannot be empty".to_string()));
        }
        if self.region.is_empty() {
            return Err(Error::InvalidConfig("region cannot be empty".to_string()));
        }
        self.bucket()
            .map_err(|e| Error::InvalidConfig(format!("s3_object_config.Bucket: {}", e)))?;

        if self.cloudfront.enabled {
            validate_distribution("cloudfront", &self.cloudfront.distribution_url)?;
            if self.cloudfront.expiry_time == 0 {
                return Err(Error::InvalidConfig(
                    "cloudfront.expiry_time must be positive".to_string(),
                ));
            }
        }
        if self.maxcdn.enabled {
            validate_distribution("maxcdn", &self.maxcdn.distribution_url)?;
        }
        Ok(())
    }

    /// The bucket every object of this attachment type is stored in.
    pub fn bucket(&self) -> Result<BucketName> {
        BucketName::new(self.s3_object_config.bucket.clone())
    }
}

/// A distribution URL is a bare host (optionally with a path prefix); the
/// scheme is always added when URLs are built.
fn validate_distribution(provider: &str, distribution_url: &str) -> Result<()> {
    if distribution_url.is_empty() {
        return Err(Error::InvalidConfig(format!(
            "{}.distribution_url is required when enabled",
            provider
        )));
    }
    if distribution_url.contains("://") {
        return Err(Error::InvalidConfig(format!(
            "{}.distribution_url must not include a scheme: {}",
            provider, distribution_url
        )));
    }
    let parsed = Url::parse(&format!("http://{}", distribution_url)).map_err(|e| {
        Error::InvalidConfig(format!(
            "{}.distribution_url is not a valid host: {}",
            provider, e
        ))
    })?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(Error::InvalidConfig(format!(
            "{}.distribution_url has no host: {}",
            provider, distribution_url
        )));
    }
    Ok(())
}
