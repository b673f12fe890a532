//! URL providers for delivering stored attachments.
//!
//! Three delivery strategies share the [`UrlProvider`] contract:
//! - [`DirectStoreProvider`]: the object store's own URL
//! - [`SignedCdnProvider`]: a CDN URL signed with an expiry
//! - [`PassthroughCdnProvider`]: an unsigned CDN URL

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt;
use std::str::FromStr;

use crate::client::ObjectStoreClient;
use crate::config::{CloudFrontConfig, MaxCdnConfig, StorageConfig};
use crate::signer::{CdnSigner, Clock};
use stowage_common::{BucketName, Error, Result, StorageKey};

/// Everything but unreserved characters is escaped, including `/`.
const KEY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// The delivery providers an attachment can be served through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    S3,
    CloudFront,
    MaxCdn,
}

impl ProviderKind {
    /// Order used when no provider is named: the first enabled one wins.
    pub const PRIORITY: [ProviderKind; 3] =
        [ProviderKind::CloudFront, ProviderKind::MaxCdn, ProviderKind::S3];

    /// Configuration name of the provider.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::S3 => "s3",
            ProviderKind::CloudFront => "cloudfront",
            ProviderKind::MaxCdn => "maxcdn",
        }
    }

    /// Pick the first enabled provider in priority order.
    ///
    /// The object store is always reachable, so it is the fallback even if
    /// its own section is disabled.
    pub fn select(config: &StorageConfig) -> Self {
        Self::PRIORITY
            .into_iter()
            .find(|kind| kind.is_enabled(config))
            .unwrap_or(ProviderKind::S3)
    }

    /// Resolve an optional, untyped provider name.
    ///
    /// # Errors
    /// - `UnsupportedProvider` if a name is given and not recognised
    pub fn resolve(name: Option<&str>, config: &StorageConfig) -> Result<Self> {
        match name {
            Some(name) => name.parse(),
            None => Ok(Self::select(config)),
        }
    }

    fn is_enabled(&self, config: &StorageConfig) -> bool {
        match self {
            ProviderKind::S3 => config.s3.enabled,
            ProviderKind::CloudFront => config.cloudfront.enabled,
            ProviderKind::MaxCdn => config.maxcdn.enabled,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "s3" => Ok(ProviderKind::S3),
            "cloudfront" => Ok(ProviderKind::CloudFront),
            "maxcdn" => Ok(ProviderKind::MaxCdn),
            other => Err(Error::UnsupportedProvider(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Percent-encode a whole key as a single URL path component.
pub fn url_encode(key: &str) -> String {
    utf8_percent_encode(key, KEY_COMPONENT).to_string()
}

/// `http://<distribution>/<encoded key>`
pub fn cdn_url(distribution_url: &str, key: &StorageKey) -> String {
    format!(
        "http://{}/{}",
        distribution_url.trim_end_matches('/'),
        url_encode(key.as_str())
    )
}

/// Turns a storage key into a URL a client can fetch.
pub trait UrlProvider {
    /// Which delivery provider this is.
    fn kind(&self) -> ProviderKind;

    /// Fetchable URL for the object stored under `key`.
    fn url(&self, key: &StorageKey) -> Result<String>;
}

/// Serves objects straight from the store using path-style URLs, since
/// bucket names are not guaranteed to be valid host labels.
pub struct DirectStoreProvider<'a> {
    client: &'a dyn ObjectStoreClient,
    bucket: BucketName,
}

impl<'a> DirectStoreProvider<'a> {
    pub fn new(client: &'a dyn ObjectStoreClient, bucket: BucketName) -> Self {
        Self { client, bucket }
    }
}

impl UrlProvider for DirectStoreProvider<'_> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::S3
    }

    fn url(&self, key: &StorageKey) -> Result<String> {
        Ok(self.client.object_url(&self.bucket, key, true))
    }
}

/// Serves objects through a CDN with signed, expiring URLs.
pub struct SignedCdnProvider<'a> {
    config: &'a CloudFrontConfig,
    signer: &'a dyn CdnSigner,
    clock: &'a dyn Clock,
}

impl<'a> SignedCdnProvider<'a> {
    pub fn new(
        config: &'a CloudFrontConfig,
        signer: &'a dyn CdnSigner,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            config,
            signer,
            clock,
        }
    }

    /// Unix time at which a URL signed now stops being valid.
    pub fn expires_at(&self) -> i64 {
        let expiry = i64::try_from(self.config.expiry_time).unwrap_or(i64::MAX);
        self.clock.now().timestamp().saturating_add(expiry)
    }
}

impl UrlProvider for SignedCdnProvider<'_> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::CloudFront
    }

    fn url(&self, key: &StorageKey) -> Result<String> {
        let base_url = cdn_url(&self.config.distribution_url, key);
        self.signer.signed_url(&base_url, self.expires_at())
    }
}

/// Serves objects through a CDN that enforces its own access policy.
pub struct PassthroughCdnProvider<'a> {
    config: &'a MaxCdnConfig,
}

impl<'a> PassthroughCdnProvider<'a> {
    pub fn new(config: &'a MaxCdnConfig) -> Self {
        Self { config }
    }
}

impl UrlProvider for PassthroughCdnProvider<'_> {
    fn kind(&self) -> ProviderKind {
        ProviderKind::MaxCdn
    }

    fn url(&self, key: &StorageKey) -> Result<String> {
        Ok(cdn_url(&self.config.distribution_url, key))
    }
}
