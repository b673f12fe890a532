//! S3-backed attachment storage.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attachment::AttachmentDescriptor;
use crate::bucket::{BucketProvisioner, BucketState};
use crate::client::{DeleteObjectsOutput, ObjectStoreClient, PutObjectRequest};
use crate::interpolate::{PathInterpolator, TokenInterpolator};
use crate::provider::{
    DirectStoreProvider, PassthroughCdnProvider, ProviderKind, SignedCdnProvider, UrlProvider,
};
use crate::signer::{CdnSigner, Clock, SystemClock};
use stowage_common::{Error, Result, StorageKey};

/// Storage backend for one attachment-processing session.
///
/// Resolves object keys and delivery URLs, moves local files into the
/// object store and removes them again. The backend remembers whether its
/// bucket has been provisioned, so create one per session and do not share
/// it between concurrent sessions; `move_file` takes `&mut self` for that
/// reason.
pub struct S3Storage {
    client: Arc<dyn ObjectStoreClient>,
    signer: Option<Arc<dyn CdnSigner>>,
    interpolator: Arc<dyn PathInterpolator>,
    clock: Arc<dyn Clock>,
    provisioner: BucketProvisioner,
}

impl S3Storage {
    /// Create a backend using the default interpolator and the wall clock.
    ///
    /// Without a signer, signed CDN URLs fail with a `Signing` error.
    pub fn new(client: Arc<dyn ObjectStoreClient>) -> Self {
        Self {
            client,
            signer: None,
            interpolator: Arc::new(TokenInterpolator::new()),
            clock: Arc::new(SystemClock),
            provisioner: BucketProvisioner::new(),
        }
    }

    /// Set the signer used for signed CDN URLs.
    pub fn with_signer(mut self, signer: Arc<dyn CdnSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Set the path interpolator.
    pub fn with_interpolator(mut self, interpolator: Arc<dyn PathInterpolator>) -> Self {
        self.interpolator = interpolator;
        self
    }

    /// Set the clock used for signed URL expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Whether this backend has already confirmed its bucket.
    pub fn bucket_state(&self) -> BucketState {
        self.provisioner.state()
    }

    /// Key the given style of the attachment is stored under.
    pub fn path(&self, attachment: &AttachmentDescriptor, style: &str) -> Result<StorageKey> {
        self.interpolator
            .interpolate(attachment.path_template(), attachment, style)
    }

    /// One key per style, in the order given.
    pub fn paths(
        &self,
        attachment: &AttachmentDescriptor,
        styles: &[&str],
    ) -> Result<Vec<StorageKey>> {
        styles
            .iter()
            .map(|style| self.path(attachment, style))
            .collect()
    }

    /// URL for a style, through a named provider or the first enabled one.
    ///
    /// # Errors
    /// - `UnsupportedProvider` for an unknown name, before any other work
    /// - `Signing` if the signed CDN is chosen and signing fails
    pub fn resolve_url(
        &self,
        attachment: &AttachmentDescriptor,
        style: &str,
        provider: Option<&str>,
    ) -> Result<String> {
        let kind = ProviderKind::resolve(provider, &attachment.config)?;
        self.url_with(attachment, style, kind)
    }

    /// URL for a style through a specific provider.
    pub fn url_with(
        &self,
        attachment: &AttachmentDescriptor,
        style: &str,
        kind: ProviderKind,
    ) -> Result<String> {
        let key = self.path(attachment, style)?;
        debug!(provider = %kind, key = %key, "Resolving attachment URL");

        match kind {
            ProviderKind::S3 => {
                DirectStoreProvider::new(self.client.as_ref(), attachment.bucket()?).url(&key)
            }
            ProviderKind::CloudFront => {
                let signer = self.signer.as_deref().ok_or_else(|| {
                    Error::Signing("No CDN signer configured".to_string())
                })?;
                SignedCdnProvider::new(&attachment.config.cloudfront, signer, self.clock.as_ref())
                    .url(&key)
            }
            ProviderKind::MaxCdn => {
                PassthroughCdnProvider::new(&attachment.config.maxcdn).url(&key)
            }
        }
    }

    /// Upload a local file under `key` and delete the local copy.
    ///
    /// # Preconditions
    /// - `local_path` is a readable file
    ///
    /// # Postconditions
    /// - The bucket has been provisioned before the upload is attempted
    /// - On success the object exists remotely; the local file is removed
    ///   on a best-effort basis
    /// - On upload failure the local file is left in place
    ///
    /// # Errors
    /// - `Provision` if the bucket could not be checked or created
    /// - `Upload` if the store rejected the object
    pub async fn move_file(
        &mut self,
        attachment: &AttachmentDescriptor,
        local_path: impl AsRef<Path>,
        key: &StorageKey,
    ) -> Result<()> {
        let local_path = local_path.as_ref();
        let bucket = attachment.bucket()?;

        self.provisioner
            .ensure_exists(self.client.as_ref(), &bucket, attachment.acl(), attachment.region())
            .await?;

        let request = PutObjectRequest::merged(
            &attachment.config.s3_object_config,
            bucket,
            key.clone(),
            local_path,
            attachment.content_type(),
        );
        self.client
            .put_object(request)
            .await
            .map_err(|e| Error::upload(key.as_str(), e))?;
        info!(key = %key, "Uploaded attachment");

        release_local_source(local_path).await;
        Ok(())
    }

    /// Delete the given keys from the attachment's bucket in one request.
    ///
    /// An empty list is a no-op. The store's report is passed through:
    /// keys it could not delete turn the call into a `Delete` error, and
    /// nothing is rolled back.
    pub async fn remove(
        &self,
        attachment: &AttachmentDescriptor,
        keys: &[StorageKey],
    ) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let bucket = attachment.bucket()?;
        let output = self
            .client
            .delete_objects(&bucket, keys)
            .await
            .map_err(|e| Error::delete(bucket.as_str(), e))?;

        if !output.is_complete() {
            return Err(Error::delete(
                bucket.as_str(),
                Error::Storage(describe_failures(&output)),
            ));
        }

        info!(bucket = %bucket, count = keys.len(), "Removed attachment objects");
        Ok(())
    }
}

/// Delete the local source after a successful upload. The remote copy is
/// now canonical, so failure here is logged and otherwise ignored.
async fn release_local_source(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove local source file");
    }
}

fn describe_failures(output: &DeleteObjectsOutput) -> String {
    let failures: Vec<String> = output
        .errors
        .iter()
        .map(|e| format!("{} ({}: {})", e.key, e.code, e.message))
        .collect();
    format!(
        "{} of {} keys not deleted: {}",
        output.errors.len(),
        output.errors.len() + output.deleted.len(),
        failures.join(", ")
    )
}
