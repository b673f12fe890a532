//! Bucket provisioning.

use tracing::{debug, info};

use crate::client::{CreateBucketRequest, ObjectStoreClient};
use stowage_common::{BucketName, Error, Result};

/// Whether this backend has already confirmed its bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketState {
    #[default]
    Unprovisioned,
    Provisioned,
}

/// Creates the bucket on first write if it is missing.
///
/// The state is a single flag, not keyed by bucket name: once any bucket
/// has been provisioned, later calls skip the check for every bucket. A
/// backend is expected to target one bucket for its whole lifetime.
#[derive(Debug, Default)]
pub struct BucketProvisioner {
    state: BucketState,
}

impl BucketProvisioner {
    /// Create a provisioner that has not checked any bucket yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current provisioning state.
    pub fn state(&self) -> BucketState {
        self.state
    }

    /// Make sure `bucket` exists, creating it with `acl` in `region` if not.
    ///
    /// # Postconditions
    /// - On success the state is `Provisioned`
    /// - On failure the state is unchanged and the next call checks again
    ///
    /// # Errors
    /// - `Provision` wrapping the store's error
    pub async fn ensure_exists(
        &mut self,
        client: &dyn ObjectStoreClient,
        bucket: &BucketName,
        acl: &str,
        region: &str,
    ) -> Result<()> {
        if self.state == BucketState::Provisioned {
            return Ok(());
        }

        let exists = client
            .does_bucket_exist(bucket)
            .await
            .map_err(|e| Error::provision(bucket.as_str(), e))?;

        if exists {
            debug!(bucket = %bucket, "Bucket already exists");
        } else {
            client
                .create_bucket(CreateBucketRequest {
                    acl: acl.to_string(),
                    bucket: bucket.clone(),
                    location_constraint: region.to_string(),
                })
                .await
                .map_err(|e| Error::provision(bucket.as_str(), e))?;
            info!(bucket = %bucket, region, "Created bucket");
        }

        self.state = BucketState::Provisioned;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryObjectStore, StoreCall, StoreOperation};

    fn bucket(s: &str) -> BucketName {
        BucketName::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_creates_missing_bucket() {
        let store = MemoryObjectStore::new();
        let mut provisioner = BucketProvisioner::new();

        provisioner
            .ensure_exists(&store, &bucket("bucket-1"), "private", "eu-west-1")
            .await
            .unwrap();

        assert_eq!(provisioner.state(), BucketState::Provisioned);
        assert!(store.has_bucket("bucket-1"));
        assert_eq!(
            store.calls(),
            vec![
                StoreCall::DoesBucketExist {
                    bucket: "bucket-1".to_string()
                },
                StoreCall::CreateBucket {
                    bucket: "bucket-1".to_string(),
                    acl: "private".to_string(),
                    location_constraint: "eu-west-1".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_existing_bucket_not_recreated() {
        let store = MemoryObjectStore::new().with_bucket("bucket-1");
        let mut provisioner = BucketProvisioner::new();

        provisioner
            .ensure_exists(&store, &bucket("bucket-1"), "private", "us-east-1")
            .await
            .unwrap();

        assert_eq!(store.calls().len(), 1);
        assert_eq!(provisioner.state(), BucketState::Provisioned);
    }

    #[tokio::test]
    async fn test_provisioned_state_skips_every_bucket() {
        let store = MemoryObjectStore::new();
        let mut provisioner = BucketProvisioner::new();

        provisioner
            .ensure_exists(&store, &bucket("bucket-1"), "private", "us-east-1")
            .await
            .unwrap();
        let calls_after_first = store.calls().len();

        provisioner
            .ensure_exists(&store, &bucket("bucket-1"), "private", "us-east-1")
            .await
            .unwrap();
        provisioner
            .ensure_exists(&store, &bucket("bucket-2"), "private", "us-east-1")
            .await
            .unwrap();

        assert_eq!(store.calls().len(), calls_after_first);
        assert!(!store.has_bucket("bucket-2"));
    }

    #[tokio::test]
    async fn test_failure_leaves_state_unprovisioned() {
        let store = MemoryObjectStore::new().fail_on(StoreOperation::CreateBucket);
        let mut provisioner = BucketProvisioner::new();

        let result = provisioner
            .ensure_exists(&store, &bucket("bucket-1"), "private", "us-east-1")
            .await;

        assert!(matches!(result, Err(Error::Provision { ref bucket, .. }) if bucket == "bucket-1"));
        assert_eq!(provisioner.state(), BucketState::Unprovisioned);
    }

    #[tokio::test]
    async fn test_existence_check_failure() {
        let store = MemoryObjectStore::new().fail_on(StoreOperation::DoesBucketExist);
        let mut provisioner = BucketProvisioner::new();

        let result = provisioner
            .ensure_exists(&store, &bucket("bucket-1"), "private", "us-east-1")
            .await;

        assert!(matches!(result, Err(Error::Provision { .. })));
        assert_eq!(store.calls().len(), 1);
    }
}
