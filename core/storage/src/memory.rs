//! In-memory object store for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use url::Url;

use crate::client::{
    object_url_for, CreateBucketRequest, DeleteObjectError, DeleteObjectsOutput,
    ObjectStoreClient, PutObjectRequest,
};
use stowage_common::{BucketName, Error, Result, StorageKey};

/// Endpoint used for object URLs unless overridden.
pub const DEFAULT_ENDPOINT: &str = "https://s3.amazonaws.com";

/// A call made against the store, in the order it was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    PutObject {
        bucket: String,
        key: String,
    },
    DeleteObjects {
        bucket: String,
        keys: Vec<String>,
    },
    DoesBucketExist {
        bucket: String,
    },
    CreateBucket {
        bucket: String,
        acl: String,
        location_constraint: String,
    },
}

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    PutObject,
    DeleteObjects,
    DoesBucketExist,
    CreateBucket,
}

/// A stored object.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub content_type: Option<String>,
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug)]
struct Bucket {
    acl: String,
    region: String,
    objects: BTreeMap<String, StoredObject>,
}

#[derive(Debug, Default)]
struct State {
    buckets: HashMap<String, Bucket>,
    calls: Vec<StoreCall>,
    failing_operations: HashSet<StoreOperation>,
    undeletable_keys: HashSet<String>,
}

/// In-memory object store.
///
/// Useful for testing and development. Every call is recorded, uploads
/// read the source file from disk, and object URLs are built against a
/// configurable endpoint. All data is lost on drop.
#[derive(Clone)]
pub struct MemoryObjectStore {
    endpoint: Url,
    state: Arc<RwLock<State>>,
}

impl MemoryObjectStore {
    /// Create an empty store with no buckets.
    pub fn new() -> Self {
        Self {
            endpoint: Url::parse(DEFAULT_ENDPOINT).expect("default endpoint is a valid URL"),
            state: Arc::new(RwLock::new(State::default())),
        }
    }

    /// Use a different endpoint for object URLs.
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = Url::parse(endpoint)
            .map_err(|e| Error::InvalidInput(format!("Invalid endpoint '{}': {}", endpoint, e)))?;
        Ok(self)
    }

    /// Pre-create a bucket.
    pub fn with_bucket(self, name: &str) -> Self {
        self.write().buckets.insert(
            name.to_string(),
            Bucket {
                acl: "private".to_string(),
                region: "us-east-1".to_string(),
                objects: BTreeMap::new(),
            },
        );
        self
    }

    /// Make every call of `operation` fail with a storage error.
    pub fn fail_on(self, operation: StoreOperation) -> Self {
        self.write().failing_operations.insert(operation);
        self
    }

    /// Report `key` as a per-key failure in batched deletes.
    pub fn refuse_delete(self, key: &str) -> Self {
        self.write().undeletable_keys.insert(key.to_string());
        self
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.read(|state| state.calls.clone())
    }

    pub fn has_bucket(&self, name: &str) -> bool {
        self.read(|state| state.buckets.contains_key(name))
    }

    /// ACL and region a bucket was created with.
    pub fn bucket_settings(&self, name: &str) -> Option<(String, String)> {
        self.read(|state| {
            state
                .buckets
                .get(name)
                .map(|b| (b.acl.clone(), b.region.clone()))
        })
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.read(|state| {
            state
                .buckets
                .get(bucket)
                .and_then(|b| b.objects.get(key).cloned())
        })
    }

    fn read<T>(&self, f: impl FnOnce(&State) -> T) -> T {
        let guard = self.state.read().unwrap_or_else(|e| e.into_inner());
        f(&guard)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call and fail it if the operation is configured to fail.
    fn record(&self, call: StoreCall, operation: StoreOperation) -> Result<()> {
        let mut state = self.write();
        state.calls.push(call);
        if state.failing_operations.contains(&operation) {
            return Err(Error::Storage(format!("{:?} failed", operation)));
        }
        Ok(())
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn put_object(&self, request: PutObjectRequest) -> Result<()> {
        self.record(
            StoreCall::PutObject {
                bucket: request.bucket.to_string(),
                key: request.key.to_string(),
            },
            StoreOperation::PutObject,
        )?;

        let data = tokio::fs::read(&request.source_file).await?;

        let mut state = self.write();
        let bucket = state
            .buckets
            .get_mut(request.bucket.as_str())
            .ok_or_else(|| Error::NotFound(format!("Bucket not found: {}", request.bucket)))?;

        bucket.objects.insert(
            request.key.into_string(),
            StoredObject {
                data,
                content_type: request.content_type,
                extra: request.extra,
            },
        );
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &BucketName,
        keys: &[StorageKey],
    ) -> Result<DeleteObjectsOutput> {
        self.record(
            StoreCall::DeleteObjects {
                bucket: bucket.to_string(),
                keys: keys.iter().map(|k| k.to_string()).collect(),
            },
            StoreOperation::DeleteObjects,
        )?;

        let mut state = self.write();
        let State {
            buckets,
            undeletable_keys,
            ..
        } = &mut *state;
        let objects = &mut buckets
            .get_mut(bucket.as_str())
            .ok_or_else(|| Error::NotFound(format!("Bucket not found: {}", bucket)))?
            .objects;

        let mut output = DeleteObjectsOutput::default();
        for key in keys {
            if undeletable_keys.contains(key.as_str()) {
                output.errors.push(DeleteObjectError {
                    key: key.clone(),
                    code: "AccessDenied".to_string(),
                    message: "Access Denied".to_string(),
                });
            } else {
                // Deleting a missing key succeeds, as in S3.
                objects.remove(key.as_str());
                output.deleted.push(key.clone());
            }
        }
        Ok(output)
    }

    async fn does_bucket_exist(&self, bucket: &BucketName) -> Result<bool> {
        self.record(
            StoreCall::DoesBucketExist {
                bucket: bucket.to_string(),
            },
            StoreOperation::DoesBucketExist,
        )?;
        Ok(self.has_bucket(bucket.as_str()))
    }

    async fn create_bucket(&self, request: CreateBucketRequest) -> Result<()> {
        self.record(
            StoreCall::CreateBucket {
                bucket: request.bucket.to_string(),
                acl: request.acl.clone(),
                location_constraint: request.location_constraint.clone(),
            },
            StoreOperation::CreateBucket,
        )?;

        let mut state = self.write();
        if state.buckets.contains_key(request.bucket.as_str()) {
            return Err(Error::Storage(format!(
                "BucketAlreadyOwnedByYou: {}",
                request.bucket
            )));
        }
        state.buckets.insert(
            request.bucket.to_string(),
            Bucket {
                acl: request.acl,
                region: request.location_constraint,
                objects: BTreeMap::new(),
            },
        );
        Ok(())
    }

    fn object_url(&self, bucket: &BucketName, key: &StorageKey, path_style: bool) -> String {
        object_url_for(&self.endpoint, bucket, key, path_style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bucket(s: &str) -> BucketName {
        BucketName::new(s).unwrap()
    }

    fn key(s: &str) -> StorageKey {
        StorageKey::new(s).unwrap()
    }

    #[tokio::test]
    async fn test_put_reads_source_file() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upload.bin");
        tokio::fs::write(&source, b"hello").await.unwrap();

        let store = MemoryObjectStore::new().with_bucket("uploads");
        store
            .put_object(PutObjectRequest {
                bucket: bucket("uploads"),
                key: key("a/b.bin"),
                source_file: source,
                content_type: Some("application/octet-stream".to_string()),
                extra: BTreeMap::new(),
            })
            .await
            .unwrap();

        let object = store.object("uploads", "a/b.bin").unwrap();
        assert_eq!(object.data, b"hello");
        assert_eq!(object.content_type.as_deref(), Some("application/octet-stream"));
    }

    #[tokio::test]
    async fn test_put_into_missing_bucket_fails() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("upload.bin");
        tokio::fs::write(&source, b"hello").await.unwrap();

        let store = MemoryObjectStore::new();
        let result = store
            .put_object(PutObjectRequest {
                bucket: bucket("nowhere"),
                key: key("a"),
                source_file: source,
                content_type: None,
                extra: BTreeMap::new(),
            })
            .await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_reports_refused_keys() {
        let store = MemoryObjectStore::new()
            .with_bucket("uploads")
            .refuse_delete("locked");

        let output = store
            .delete_objects(&bucket("uploads"), &[key("free"), key("locked")])
            .await
            .unwrap();

        assert_eq!(output.deleted, vec![key("free")]);
        assert_eq!(output.errors.len(), 1);
        assert_eq!(output.errors[0].key, key("locked"));
    }

    #[tokio::test]
    async fn test_create_existing_bucket_fails() {
        let store = MemoryObjectStore::new().with_bucket("uploads");
        let result = store
            .create_bucket(CreateBucketRequest {
                acl: "private".to_string(),
                bucket: bucket("uploads"),
                location_constraint: "us-east-1".to_string(),
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure_is_recorded() {
        let store = MemoryObjectStore::new().fail_on(StoreOperation::DoesBucketExist);
        assert!(store.does_bucket_exist(&bucket("b")).await.is_err());
        assert_eq!(
            store.calls(),
            vec![StoreCall::DoesBucketExist {
                bucket: "b".to_string()
            }]
        );
    }

    #[test]
    fn test_custom_endpoint() {
        let store = MemoryObjectStore::new()
            .with_endpoint("http://localhost:9000")
            .unwrap();
        assert_eq!(
            store.object_url(&bucket("media"), &key("x.png"), true),
            "http://localhost:9000/media/x.png"
        );
        assert!(MemoryObjectStore::new().with_endpoint("not a url").is_err());
    }
}
