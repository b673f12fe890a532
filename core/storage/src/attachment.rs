//! Attachment metadata consumed by the storage backend.

use serde::{Deserialize, Serialize};

use crate::config::StorageConfig;
use stowage_common::{BucketName, Result};

/// Per-record facts about one attached file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordInfo {
    /// Model class the attachment belongs to (e.g. `User` or `Blog::Post`).
    pub class_name: String,
    /// Attachment name on the model (e.g. `avatar`).
    pub attachment_name: String,
    /// Identifier of the owning record.
    pub id: String,
    /// Original name of the uploaded file.
    pub original_filename: Option<String>,
    /// MIME type of the uploaded file.
    pub content_type: Option<String>,
}

/// Everything the backend needs to know about an attachment for one call.
///
/// Owned by the attachment record and lent to the backend per call, so
/// keys derived from it always reflect the record's current state.
#[derive(Debug, Clone)]
pub struct AttachmentDescriptor {
    pub config: StorageConfig,
    pub record: RecordInfo,
}

impl AttachmentDescriptor {
    pub fn new(config: StorageConfig, record: RecordInfo) -> Self {
        Self { config, record }
    }

    /// Path template for this attachment.
    pub fn path_template(&self) -> &str {
        &self.config.path
    }

    /// The bucket objects of this attachment live in.
    pub fn bucket(&self) -> Result<BucketName> {
        self.config.bucket()
    }

    /// MIME type of the attached file, if known.
    pub fn content_type(&self) -> Option<&str> {
        self.record.content_type.as_deref()
    }

    /// Canned ACL for a newly created bucket.
    pub fn acl(&self) -> &str {
        &self.config.acl
    }

    /// Region the bucket is created in.
    pub fn region(&self) -> &str {
        &self.config.region
    }
}
