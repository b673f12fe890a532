//! Attachment storage backed by an S3-style object store.
//!
//! This crate resolves where an attachment's styles live in a bucket,
//! uploads and deletes them through a narrow [`ObjectStoreClient`], and
//! builds delivery URLs through the object store itself or a CDN.
//!
//! # Design Principles
//! - Collaborator isolation: the wire protocol and URL signing live behind
//!   [`ObjectStoreClient`] and [`CdnSigner`]
//! - Typed configuration: provider settings are validated when loaded
//! - Closed provider set: [`ProviderKind`] is parsed once at the boundary

pub mod attachment;
pub mod backend;
pub mod bucket;
pub mod client;
pub mod config;
pub mod interpolate;
pub mod memory;
pub mod provider;
pub mod signer;

pub use attachment::{AttachmentDescriptor, RecordInfo};
pub use backend::S3Storage;
pub use bucket::{BucketProvisioner, BucketState};
pub use client::{
    CreateBucketRequest, DeleteObjectError, DeleteObjectsOutput, ObjectStoreClient,
    PutObjectRequest,
};
pub use config::{CloudFrontConfig, MaxCdnConfig, ObjectConfig, S3Config, StorageConfig};
pub use interpolate::{PathInterpolator, TokenInterpolator};
pub use memory::MemoryObjectStore;
pub use provider::{
    DirectStoreProvider, PassthroughCdnProvider, ProviderKind, SignedCdnProvider, UrlProvider,
};
pub use signer::{CdnSigner, Clock, SystemClock};
