//! Common utilities and types shared across Stowage modules.
//!
//! This module provides the error type and the small value types that flow
//! between the storage backend and its collaborators.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{BucketName, StorageKey};
