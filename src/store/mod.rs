//! Document store abstraction.
//!
//! This module contains:
//! - `firestore` → Cloud Firestore over its REST API
//! - `memory`    → In-memory store for tests and local runs
//!
//! The upload loop only sees [`KeyStore`], so the backing store is chosen once
//! at startup and passed in.

pub mod firestore;
pub mod memory;

use async_trait::async_trait;

use crate::errors::KeygenResult;
use crate::license_key::LicenseKey;

pub use firestore::{FirestoreClient, FirestoreSettings};
pub use memory::MemoryKeyStore;

/// A collection of license key documents addressed by key string.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Name of the collection being written.
    fn collection(&self) -> &str;

    /// Create the document, failing with `KeygenError::AlreadyExists` if the
    /// ID is taken.
    async fn create(&self, doc: &LicenseKey) -> KeygenResult<()>;

    /// Create or overwrite the document.
    async fn upsert(&self, doc: &LicenseKey) -> KeygenResult<()>;
}
