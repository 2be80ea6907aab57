use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::{KeygenError, KeygenResult};
use crate::license_key::LicenseKey;
use crate::store::KeyStore;

/// Which kind of write an entry in the write log was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Upsert,
}

#[derive(Debug, Default)]
struct Inner {
    documents: BTreeMap<String, LicenseKey>,
    /// Every write attempt in call order, including failed ones.
    write_log: Vec<(WriteKind, String)>,
}

/// In-memory key store.
///
/// Writes can be made to fail by call number, which lets tests exercise the
/// per-key error path without a network.
#[derive(Debug)]
pub struct MemoryKeyStore {
    collection: String,
    inner: Mutex<Inner>,
    /// 1-based write numbers that fail with a store error.
    failing_writes: HashSet<usize>,
}

impl Default for MemoryKeyStore {
    fn default() -> Self {
        Self::new("license_keys")
    }
}

impl MemoryKeyStore {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            inner: Mutex::new(Inner::default()),
            failing_writes: HashSet::new(),
        }
    }

    /// Make the `n`th write call (1-based) fail.
    pub fn fail_on_write(mut self, n: usize) -> Self {
        self.failing_writes.insert(n);
        self
    }

    /// Seed a document without recording a write.
    pub fn insert_existing(&self, doc: LicenseKey) -> KeygenResult<()> {
        let mut inner = self.lock()?;
        inner.documents.insert(doc.key.clone(), doc);
        Ok(())
    }

    pub fn get(&self, id: &str) -> KeygenResult<Option<LicenseKey>> {
        Ok(self.lock()?.documents.get(id).cloned())
    }

    /// Snapshot of all documents, keyed by document ID.
    pub fn documents(&self) -> KeygenResult<BTreeMap<String, LicenseKey>> {
        Ok(self.lock()?.documents.clone())
    }

    /// Every write attempt so far, in call order.
    pub fn write_log(&self) -> KeygenResult<Vec<(WriteKind, String)>> {
        Ok(self.lock()?.write_log.clone())
    }

    pub fn write_count(&self) -> KeygenResult<usize> {
        Ok(self.lock()?.write_log.len())
    }

    fn lock(&self) -> KeygenResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| KeygenError::StoreError("failed to acquire memory store lock".into()))
    }

    fn write(&self, kind: WriteKind, doc: &LicenseKey) -> KeygenResult<()> {
        let mut inner = self.lock()?;
        inner.write_log.push((kind, doc.key.clone()));
        let call = inner.write_log.len();

        if self.failing_writes.contains(&call) {
            debug!(call, key = %doc.key, "Injected write failure");
            return Err(KeygenError::StoreError(format!(
                "injected failure on write {call}"
            )));
        }

        if kind == WriteKind::Create && inner.documents.contains_key(&doc.key) {
            return Err(KeygenError::AlreadyExists(doc.key.clone()));
        }

        inner.documents.insert(doc.key.clone(), doc.clone());
        Ok(())
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    fn collection(&self) -> &str {
        &self.collection
    }

    async fn create(&self, doc: &LicenseKey) -> KeygenResult<()> {
        self.write(WriteKind::Create, doc)
    }

    async fn upsert(&self, doc: &LicenseKey) -> KeygenResult<()> {
        self.write(WriteKind::Upsert, doc)
    }
}
