//! Generate-and-upload loop.
//!
//! Each key is written independently. A failed write is recorded in the
//! [`UploadReport`] and printed, and the loop moves on to the next key.
//!
//! Progress goes to the caller's writer (stdout in the binary):
//!
//! ```text
//! Uploaded key 1: AURA-3F2A9-0C1DE-B7741
//! Error uploading key AURA-99A01-5E2F0-1C3B8: store error: HTTP 503 ...
//!
//! Finished uploading 10 keys to 'license_keys' collection.
//! 9 succeeded, 1 failed.
//! ```

use std::io::Write;

use rand::CryptoRng;
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument};

use crate::config::{UploadConfig, WriteMode};
use crate::errors::{KeygenError, KeygenResult};
use crate::key_generation::{generate_key_with_prefix, DEFAULT_KEY_PREFIX};
use crate::license_key::LicenseKey;
use crate::store::KeyStore;

/// Parameters of one upload run.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub num_keys: usize,
    pub key_prefix: String,
    pub write_mode: WriteMode,
    /// Keys generated per item before giving up on collisions.
    pub max_collision_attempts: u32,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            num_keys: 10,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            write_mode: WriteMode::Create,
            max_collision_attempts: 3,
        }
    }
}

impl UploadOptions {
    pub fn with_num_keys(num_keys: usize) -> Self {
        Self {
            num_keys,
            ..Default::default()
        }
    }
}

impl From<&UploadConfig> for UploadOptions {
    fn from(config: &UploadConfig) -> Self {
        Self {
            num_keys: config.num_keys,
            key_prefix: config.key_prefix.clone(),
            write_mode: config.write_mode,
            max_collision_attempts: config.max_collision_attempts,
        }
    }
}

/// Why a single key was not uploaded.
#[derive(Debug, Error)]
pub enum UploadFailure {
    /// Every generated key already existed in the collection.
    #[error("key collided with an existing document on all {attempts} attempts")]
    Collision { attempts: u32 },

    /// The store rejected or failed the write.
    #[error("{0}")]
    Store(#[source] KeygenError),
}

/// Result of one item in the loop.
#[derive(Debug)]
pub enum KeyOutcome {
    Uploaded {
        /// 1-based position in the run
        index: usize,
        key: String,
        /// Keys generated for this item; above 1 only after collisions
        attempts: u32,
    },
    Failed {
        index: usize,
        /// The last key tried
        key: String,
        reason: UploadFailure,
    },
}

impl KeyOutcome {
    pub fn index(&self) -> usize {
        match self {
            KeyOutcome::Uploaded { index, .. } | KeyOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            KeyOutcome::Uploaded { key, .. } | KeyOutcome::Failed { key, .. } => key,
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self, KeyOutcome::Uploaded { .. })
    }
}

/// Per-key results of a run.
#[derive(Debug)]
pub struct UploadReport {
    /// Number of keys the run was asked for.
    pub requested: usize,
    pub outcomes: Vec<KeyOutcome>,
}

impl UploadReport {
    fn new(requested: usize) -> Self {
        Self {
            requested,
            outcomes: Vec::with_capacity(requested),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_uploaded()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Keys that are now in the store, in upload order.
    pub fn uploaded_keys(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_uploaded())
            .map(KeyOutcome::key)
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &KeyOutcome> {
        self.outcomes.iter().filter(|o| !o.is_uploaded())
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.requested
    }
}

/// Generate `options.num_keys` keys and write each to `store`, printing progress to `out`.
///
/// Per-key failures never abort the loop; they are recorded in the returned
/// report. Only a failure to write progress to `out` ends the run early.
pub async fn upload_keys_to_firestore<S, W>(
    store: &S,
    options: &UploadOptions,
    out: &mut W,
) -> KeygenResult<UploadReport>
where
    S: KeyStore + ?Sized,
    W: Write,
{
    upload_keys_with_rng(store, options, &mut rand::rng(), out).await
}

/// Same as [`upload_keys_to_firestore`] with an explicit entropy source.
pub async fn upload_keys_with_rng<S, R, W>(
    store: &S,
    options: &UploadOptions,
    rng: &mut R,
    out: &mut W,
) -> KeygenResult<UploadReport>
where
    S: KeyStore + ?Sized,
    R: CryptoRng,
    W: Write,
{
    let mut report = UploadReport::new(options.num_keys);

    writeln!(
        out,
        "\nGenerating and uploading {} unique license keys...",
        options.num_keys
    )?;

    for index in 1..=options.num_keys {
        let span = info_span!("upload_key", index, collection = %store.collection());
        let outcome = upload_one(store, options, rng, index).instrument(span).await;

        match &outcome {
            KeyOutcome::Uploaded { key, attempts, .. } => {
                writeln!(out, "Uploaded key {index}: {key}")?;
                info!(index, key = %key, attempts, "Uploaded license key");
            }
            KeyOutcome::Failed { key, reason, .. } => {
                writeln!(out, "Error uploading key {key}: {reason}")?;
                warn!(index, key = %key, error = %reason, "Failed to upload license key");
            }
        }

        report.outcomes.push(outcome);
    }

    writeln!(
        out,
        "\nFinished uploading {} keys to '{}' collection.",
        options.num_keys,
        store.collection()
    )?;
    writeln!(
        out,
        "{} succeeded, {} failed.",
        report.succeeded(),
        report.failed()
    )?;

    Ok(report)
}

/// Generate and write one key, regenerating on ID collisions in create mode.
async fn upload_one<S, R>(
    store: &S,
    options: &UploadOptions,
    rng: &mut R,
    index: usize,
) -> KeyOutcome
where
    S: KeyStore + ?Sized,
    R: CryptoRng,
{
    let allowed = match options.write_mode {
        WriteMode::Create => options.max_collision_attempts.max(1),
        WriteMode::Upsert => 1,
    };

    let mut key = generate_key_with_prefix(&options.key_prefix, rng);

    for attempt in 1..=allowed {
        let doc = LicenseKey::new_unused(key.clone());
        let result = match options.write_mode {
            WriteMode::Create => store.create(&doc).await,
            WriteMode::Upsert => store.upsert(&doc).await,
        };

        match result {
            Ok(()) => {
                return KeyOutcome::Uploaded {
                    index,
                    key,
                    attempts: attempt,
                }
            }
            Err(e) if e.is_already_exists() => {
                warn!(key = %key, attempt, "Generated key already exists");
                if attempt < allowed {
                    key = generate_key_with_prefix(&options.key_prefix, rng);
                }
            }
            Err(e) => {
                return KeyOutcome::Failed {
                    index,
                    key,
                    reason: UploadFailure::Store(e),
                }
            }
        }
    }

    KeyOutcome::Failed {
        index,
        key,
        reason: UploadFailure::Collision { attempts: allowed },
    }
}
