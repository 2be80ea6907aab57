//! aura-keygen - issue AURA license keys into Cloud Firestore
//!
//! Generates keys of the form `AURA-XXXXX-XXXXX-XXXXX` and writes each one as an
//! unused document (`isUsed = false`, `usedByHwid = null`, `activatedAt = null`)
//! into the `license_keys` collection, keyed by the key string.
//!
//! # Example
//!
//! ```rust,no_run
//! use aura_keygen::store::MemoryKeyStore;
//! use aura_keygen::upload::{upload_keys_to_firestore, UploadOptions};
//!
//! # async fn demo() -> aura_keygen::errors::KeygenResult<()> {
//! let store = MemoryKeyStore::default();
//! let mut out = std::io::stdout();
//! let report = upload_keys_to_firestore(&store, &UploadOptions::with_num_keys(3), &mut out).await?;
//! assert_eq!(report.succeeded(), 3);
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod key_generation;
pub mod license_key;
pub mod logging;
pub mod store;
pub mod upload;
