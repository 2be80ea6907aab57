//! Startup flow: credentials, store client, then the upload run.
//!
//! Initialization happens once per process and moves through
//!
//! ```text
//! Uninitialized -> CredentialLoaded -> ClientReady
//!       |                 |
//!       +-----------------+-----> Failed
//! ```
//!
//! A missing credential file fails the first transition, so no key is
//! generated and no request is sent. Malformed or rejected credentials fail
//! the second. There is no path back out of `Failed` and no re-initialization.

use std::io::Write;

use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::credentials::ServiceAccountKey;
use crate::errors::{KeygenError, KeygenResult};
use crate::store::firestore::{FirestoreClient, FirestoreSettings};
use crate::upload::{upload_keys_to_firestore, UploadOptions, UploadReport};

/// Initialization states.
#[derive(Debug)]
pub enum InitState {
    Uninitialized,
    CredentialLoaded(ServiceAccountKey),
    ClientReady(FirestoreClient),
    Failed(KeygenError),
}

impl InitState {
    pub fn name(&self) -> &'static str {
        match self {
            InitState::Uninitialized => "uninitialized",
            InitState::CredentialLoaded(_) => "credential_loaded",
            InitState::ClientReady(_) => "client_ready",
            InitState::Failed(_) => "failed",
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, InitState::ClientReady(_) | InitState::Failed(_))
    }

    /// Perform one transition. Terminal states are returned unchanged.
    pub async fn advance(self, config: &AppConfig) -> InitState {
        match self {
            InitState::Uninitialized => {
                let path = &config.credentials.path;
                debug!(path = %path.display(), "Loading service account key");
                match ServiceAccountKey::from_file(path) {
                    Ok(account) => InitState::CredentialLoaded(account),
                    Err(e) => InitState::Failed(e),
                }
            }
            InitState::CredentialLoaded(account) => {
                let settings = FirestoreSettings::from_config(&config.firestore, &account.project_id);
                let client = match FirestoreClient::new(settings, &account) {
                    Ok(client) => client,
                    Err(e) => return InitState::Failed(e),
                };
                match client.authenticate().await {
                    Ok(()) => InitState::ClientReady(client),
                    Err(e) => InitState::Failed(e),
                }
            }
            terminal => terminal,
        }
    }
}

/// Run the state machine to completion and return the ready client.
pub async fn initialize_store(config: &AppConfig) -> KeygenResult<FirestoreClient> {
    let mut state = InitState::Uninitialized;
    while !state.is_terminal() {
        let from = state.name();
        state = state.advance(config).await;
        debug!(from, to = state.name(), "Initialization transition");
    }

    match state {
        InitState::ClientReady(client) => {
            info!(
                project_id = %client.settings().project_id,
                collection = %client.settings().collection,
                "Firestore client initialized"
            );
            Ok(client)
        }
        InitState::Failed(e) => {
            error!(error = %e, "Firestore client initialization failed");
            Err(e)
        }
        // The loop only exits on a terminal state.
        other => Err(KeygenError::StoreError(format!(
            "initialization stopped in state '{}'",
            other.name()
        ))),
    }
}

/// Initialize the store and run one upload, printing progress to `out`.
///
/// Startup failures are returned before anything is written to `out` and
/// before any key is generated.
pub async fn run<W: Write>(config: &AppConfig, out: &mut W) -> KeygenResult<UploadReport> {
    let store = initialize_store(config).await?;
    writeln!(out, "Firebase Admin SDK initialized successfully.")?;

    let options = UploadOptions::from(&config.upload);
    upload_keys_to_firestore(&store, &options, out).await
}
