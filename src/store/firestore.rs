//! Cloud Firestore store over the REST API (v1).
//!
//! Authentication uses the service account JWT bearer flow: a short-lived RS256
//! assertion signed with the account's private key is exchanged at the
//! account's token URI for an OAuth2 access token. The token is cached and
//! refreshed shortly before it expires.
//!
//! When an emulator host is configured, requests go to the emulator over plain
//! HTTP with the emulator's `owner` bearer token and no token exchange.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::FirestoreConfig;
use crate::credentials::ServiceAccountKey;
use crate::errors::{KeygenError, KeygenResult};
use crate::license_key::LicenseKey;
use crate::store::KeyStore;

/// OAuth2 scope granting Firestore read/write access.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each signed assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Tokens this close to expiry are refreshed before use.
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Bearer token accepted by the Firestore emulator as an admin credential.
const EMULATOR_TOKEN: &str = "owner";

/// Resolved connection settings for one collection.
#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    /// Scheme and host, without a trailing slash (e.g. `https://firestore.googleapis.com`)
    pub base_url: String,
    pub project_id: String,
    pub database: String,
    pub collection: String,
    pub request_timeout: Duration,
    /// Skip the token exchange and talk to an emulator.
    pub emulator: bool,
}

impl FirestoreSettings {
    /// Combine endpoint configuration with the project named in the credentials.
    pub fn from_config(config: &FirestoreConfig, project_id: &str) -> Self {
        let (base_url, emulator) = match &config.emulator_host {
            Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
                (host.clone(), true)
            }
            Some(host) => (format!("http://{host}"), true),
            None => (config.base_url.clone(), false),
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            database: config.database.clone(),
            collection: config.collection.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            emulator,
        }
    }

    /// `.../projects/{p}/databases/{db}/documents/{collection}`
    pub fn collection_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}/documents/{}",
            self.base_url, self.project_id, self.database, self.collection
        )
    }

    pub fn document_url(&self, id: &str) -> String {
        format!("{}/{}", self.collection_url(), id)
    }
}

/// Claims of the signed assertion sent to the token endpoint.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    ASSERTION_LIFETIME_SECS
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Google API error envelope: `{"error": {"code", "message", "status"}}`.
#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > now
    }
}

/// Signs assertions for one service account and caches the resulting token.
struct TokenProvider {
    client_email: String,
    token_uri: String,
    key_id: Option<String>,
    signing_key: EncodingKey,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenProvider {
    fn new(account: &ServiceAccountKey) -> KeygenResult<Self> {
        let signing_key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| KeygenError::InvalidCredentials(format!("unusable private_key: {e}")))?;

        Ok(Self {
            client_email: account.client_email.clone(),
            token_uri: account.token_uri.clone(),
            key_id: account.private_key_id.clone(),
            signing_key,
            cached: Mutex::new(None),
        })
    }

    fn sign_assertion(&self, now: DateTime<Utc>) -> KeygenResult<String> {
        let iat = now.timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: DATASTORE_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.key_id.clone();

        encode(&header, &claims, &self.signing_key)
            .map_err(|e| KeygenError::InvalidCredentials(format!("failed to sign assertion: {e}")))
    }

    async fn fetch(&self, http: &Client) -> KeygenResult<AccessToken> {
        let now = Utc::now();
        let assertion = self.sign_assertion(now)?;

        let resp = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => match err.error_description {
                    Some(desc) => format!("{}: {}", err.error, desc),
                    None => err.error,
                },
                Err(_) => format!("token endpoint returned HTTP {status}"),
            };
            warn!(%status, client_email = %self.client_email, "Token exchange rejected");
            return Err(KeygenError::AuthError(reason));
        }

        let token: TokenResponse = resp.json().await.map_err(|e| {
            KeygenError::AuthError(format!("failed to parse token response: {e}"))
        })?;

        info!(
            client_email = %self.client_email,
            expires_in = token.expires_in,
            "Obtained Firestore access token"
        );

        Ok(AccessToken {
            value: token.access_token,
            expires_at: now + chrono::Duration::seconds(token.expires_in),
        })
    }

    /// A valid access token, fetching a new one if the cached one is stale.
    async fn access_token(&self, http: &Client) -> KeygenResult<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
            debug!("Cached access token is about to expire; refreshing");
        }

        let token = self.fetch(http).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

/// Authenticated handle to one Firestore collection.
pub struct FirestoreClient {
    http: Client,
    settings: FirestoreSettings,
    auth: Option<TokenProvider>,
}

impl std::fmt::Debug for FirestoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreClient")
            .field("settings", &self.settings)
            .field("authenticated", &self.auth.is_some())
            .finish()
    }
}

impl FirestoreClient {
    /// Build a client for `settings` signing as `account`.
    ///
    /// No request is made; call [`Self::authenticate`] to verify the
    /// credentials against the token endpoint.
    pub fn new(settings: FirestoreSettings, account: &ServiceAccountKey) -> KeygenResult<Self> {
        let http = Client::builder()
            .timeout(settings.request_timeout)
            .build()?;

        let auth = if settings.emulator {
            info!(base_url = %settings.base_url, "Using Firestore emulator; skipping authentication");
            None
        } else {
            Some(TokenProvider::new(account)?)
        };

        Ok(Self {
            http,
            settings,
            auth,
        })
    }

    pub fn settings(&self) -> &FirestoreSettings {
        &self.settings
    }

    /// Obtain an access token now, so bad credentials fail before any write.
    pub async fn authenticate(&self) -> KeygenResult<()> {
        if let Some(auth) = &self.auth {
            auth.access_token(&self.http).await?;
        }
        Ok(())
    }

    async fn authorized(&self, req: RequestBuilder) -> KeygenResult<RequestBuilder> {
        let token = match &self.auth {
            Some(auth) => auth.access_token(&self.http).await?,
            None => EMULATOR_TOKEN.to_string(),
        };
        Ok(req.bearer_auth(token))
    }

    /// Map a write response to `Ok(())` or a typed error.
    async fn check_write(resp: Response, id: &str) -> KeygenResult<()> {
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let body = resp.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<GoogleErrorResponse>(&body).ok();

        let already_exists = status == StatusCode::CONFLICT
            || parsed
                .as_ref()
                .is_some_and(|e| e.error.status == "ALREADY_EXISTS");
        if already_exists {
            return Err(KeygenError::AlreadyExists(id.to_string()));
        }

        let message = match parsed {
            Some(e) if !e.error.message.is_empty() => {
                format!("HTTP {status} {}: {}", e.error.status, e.error.message)
            }
            _ => format!("HTTP {status}"),
        };
        Err(KeygenError::StoreError(message))
    }
}

#[async_trait]
impl KeyStore for FirestoreClient {
    fn collection(&self) -> &str {
        &self.settings.collection
    }

    async fn create(&self, doc: &LicenseKey) -> KeygenResult<()> {
        let id = doc.document_id();
        debug!(document_id = %id, "Creating document");

        let req = self
            .http
            .post(self.settings.collection_url())
            .query(&[("documentId", id)])
            .json(&doc.to_firestore_document());
        let resp = self.authorized(req).await?.send().await?;

        Self::check_write(resp, id).await
    }

    async fn upsert(&self, doc: &LicenseKey) -> KeygenResult<()> {
        let id = doc.document_id();
        debug!(document_id = %id, "Setting document");

        // PATCH without an update mask replaces the whole document.
        let req = self
            .http
            .patch(self.settings.document_url(id))
            .json(&doc.to_firestore_document());
        let resp = self.authorized(req).await?.send().await?;

        Self::check_write(resp, id).await
    }
}
