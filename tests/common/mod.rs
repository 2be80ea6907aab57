#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;

use aura_keygen::config::AppConfig;

/// RSA key used only to sign test assertions.
pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_rsa_key.pem");

pub const TEST_PROJECT: &str = "aura-test";

/// Service account JSON whose token endpoint is `token_uri`.
pub fn service_account_json(token_uri: &str) -> String {
    serde_json::json!({
        "type": "service_account",
        "project_id": TEST_PROJECT,
        "private_key_id": "test-key-id",
        "private_key": TEST_PRIVATE_KEY,
        "client_email": "keygen@aura-test.iam.gserviceaccount.com",
        "client_id": "100000000000000000000",
        "token_uri": token_uri,
    })
    .to_string()
}

/// Write `contents` as a credential file inside a fresh temp dir.
pub fn write_credentials(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("service-account.json");
    std::fs::write(&path, contents).expect("write credentials");
    (dir, path)
}

/// Config pointing at a mock server for both the token and Firestore endpoints.
pub fn mock_config(base_url: &str, credentials: PathBuf, num_keys: usize) -> AppConfig {
    let mut config = AppConfig::default();
    config.credentials.path = credentials;
    config.firestore.base_url = base_url.to_string();
    config.upload.num_keys = num_keys;
    config
}

pub fn collection_path() -> String {
    format!("/v1/projects/{TEST_PROJECT}/databases/(default)/documents/license_keys")
}
