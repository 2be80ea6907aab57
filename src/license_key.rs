//! The license key document written to the store.
//!
//! Field names follow the collection's camelCase schema (`isUsed`,
//! `usedByHwid`, `activatedAt`) so documents written here are readable by the
//! desktop client that later redeems them.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// One license key document. The document ID is always `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseKey {
    /// The key string, also used as the document ID.
    pub key: String,
    /// Whether the key has been redeemed.
    pub is_used: bool,
    /// Hardware ID the key was redeemed on, if any.
    pub used_by_hwid: Option<String>,
    /// When the key was redeemed, if ever.
    pub activated_at: Option<DateTime<Utc>>,
}

impl LicenseKey {
    /// A freshly issued key: unused, unbound, never activated.
    pub fn new_unused(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            is_used: false,
            used_by_hwid: None,
            activated_at: None,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.key
    }

    /// True for a document in the state this tool writes.
    pub fn is_fresh(&self) -> bool {
        !self.is_used && self.used_by_hwid.is_none() && self.activated_at.is_none()
    }

    /// Encode as a Firestore REST `fields` map.
    ///
    /// ```json
    /// {
    ///   "key":         { "stringValue": "AURA-..." },
    ///   "isUsed":      { "booleanValue": false },
    ///   "usedByHwid":  { "nullValue": null },
    ///   "activatedAt": { "nullValue": null }
    /// }
    /// ```
    pub fn to_firestore_fields(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("key".to_string(), json!({ "stringValue": self.key }));
        fields.insert("isUsed".to_string(), json!({ "booleanValue": self.is_used }));
        fields.insert(
            "usedByHwid".to_string(),
            match &self.used_by_hwid {
                Some(hwid) => json!({ "stringValue": hwid }),
                None => json!({ "nullValue": null }),
            },
        );
        fields.insert(
            "activatedAt".to_string(),
            match &self.activated_at {
                Some(ts) => {
                    json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::Micros, true) })
                }
                None => json!({ "nullValue": null }),
            },
        );
        Value::Object(fields)
    }

    /// Wrap [`Self::to_firestore_fields`] in a Firestore `Document` body.
    pub fn to_firestore_document(&self) -> Value {
        json!({ "fields": self.to_firestore_fields() })
    }
}
