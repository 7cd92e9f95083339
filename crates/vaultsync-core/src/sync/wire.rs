//! JSON bodies exchanged with the vault server.
//!
//! Shared by `HttpRemoteVault` and the `vaultsync-api` server so both sides
//! agree on field names.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// `GET /v1/vault/revision`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionResponse {
    /// 0 when the server holds no vault yet
    pub revision: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
}

/// `GET /v1/vault`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultResponse {
    pub revision: i64,
    pub schema_version: String,
    /// Base64 encoded sealed blob
    pub blob: String,
}

/// `PUT /v1/vault`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushRequest {
    pub expected_revision: i64,
    pub schema_version: String,
    pub blob: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    pub revision: i64,
}

/// Body of a 409 reply to a push whose `expected_revision` is stale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictResponse {
    pub error: String,
    pub current_revision: i64,
}

/// Generic error body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn encode_blob(blob: &[u8]) -> String {
    STANDARD.encode(blob)
}

pub fn decode_blob(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(encoded.trim())
}
