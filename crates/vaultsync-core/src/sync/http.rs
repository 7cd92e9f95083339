//! `RemoteVault` over the vault server's JSON API.

use reqwest::StatusCode;

use super::remote::{
    RemoteError, RemoteResult, RemoteRevision, RemoteVault, RemoteVaultBlob, VaultUpload,
};
use super::wire::{
    decode_blob, encode_blob, ConflictResponse, ErrorResponse, PushRequest, PushResponse,
    RevisionResponse, VaultResponse,
};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const REVISION_PATH: &str = "/v1/vault/revision";
const VAULT_PATH: &str = "/v1/vault";

#[derive(Clone)]
pub struct HttpRemoteVault {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpRemoteVault {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpRemoteVault")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl HttpRemoteVault {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> RemoteResult<Self> {
        let base_url = normalize_endpoint(base_url.into())?;
        let token = normalize_text_option(Some(token.into())).ok_or_else(|| {
            RemoteError::InvalidConfiguration("session token must not be empty".to_string())
        })?;
        Ok(Self {
            base_url,
            token,
            client: reqwest::Client::builder().build()?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body))
    }
}

impl RemoteVault for HttpRemoteVault {
    async fn fetch_revision(&self) -> RemoteResult<RemoteRevision> {
        let response = self
            .client
            .get(self.url(REVISION_PATH))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let payload = Self::check(response)
            .await?
            .json::<RevisionResponse>()
            .await?;
        if payload.revision < 0 {
            return Err(RemoteError::InvalidPayload(format!(
                "negative revision {}",
                payload.revision
            )));
        }

        Ok(RemoteRevision {
            revision: payload.revision,
            schema_version: normalize_text_option(payload.schema_version),
        })
    }

    async fn pull(&self) -> RemoteResult<RemoteVaultBlob> {
        let response = self
            .client
            .get(self.url(VAULT_PATH))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await?;
        let payload = Self::check(response).await?.json::<VaultResponse>().await?;
        payload.try_into()
    }

    async fn push(&self, upload: VaultUpload) -> RemoteResult<i64> {
        let request = PushRequest {
            expected_revision: upload.expected_revision,
            schema_version: upload.schema_version,
            blob: encode_blob(&upload.blob),
        };
        let response = self
            .client
            .put(self.url(VAULT_PATH))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await?;
        let payload = Self::check(response).await?.json::<PushResponse>().await?;
        if payload.revision <= upload.expected_revision {
            return Err(RemoteError::InvalidPayload(format!(
                "push returned revision {} which does not advance {}",
                payload.revision, upload.expected_revision
            )));
        }
        Ok(payload.revision)
    }
}

impl TryFrom<VaultResponse> for RemoteVaultBlob {
    type Error = RemoteError;

    fn try_from(value: VaultResponse) -> RemoteResult<Self> {
        let schema_version = normalize_text_option(Some(value.schema_version)).ok_or_else(|| {
            RemoteError::InvalidPayload("response did not include schema_version".to_string())
        })?;
        let blob = decode_blob(&value.blob)
            .map_err(|e| RemoteError::InvalidPayload(format!("blob is not base64: {e}")))?;
        Ok(Self {
            revision: value.revision,
            schema_version,
            blob,
        })
    }
}

fn error_for_status(status: StatusCode, body: &str) -> RemoteError {
    match status {
        StatusCode::UNAUTHORIZED => RemoteError::Unauthorized,
        StatusCode::NOT_FOUND => RemoteError::NotFound,
        StatusCode::CONFLICT => serde_json::from_str::<ConflictResponse>(body).map_or_else(
            |_| RemoteError::Api(parse_api_error(status, body)),
            |conflict| RemoteError::RevisionConflict {
                current: conflict.current_revision,
            },
        ),
        _ => RemoteError::Api(parse_api_error(status, body)),
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ErrorResponse>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", compact_text(&message), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> RemoteResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidConfiguration("server URL must not be empty".to_string())
    })?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::InvalidConfiguration(
            "server URL must include http:// or https://".to_string(),
        ))
    }
}
