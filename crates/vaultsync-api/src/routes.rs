use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Extension, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use vaultsync_core::sync::wire::{
    decode_blob, encode_blob, PushRequest, PushResponse, RevisionResponse, VaultResponse,
};

use crate::auth::{authenticate, AuthenticatedAccount};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::store::VaultStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    store: VaultStore,
}

impl AppState {
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        Self {
            config,
            store: VaultStore::new(),
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    // Base64 inflates the blob by a third; leave room for the JSON envelope.
    let body_limit = state.config.max_blob_bytes.saturating_mul(2);

    let protected_routes = Router::new()
        .route("/vault/revision", get(vault_revision))
        .route("/vault", get(pull_vault).put(push_vault))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", protected_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
}

async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
    })
}

async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let account = authenticate(&state.config, request.headers())?;
    request.extensions_mut().insert(account);
    Ok(next.run(request).await)
}

async fn vault_revision(
    State(state): State<AppState>,
    Extension(account): Extension<AuthenticatedAccount>,
) -> Json<RevisionResponse> {
    let (revision, schema_version) = state.store.revision(&account.account_id).await;
    Json(RevisionResponse {
        revision,
        schema_version,
    })
}

async fn pull_vault(
    State(state): State<AppState>,
    Extension(account): Extension<AuthenticatedAccount>,
) -> Result<Json<VaultResponse>, AppError> {
    let vault = state.store.get(&account.account_id).await?;
    tracing::info!(
        endpoint = "vault_pull",
        account = %account.account_id,
        revision = vault.revision,
        blob_len = vault.blob.len(),
        "Served vault"
    );
    Ok(Json(VaultResponse {
        revision: vault.revision,
        schema_version: vault.schema_version,
        blob: encode_blob(&vault.blob),
    }))
}

async fn push_vault(
    State(state): State<AppState>,
    Extension(account): Extension<AuthenticatedAccount>,
    Json(request): Json<PushRequest>,
) -> Result<Json<PushResponse>, AppError> {
    if request.expected_revision < 0 {
        return Err(AppError::bad_request("expected_revision cannot be negative"));
    }
    let schema_version = request.schema_version.trim();
    if schema_version.is_empty() {
        return Err(AppError::bad_request("schema_version is required"));
    }
    let blob = decode_blob(&request.blob)
        .map_err(|_| AppError::bad_request("blob is not valid base64"))?;
    if blob.is_empty() {
        return Err(AppError::bad_request("blob is empty"));
    }
    let limit = state.config.max_blob_bytes;
    if blob.len() > limit {
        return Err(AppError::PayloadTooLarge { limit });
    }

    let blob_len = blob.len();
    let result = state
        .store
        .put(
            &account.account_id,
            request.expected_revision,
            schema_version.to_string(),
            blob,
        )
        .await;
    match &result {
        Ok(revision) => tracing::info!(
            endpoint = "vault_push",
            account = %account.account_id,
            revision,
            blob_len,
            "Stored vault"
        ),
        Err(AppError::Conflict { current_revision }) => tracing::info!(
            endpoint = "vault_push",
            account = %account.account_id,
            expected = request.expected_revision,
            current = current_revision,
            "Rejected stale push"
        ),
        Err(_) => {}
    }
    Ok(Json(PushResponse { revision: result? }))
}
