use axum::http::HeaderMap;

use crate::config::AppConfig;
use crate::error::AppError;

/// Account a request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub account_id: String,
}

pub fn authenticate(
    config: &AppConfig,
    headers: &HeaderMap,
) -> Result<AuthenticatedAccount, AppError> {
    let token = extract_bearer_token(headers)?;
    let account_id = config
        .account_for_token(token)
        .ok_or_else(|| AppError::unauthorized("Session token is not recognized"))?;
    Ok(AuthenticatedAccount {
        account_id: account_id.to_string(),
    })
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}
