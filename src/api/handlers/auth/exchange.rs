//! Confirmation code exchange endpoint.
//!
//! Verification and consumption are a single logical step: the code is
//! checked against a snapshot of the identity, then a compare-and-clear
//! update consumes it only if that snapshot is still current. Two racing
//! exchanges can both pass verification; the database lets exactly one of
//! them consume.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::state::AuthState;
use super::storage::{consume_fingerprint, find_by_username};
use super::types::{TokenRequest, TokenResponse};

/// Single error surface for every verification failure. Expired and wrong
/// codes are deliberately indistinguishable to the caller.
const INVALID_CREDENTIAL: &str = "invalid or expired confirmation code";

#[utoipa::path(
    post,
    path = "/auth/token",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Code exchanged for an access token", body = TokenResponse),
        (status = 400, description = "Invalid or expired confirmation code"),
        (status = 404, description = "Unknown username"),
    ),
    tag = "auth"
)]
pub async fn exchange(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<TokenRequest>>,
) -> impl IntoResponse {
    let request: TokenRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let username = request.username.trim();
    let code = request.confirmation_code.trim();

    let identity = match find_by_username(&pool, username).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "User not found".to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to resolve identity for exchange: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Exchange failed".to_string(),
            )
                .into_response();
        }
    };

    if !state.codes().verify(&identity, code) {
        return (StatusCode::BAD_REQUEST, INVALID_CREDENTIAL.to_string()).into_response();
    }

    // Compare-and-clear against the snapshot verification ran on; at most
    // one concurrent exchange gets a row back.
    let consumed = match consume_fingerprint(&pool, &identity).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            return (StatusCode::BAD_REQUEST, INVALID_CREDENTIAL.to_string()).into_response();
        }
        Err(err) => {
            error!("Failed to consume confirmation code: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Exchange failed".to_string(),
            )
                .into_response();
        }
    };

    match state.tokens().mint(&consumed) {
        Ok(token) => (StatusCode::OK, Json(TokenResponse { token })).into_response(),
        Err(err) => {
            error!("Failed to mint access token: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Exchange failed".to_string(),
            )
                .into_response()
        }
    }
}
