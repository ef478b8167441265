//! Authenticated self-service profile endpoints.
//!
//! `/users/me` always acts on the caller's own identity. The `role` field is
//! read-only here: a payload that tries to change it is accepted and the
//! role silently left untouched, matching the rest of the profile surface.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::auth::principal::require_auth;
use super::auth::state::AuthState;
use super::auth::storage::{update_profile, ProfileChanges, ProfileOutcome};
use super::auth::types::{ProfileResponse, ProfileUpdateRequest};
use super::auth::utils::{normalize_email, valid_email};

#[utoipa::path(
    get,
    path = "/users/me",
    responses(
        (status = 200, description = "The caller's own profile", body = ProfileResponse),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    tag = "me"
)]
pub async fn get_me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool, &state).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    (
        StatusCode::OK,
        Json(ProfileResponse::from(&principal.identity)),
    )
        .into_response()
}

#[utoipa::path(
    patch,
    path = "/users/me",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid update payload"),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
    tag = "me"
)]
pub async fn patch_me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ProfileUpdateRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool, &state).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let request = payload.map(|Json(payload)| payload).unwrap_or_default();

    let email = match request.email.map(|value| normalize_email(&value)) {
        Some(email) if !valid_email(&email) => {
            return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
        }
        other => other,
    };

    // role is deliberately absent: self-edits never change it, whatever the
    // payload says.
    let changes = ProfileChanges {
        email,
        first_name: normalize_optional(request.first_name),
        last_name: normalize_optional(request.last_name),
        bio: request.bio,
        role: None,
    };

    match update_profile(&pool, principal.identity.id, &changes).await {
        Ok(ProfileOutcome::Updated(identity)) => {
            (StatusCode::OK, Json(ProfileResponse::from(&identity))).into_response()
        }
        Ok(ProfileOutcome::EmailTaken) => (
            StatusCode::BAD_REQUEST,
            "Email is already registered".to_string(),
        )
            .into_response(),
        Ok(ProfileOutcome::Missing) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!("Failed to update own profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
