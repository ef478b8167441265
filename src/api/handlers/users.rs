//! User management endpoints, gated by the authorization policy.
//!
//! The reserved alias in the path (default `me`) resolves to the requester
//! before the policy runs, so an administrator hitting `/users/me` edits
//! their own record like anyone else.

use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, Method, StatusCode},
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;

use super::auth::policy::{evaluate, AccessRequest, Decision, ResourceKind};
use super::auth::principal::{require_auth, Principal};
use super::auth::state::AuthState;
use super::auth::storage::{
    find_by_username, list_identities, update_profile, Identity, ProfileChanges, ProfileOutcome,
};
use super::auth::types::{ProfileResponse, ProfileUpdateRequest};
use super::auth::utils::{normalize_email, valid_email};

/// Policy check for a user-profile operation; `owner` is the target record.
fn authorize(principal: &Principal, method: &Method, owner: Option<&Identity>) -> Decision {
    let requester = principal.requester();
    evaluate(&AccessRequest {
        requester: Some(&requester),
        method,
        kind: ResourceKind::UserProfile,
        owner_id: owner.map(|identity| identity.id),
    })
}

/// Resolve a path username, mapping the reserved alias to the requester.
async fn resolve_target(
    pool: &PgPool,
    principal: &Principal,
    username: &str,
    reserved_alias: &str,
) -> Result<Option<Identity>, StatusCode> {
    if username == reserved_alias {
        return Ok(Some(principal.identity.clone()));
    }

    match find_by_username(pool, username).await {
        Ok(target) => Ok(target),
        Err(err) => {
            error!("Failed to resolve target user: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "All identities", body = [ProfileResponse]),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Requester lacks elevated capability"),
    ),
    tag = "users"
)]
pub async fn list_users(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool, &state).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    if let Decision::Deny(reason) = authorize(&principal, &Method::GET, None) {
        return (StatusCode::FORBIDDEN, reason.to_string()).into_response();
    }

    match list_identities(&pool).await {
        Ok(identities) => {
            let profiles: Vec<ProfileResponse> =
                identities.iter().map(ProfileResponse::from).collect();
            (StatusCode::OK, Json(profiles)).into_response()
        }
        Err(err) => {
            error!("Failed to list users: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/users/{username}",
    params(("username" = String, Path, description = "Username or reserved alias")),
    responses(
        (status = 200, description = "The identity's profile", body = ProfileResponse),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Policy denied the request"),
        (status = 404, description = "Unknown username"),
    ),
    tag = "users"
)]
pub async fn get_user(
    Path(username): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool, &state).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let target = match resolve_target(
        &pool,
        &principal,
        username.trim(),
        state.config().reserved_alias(),
    )
    .await
    {
        Ok(Some(target)) => target,
        Ok(None) => return (StatusCode::NOT_FOUND, "User not found".to_string()).into_response(),
        Err(status) => return status.into_response(),
    };

    if let Decision::Deny(reason) = authorize(&principal, &Method::GET, Some(&target)) {
        return (StatusCode::FORBIDDEN, reason.to_string()).into_response();
    }

    (StatusCode::OK, Json(ProfileResponse::from(&target))).into_response()
}

#[utoipa::path(
    patch,
    path = "/users/{username}",
    params(("username" = String, Path, description = "Username or reserved alias")),
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 400, description = "Invalid update payload"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 403, description = "Policy denied the request"),
        (status = 404, description = "Unknown username"),
    ),
    tag = "users"
)]
pub async fn patch_user(
    Path(username): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<ProfileUpdateRequest>>,
) -> impl IntoResponse {
    let principal = match require_auth(&headers, &pool, &state).await {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let target = match resolve_target(
        &pool,
        &principal,
        username.trim(),
        state.config().reserved_alias(),
    )
    .await
    {
        Ok(Some(target)) => target,
        Ok(None) => return (StatusCode::NOT_FOUND, "User not found".to_string()).into_response(),
        Err(status) => return status.into_response(),
    };

    if let Decision::Deny(reason) = authorize(&principal, &Method::PATCH, Some(&target)) {
        return (StatusCode::FORBIDDEN, reason.to_string()).into_response();
    }

    let request = payload.map(|Json(payload)| payload).unwrap_or_default();

    let email = match request.email.map(|value| normalize_email(&value)) {
        Some(email) if !valid_email(&email) => {
            return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
        }
        other => other,
    };

    // Only elevated requesters may touch the role; for everyone else the
    // field is read-only and silently dropped.
    let role = if principal.identity.role.is_elevated() {
        request.role
    } else {
        None
    };

    let changes = ProfileChanges {
        email,
        first_name: request.first_name,
        last_name: request.last_name,
        bio: request.bio,
        role,
    };

    match update_profile(&pool, target.id, &changes).await {
        Ok(ProfileOutcome::Updated(identity)) => {
            (StatusCode::OK, Json(ProfileResponse::from(&identity))).into_response()
        }
        Ok(ProfileOutcome::EmailTaken) => (
            StatusCode::BAD_REQUEST,
            "Email is already registered".to_string(),
        )
            .into_response(),
        Ok(ProfileOutcome::Missing) => {
            (StatusCode::NOT_FOUND, "User not found".to_string()).into_response()
        }
        Err(err) => {
            error!("Failed to update user profile: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
