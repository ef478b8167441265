//! Authenticated principal extraction.
//!
//! Bearer token from the `Authorization` header, decoded and resolved to a
//! live identity row. Tokens for identities that no longer resolve are
//! treated like any other invalid token.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::policy::Requester;
use super::state::AuthState;
use super::storage::{find_by_id, Identity};

/// Authenticated caller context derived from the bearer token.
#[derive(Debug)]
pub struct Principal {
    pub identity: Identity,
}

impl Principal {
    /// The policy-facing view of this caller.
    #[must_use]
    pub fn requester(&self) -> Requester {
        Requester {
            id: self.identity.id,
            role: self.identity.role,
        }
    }
}

/// Resolve the bearer token into a principal, or return 401.
///
/// # Errors
///
/// `401` for missing/invalid/expired tokens and unresolvable identities,
/// `500` when the registry lookup itself fails.
pub async fn require_auth(
    headers: &HeaderMap,
    pool: &PgPool,
    state: &Arc<AuthState>,
) -> Result<Principal, StatusCode> {
    let Some(token) = extract_bearer_token(headers) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Ok(claims) = state.tokens().decode(&token) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let Ok(id) = Uuid::parse_str(&claims.sub) else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    match find_by_id(pool, id).await {
        Ok(Some(identity)) => Ok(Principal { identity }),
        Ok(None) => Err(StatusCode::UNAUTHORIZED),
        Err(err) => {
            error!("Failed to resolve principal: {err}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
