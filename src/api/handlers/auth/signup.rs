//! Passwordless signup endpoint.
//!
//! Registers (or re-registers) an identity, derives a confirmation code from
//! its current state, and hands the code to the delivery collaborator. The
//! code travels only through that side channel; the HTTP response echoes the
//! identity's public fields and nothing else.

use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, Json,
};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

use crate::api::email::{EmailMessage, EmailSender};

use super::state::AuthState;
use super::storage::{find_username_by_email, upsert_identity, Identity, UpsertOutcome};
use super::types::{SignupRequest, SignupResponse};
use super::utils::{normalize_email, valid_email, valid_username};

/// Field-level validation failures, keyed by field name.
type FieldErrors = BTreeMap<&'static str, Vec<String>>;

/// Pure field checks; every failure is reported, none short-circuits.
fn validate_fields(username: &str, email: &str, reserved_alias: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if username == reserved_alias {
        errors
            .entry("username")
            .or_default()
            .push(format!("username `{reserved_alias}` is reserved"));
    } else if !valid_username(username) {
        errors
            .entry("username")
            .or_default()
            .push("invalid username".to_string());
    }

    if !valid_email(email) {
        errors
            .entry("email")
            .or_default()
            .push("invalid email".to_string());
    }

    errors
}

/// Hand the code to the delivery collaborator; failures are logged and never
/// surface to the caller once the identity row is durably written.
fn deliver_code(sender: &dyn EmailSender, identity: &Identity, code: &str) {
    let message = EmailMessage {
        to_email: identity.email.clone(),
        subject: "confirmation_code".to_string(),
        body: format!("{} your confirmation_code: {code}", identity.username),
    };

    if let Err(err) = sender.send(&message) {
        error!(
            username = %identity.username,
            "failed to deliver confirmation code: {err}"
        );
    }
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Identity registered, code sent out of band", body = SignupResponse),
        (status = 400, description = "Field-level validation errors"),
    ),
    tag = "auth"
)]
pub async fn signup(
    pool: Extension<PgPool>,
    state: Extension<Arc<AuthState>>,
    sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let username = request.username.trim().to_string();
    let email = normalize_email(&request.email);

    let mut errors = validate_fields(&username, &email, state.config().reserved_alias());

    // Independent of the field checks: the email must not belong to a
    // different identity. Same username + same email is a plain upsert.
    match find_username_by_email(&pool, &email).await {
        Ok(Some(owner)) if owner != username => {
            errors
                .entry("email")
                .or_default()
                .push(format!("email {email} is already registered"));
        }
        Ok(_) => {}
        Err(err) => {
            error!("Failed to check email ownership: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Signup failed".to_string(),
            )
                .into_response();
        }
    }

    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
    }

    let identity = match upsert_identity(&pool, &username, &email).await {
        Ok(UpsertOutcome::Saved(identity)) => identity,
        Ok(UpsertOutcome::EmailTaken) => {
            // Lost the race against a concurrent signup for the same email
            let mut errors = FieldErrors::new();
            errors
                .entry("email")
                .or_default()
                .push(format!("email {email} is already registered"));
            return (StatusCode::BAD_REQUEST, Json(errors)).into_response();
        }
        Err(err) => {
            error!("Failed to upsert identity: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Signup failed".to_string(),
            )
                .into_response();
        }
    };

    let code = match state.codes().issue(&identity) {
        Ok(code) => code,
        Err(err) => {
            error!("Failed to issue confirmation code: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Signup failed".to_string(),
            )
                .into_response();
        }
    };

    deliver_code(sender.as_ref(), &identity, &code);

    let response = SignupResponse {
        username: identity.username,
        email: identity.email,
    };
    (StatusCode::OK, Json(response)).into_response()
}
