//! Database helpers for the identity registry.
//!
//! The `users` row is the only shared mutable state this core touches. Both
//! writers here are single statements, so the database serializes them per
//! row; [`consume_fingerprint`] additionally carries its compare-and-clear
//! predicate in the statement itself.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::policy::Role;
use super::utils::is_unique_violation;

/// One identity record, as the registry stores it.
///
/// `fingerprint` reuses the password-hash slot of the original data model as
/// a plain state token; empty string means "no active fingerprint" and is a
/// valid state.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub fingerprint: String,
    pub role: Role,
    pub first_name: String,
    pub last_name: String,
    pub bio: String,
    pub last_login_at: Option<DateTime<Utc>>,
}

const IDENTITY_COLUMNS: &str = r"
    id, username, email, fingerprint, role,
    first_name, last_name, bio, last_login_at
";

fn identity_from_row(row: &PgRow) -> Result<Identity> {
    let role: String = row.get("role");
    let role = role.parse::<Role>().map_err(|err| anyhow!(err))?;

    Ok(Identity {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        fingerprint: row.get("fingerprint"),
        role,
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        bio: row.get("bio"),
        last_login_at: row.get("last_login_at"),
    })
}

/// Outcome when upserting an identity at signup.
#[derive(Debug)]
pub(crate) enum UpsertOutcome {
    Saved(Identity),
    EmailTaken,
}

/// Outcome for profile updates (self-service and administrative).
#[derive(Debug)]
pub(crate) enum ProfileOutcome {
    Updated(Identity),
    EmailTaken,
    Missing,
}

/// Allow-listed profile fields; `None` leaves the column untouched.
#[derive(Debug, Default)]
pub(crate) struct ProfileChanges {
    pub(crate) email: Option<String>,
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) bio: Option<String>,
    pub(crate) role: Option<Role>,
}

pub(crate) async fn find_by_username(pool: &PgPool, username: &str) -> Result<Option<Identity>> {
    let query = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE username = $1");
    let row = sqlx::query(&query)
        .bind(username)
        .fetch_optional(pool)
        .await
        .context("failed to lookup identity by username")?;

    row.as_ref().map(identity_from_row).transpose()
}

pub(crate) async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Identity>> {
    let query = format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = $1");
    let row = sqlx::query(&query)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to lookup identity by id")?;

    row.as_ref().map(identity_from_row).transpose()
}

/// Who currently owns an email address, if anyone.
pub(crate) async fn find_username_by_email(pool: &PgPool, email: &str) -> Result<Option<String>> {
    let query = "SELECT username FROM users WHERE email = $1";
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("failed to lookup identity by email")?;

    Ok(row.map(|row| row.get("username")))
}

/// Create or update the identity keyed by username.
///
/// Re-signup with the same username refreshes the email; a different owner of
/// the target email surfaces as [`UpsertOutcome::EmailTaken`] via the unique
/// constraint, closing the validate-then-write window.
pub(crate) async fn upsert_identity(
    pool: &PgPool,
    username: &str,
    email: &str,
) -> Result<UpsertOutcome> {
    let query = format!(
        r"
        INSERT INTO users (username, email)
        VALUES ($1, $2)
        ON CONFLICT (username) DO UPDATE SET email = EXCLUDED.email
        RETURNING {IDENTITY_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(username)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(UpsertOutcome::Saved(identity_from_row(&row)?)),
        Err(err) if is_unique_violation(&err) => Ok(UpsertOutcome::EmailTaken),
        Err(err) => Err(err).context("failed to upsert identity"),
    }
}

/// Consume the confirmation code the caller just verified.
///
/// Compare-and-clear: the row only updates if the fingerprint and login
/// timestamp still match the snapshot verification ran against. `None` means
/// a concurrent exchange won the race and this one must fail.
pub(crate) async fn consume_fingerprint(
    pool: &PgPool,
    identity: &Identity,
) -> Result<Option<Identity>> {
    let query = format!(
        r"
        UPDATE users
        SET fingerprint = '', last_login_at = NOW()
        WHERE id = $1
          AND fingerprint = $2
          AND last_login_at IS NOT DISTINCT FROM $3
        RETURNING {IDENTITY_COLUMNS}
    "
    );
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query.as_str()
    );
    let row = sqlx::query(&query)
        .bind(identity.id)
        .bind(&identity.fingerprint)
        .bind(identity.last_login_at)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume confirmation fingerprint")?;

    row.as_ref().map(identity_from_row).transpose()
}

/// Apply allow-listed profile changes.
///
/// `role` only lands here for elevated callers; handlers drop it for
/// self-edits before building [`ProfileChanges`].
pub(crate) async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    changes: &ProfileChanges,
) -> Result<ProfileOutcome> {
    let query = format!(
        r"
        UPDATE users
        SET
            email = COALESCE($1, email),
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            bio = COALESCE($4, bio),
            role = COALESCE($5, role)
        WHERE id = $6
        RETURNING {IDENTITY_COLUMNS}
    "
    );
    let row = sqlx::query(&query)
        .bind(changes.email.as_deref())
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .bind(changes.bio.as_deref())
        .bind(changes.role.map(Role::as_str))
        .bind(id)
        .fetch_optional(pool)
        .await;

    match row {
        Ok(Some(row)) => Ok(ProfileOutcome::Updated(identity_from_row(&row)?)),
        Ok(None) => Ok(ProfileOutcome::Missing),
        Err(err) if is_unique_violation(&err) => Ok(ProfileOutcome::EmailTaken),
        Err(err) => Err(err).context("failed to update profile"),
    }
}

pub(crate) async fn list_identities(pool: &PgPool) -> Result<Vec<Identity>> {
    let query = format!("SELECT {IDENTITY_COLUMNS} FROM users ORDER BY username");
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .context("failed to list identities")?;

    rows.iter().map(identity_from_row).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Bare identity for unit tests that never touch the database.
    pub(crate) fn identity(username: &str, fingerprint: &str) -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            fingerprint: fingerprint.to_string(),
            role: Role::User,
            first_name: String::new(),
            last_name: String::new(),
            bio: String::new(),
            last_login_at: None,
        }
    }
}
