//! # Recenzo (Identity & Access for the review platform)
//!
//! `recenzo` is the identity and access core of a content-review platform
//! (categories, genres, titled works, reviews, comments). It owns three
//! things and deliberately nothing else:
//!
//! ## Passwordless signup
//!
//! `POST /auth/signup` registers (or re-registers) an identity by username
//! and email, derives a **confirmation code** from a snapshot of the
//! identity's mutable state plus a coarse time bucket, and hands the code to
//! an out-of-band delivery collaborator. The code is never stored and never
//! returned in the HTTP response.
//!
//! ## Code exchange
//!
//! `POST /auth/token` verifies a presented code against the identity's
//! *current* state and, in a single compare-and-clear statement, consumes it:
//! the fingerprint is cleared and the login timestamp stamped, so every
//! previously issued code stops verifying the instant one is redeemed. At
//! most one concurrent exchange can win. The winner receives a short-lived
//! signed bearer token, verifiable without any server-side session record.
//!
//! ## Authorization policy
//!
//! A single pure decision function gates every mutating operation across the
//! platform's resource kinds: catalog resources (categories, genres, titles)
//! are admin-only, reviews and comments are owner-or-staff, and user
//! profiles are self-or-admin with the `role` field read-only for
//! self-edits. Reads of content resources stay open to everyone.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
