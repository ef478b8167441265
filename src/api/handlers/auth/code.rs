//! Confirmation code derivation and verification.
//!
//! A code is a pure function of the identity snapshot and a coarse time
//! bucket; nothing is ever stored server-side. Consuming a code mutates the
//! state it was derived from (fingerprint cleared, login time stamped), so
//! every previously issued code stops verifying the moment one is redeemed.
//!
//! Encoding: `{bucket:x}-{hex(truncated MAC)}`. The code carries no identity
//! reference; callers resolve the claimed identity by username first.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;

use super::storage::Identity;

type HmacSha256 = Hmac<Sha256>;

/// Salt label separating this purpose from other uses of the server secret.
const KEY_SALT: &str = "recenzo.auth.confirmation-code";

/// MAC bytes kept in the compact encoding.
const DIGEST_BYTES: usize = 16;

pub struct CodeGenerator {
    secret: SecretString,
    bucket_seconds: u64,
    max_age_buckets: u64,
}

impl CodeGenerator {
    #[must_use]
    pub fn new(secret: SecretString, bucket_seconds: u64, max_age_buckets: u64) -> Self {
        Self {
            secret,
            bucket_seconds: bucket_seconds.max(1),
            max_age_buckets,
        }
    }

    /// Derive a code for the identity's current state and the current bucket.
    ///
    /// A blank fingerprint is a legitimate, distinct input: freshly created
    /// identities receive valid codes too.
    ///
    /// # Errors
    ///
    /// Returns an error if the system clock is unusable or the MAC cannot be
    /// keyed.
    pub fn issue(&self, identity: &Identity) -> Result<String> {
        self.issue_at(identity, self.current_bucket()?)
    }

    fn issue_at(&self, identity: &Identity, bucket: u64) -> Result<String> {
        let digest = self.digest(identity, bucket)?;
        Ok(format!("{bucket:x}-{}", hex::encode(digest)))
    }

    /// Check a presented code against the identity's *current* state.
    ///
    /// Fails closed: malformed input, future buckets, stale buckets and
    /// digest mismatches all return `false`, indistinguishably.
    #[must_use]
    pub fn verify(&self, identity: &Identity, code: &str) -> bool {
        self.current_bucket()
            .is_ok_and(|now| self.verify_at(identity, code, now))
    }

    fn verify_at(&self, identity: &Identity, code: &str, current_bucket: u64) -> bool {
        let Some((bucket_part, digest_part)) = code.split_once('-') else {
            return false;
        };
        let Ok(bucket) = u64::from_str_radix(bucket_part, 16) else {
            return false;
        };
        let Ok(presented) = hex::decode(digest_part) else {
            return false;
        };

        // Monotonic elapsed-bucket check; codes from future buckets are as
        // invalid as expired ones.
        let Some(elapsed) = current_bucket.checked_sub(bucket) else {
            return false;
        };
        if elapsed > self.max_age_buckets {
            return false;
        }

        let Ok(expected) = self.digest(identity, bucket) else {
            return false;
        };

        bool::from(expected.as_slice().ct_eq(presented.as_slice()))
    }

    /// Keyed MAC over the identity snapshot and the bucket, truncated.
    fn digest(&self, identity: &Identity, bucket: u64) -> Result<Vec<u8>> {
        // Whole seconds, timezone dropped; absent timestamp is the empty
        // string, distinct from any real one.
        let login_timestamp = identity
            .last_login_at
            .map_or_else(String::new, |ts| ts.timestamp().to_string());

        let value = format!(
            "{}{}{}{}",
            identity.id, identity.fingerprint, login_timestamp, bucket
        );

        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .context("failed to key confirmation code MAC")?;
        mac.update(KEY_SALT.as_bytes());
        mac.update(value.as_bytes());

        Ok(mac.finalize().into_bytes()[..DIGEST_BYTES].to_vec())
    }

    fn current_bucket(&self) -> Result<u64> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("system clock is before the unix epoch")?;
        Ok(now.as_secs() / self.bucket_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::super::storage::test_support::identity;
    use super::*;
    use anyhow::Result;
    use chrono::{TimeZone, Utc};

    fn generator() -> CodeGenerator {
        CodeGenerator::new(SecretString::from("test-secret".to_string()), 86400, 1)
    }

    #[test]
    fn issued_code_verifies_immediately() -> Result<()> {
        let generator = generator();
        let alice = identity("alice", "fingerprint");

        let code = generator.issue(&alice)?;
        assert!(generator.verify(&alice, &code));
        Ok(())
    }

    #[test]
    fn blank_fingerprint_still_issues_a_valid_code() -> Result<()> {
        let generator = generator();
        let fresh = identity("fresh", "");

        let code = generator.issue(&fresh)?;
        assert!(generator.verify(&fresh, &code));
        Ok(())
    }

    #[test]
    fn code_is_bound_to_the_identity_state() -> Result<()> {
        let generator = generator();
        let mut alice = identity("alice", "fingerprint");

        let code = generator.issue(&alice)?;

        // Consuming the code clears the fingerprint and stamps the login
        // time; either change alone must invalidate it.
        alice.fingerprint = String::new();
        assert!(!generator.verify(&alice, &code));

        alice.fingerprint = "fingerprint".to_string();
        alice.last_login_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        assert!(!generator.verify(&alice, &code));
        Ok(())
    }

    #[test]
    fn codes_differ_between_identities() -> Result<()> {
        let generator = generator();
        let alice = identity("alice", "fingerprint");
        let bob = identity("bob", "fingerprint");

        let code = generator.issue_at(&alice, 100)?;
        assert!(!generator.verify_at(&bob, &code, 100));
        Ok(())
    }

    #[test]
    fn code_expires_after_max_age_buckets() -> Result<()> {
        let generator = generator();
        let alice = identity("alice", "fingerprint");

        let code = generator.issue_at(&alice, 100)?;
        // Valid for the remainder of its bucket and the configured window
        assert!(generator.verify_at(&alice, &code, 100));
        assert!(generator.verify_at(&alice, &code, 101));
        // One bucket past the window
        assert!(!generator.verify_at(&alice, &code, 102));
        Ok(())
    }

    #[test]
    fn future_buckets_are_rejected() -> Result<()> {
        let generator = generator();
        let alice = identity("alice", "fingerprint");

        let code = generator.issue_at(&alice, 100)?;
        assert!(!generator.verify_at(&alice, &code, 99));
        Ok(())
    }

    #[test]
    fn malformed_codes_fail_closed() {
        let generator = generator();
        let alice = identity("alice", "fingerprint");

        for code in ["", "-", "no-dash-digest", "zz-00", "64", "64-", "64-zz"] {
            assert!(!generator.verify_at(&alice, code, 100), "code: {code:?}");
        }
    }

    #[test]
    fn truncated_last_login_participates_in_derivation() -> Result<()> {
        let generator = generator();
        let mut alice = identity("alice", "fingerprint");
        alice.last_login_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let code = generator.issue_at(&alice, 100)?;

        // Sub-second drift is truncated away and must not invalidate
        alice.last_login_at = alice
            .last_login_at
            .map(|ts| ts + chrono::Duration::milliseconds(250));
        assert!(generator.verify_at(&alice, &code, 100));

        // A whole-second change does invalidate
        alice.last_login_at = alice.last_login_at.map(|ts| ts + chrono::Duration::seconds(1));
        assert!(!generator.verify_at(&alice, &code, 100));
        Ok(())
    }

    #[test]
    fn wrong_secret_never_verifies() -> Result<()> {
        let issuing = generator();
        let other = CodeGenerator::new(SecretString::from("other-secret".to_string()), 86400, 1);
        let alice = identity("alice", "fingerprint");

        let code = issuing.issue_at(&alice, 100)?;
        assert!(!other.verify_at(&alice, &code, 100));
        Ok(())
    }
}
