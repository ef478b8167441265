//! Access token minting and verification.
//!
//! Tokens are stateless HS256 JWTs: identity id, issue time, expiry. Any
//! handler can verify one with the signing secret alone; there is no
//! server-side session record and no refresh token.

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::storage::Identity;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id as a UUID string
    pub sub: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expiration (unix seconds)
    pub exp: i64,
    pub token_type: String,
}

pub struct AccessTokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_seconds: i64,
}

impl AccessTokenIssuer {
    /// The signing secret is distinct in purpose from the confirmation code
    /// secret; both are configured separately.
    #[must_use]
    pub fn new(secret: &SecretString, ttl_seconds: i64) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
            ttl_seconds,
        }
    }

    /// Mint a bearer token for the identity.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn mint(&self, identity: &Identity) -> Result<String> {
        self.mint_at(identity, Utc::now().timestamp())
    }

    fn mint_at(&self, identity: &Identity, issued_at: i64) -> Result<String> {
        let claims = Claims {
            sub: identity.id.to_string(),
            iat: issued_at,
            exp: issued_at + self.ttl_seconds,
            token_type: "access".to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .context("failed to sign access token")
    }

    /// Verify signature and expiry, returning the claims.
    ///
    /// # Errors
    ///
    /// Returns an error for tampered, mis-signed, or expired tokens.
    pub fn decode(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("invalid access token")?;

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::super::storage::test_support::identity;
    use super::*;
    use anyhow::Result;

    fn issuer() -> AccessTokenIssuer {
        AccessTokenIssuer::new(&SecretString::from("token-secret".to_string()), 3600)
    }

    #[test]
    fn minted_token_decodes_to_the_identity() -> Result<()> {
        let issuer = issuer();
        let alice = identity("alice", "");

        let token = issuer.mint(&alice)?;
        let claims = issuer.decode(&token)?;

        assert_eq!(claims.sub, alice.id.to_string());
        assert_eq!(claims.token_type, "access");
        assert_eq!(claims.exp - claims.iat, 3600);
        Ok(())
    }

    #[test]
    fn expired_token_is_rejected() -> Result<()> {
        let issuer = issuer();
        let alice = identity("alice", "");

        let token = issuer.mint_at(&alice, Utc::now().timestamp() - 7200)?;
        assert!(issuer.decode(&token).is_err());
        Ok(())
    }

    #[test]
    fn tampered_token_is_rejected() -> Result<()> {
        let issuer = issuer();
        let alice = identity("alice", "");

        let mut token = issuer.mint(&alice)?;
        token.push('x');
        assert!(issuer.decode(&token).is_err());
        Ok(())
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() -> Result<()> {
        let alice = identity("alice", "");

        let other = AccessTokenIssuer::new(&SecretString::from("other".to_string()), 3600);
        let token = other.mint(&alice)?;

        assert!(issuer().decode(&token).is_err());
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(issuer().decode("not-a-jwt").is_err());
    }
}
