//! Auth state and configuration.

use secrecy::SecretString;

use super::code::CodeGenerator;
use super::tokens::AccessTokenIssuer;

const DEFAULT_CODE_BUCKET_SECONDS: u64 = 86400;
const DEFAULT_CODE_MAX_AGE_BUCKETS: u64 = 1;
const DEFAULT_TOKEN_TTL_SECONDS: i64 = 86400;
const DEFAULT_RESERVED_ALIAS: &str = "me";

#[derive(Clone)]
pub struct AuthConfig {
    code_secret: SecretString,
    token_secret: SecretString,
    code_bucket_seconds: u64,
    code_max_age_buckets: u64,
    token_ttl_seconds: i64,
    reserved_alias: String,
}

impl AuthConfig {
    #[must_use]
    pub fn new(code_secret: SecretString, token_secret: SecretString) -> Self {
        Self {
            code_secret,
            token_secret,
            code_bucket_seconds: DEFAULT_CODE_BUCKET_SECONDS,
            code_max_age_buckets: DEFAULT_CODE_MAX_AGE_BUCKETS,
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            reserved_alias: DEFAULT_RESERVED_ALIAS.to_string(),
        }
    }

    #[must_use]
    pub fn with_code_bucket_seconds(mut self, seconds: u64) -> Self {
        self.code_bucket_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_code_max_age_buckets(mut self, buckets: u64) -> Self {
        self.code_max_age_buckets = buckets;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_reserved_alias(mut self, alias: String) -> Self {
        self.reserved_alias = alias;
        self
    }

    #[must_use]
    pub fn code_bucket_seconds(&self) -> u64 {
        self.code_bucket_seconds
    }

    #[must_use]
    pub fn code_max_age_buckets(&self) -> u64 {
        self.code_max_age_buckets
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn reserved_alias(&self) -> &str {
        &self.reserved_alias
    }
}

/// Shared per-process auth state: configuration plus the stateless code
/// generator and token issuer built from it.
pub struct AuthState {
    config: AuthConfig,
    codes: CodeGenerator,
    tokens: AccessTokenIssuer,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let codes = CodeGenerator::new(
            config.code_secret.clone(),
            config.code_bucket_seconds,
            config.code_max_age_buckets,
        );
        let tokens = AccessTokenIssuer::new(&config.token_secret, config.token_ttl_seconds);

        Self {
            config,
            codes,
            tokens,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn codes(&self) -> &CodeGenerator {
        &self.codes
    }

    #[must_use]
    pub fn tokens(&self) -> &AccessTokenIssuer {
        &self.tokens
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_configuration() {
        let config = AuthConfig::new(
            SecretString::from("code".to_string()),
            SecretString::from("token".to_string()),
        );
        assert_eq!(config.code_bucket_seconds(), 86400);
        assert_eq!(config.code_max_age_buckets(), 1);
        assert_eq!(config.token_ttl_seconds(), 86400);
        assert_eq!(config.reserved_alias(), "me");
    }

    #[test]
    fn builders_override_defaults() {
        let config = AuthConfig::new(
            SecretString::from("code".to_string()),
            SecretString::from("token".to_string()),
        )
        .with_code_bucket_seconds(3600)
        .with_code_max_age_buckets(2)
        .with_token_ttl_seconds(600)
        .with_reserved_alias("self".to_string());

        assert_eq!(config.code_bucket_seconds(), 3600);
        assert_eq!(config.code_max_age_buckets(), 2);
        assert_eq!(config.token_ttl_seconds(), 600);
        assert_eq!(config.reserved_alias(), "self");
    }
}
