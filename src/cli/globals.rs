use secrecy::SecretString;

#[derive(Clone)]
pub struct GlobalArgs {
    pub code_secret: SecretString,
    pub token_secret: SecretString,
    pub code_bucket_seconds: u64,
    pub code_max_age_buckets: u64,
    pub token_ttl_seconds: i64,
    pub reserved_alias: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(code_secret: SecretString, token_secret: SecretString) -> Self {
        Self {
            code_secret,
            token_secret,
            code_bucket_seconds: 86400,
            code_max_age_buckets: 1,
            token_ttl_seconds: 86400,
            reserved_alias: "me".to_string(),
        }
    }
}

impl std::fmt::Debug for GlobalArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalArgs")
            .field("code_secret", &"***")
            .field("token_secret", &"***")
            .field("code_bucket_seconds", &self.code_bucket_seconds)
            .field("code_max_age_buckets", &self.code_max_age_buckets)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .field("reserved_alias", &self.reserved_alias)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            SecretString::from("code".to_string()),
            SecretString::from("token".to_string()),
        );
        assert_eq!(args.code_bucket_seconds, 86400);
        assert_eq!(args.code_max_age_buckets, 1);
        assert_eq!(args.token_ttl_seconds, 86400);
        assert_eq!(args.reserved_alias, "me");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let args = GlobalArgs::new(
            SecretString::from("code".to_string()),
            SecretString::from("token".to_string()),
        );
        let debug = format!("{args:?}");
        assert!(!debug.contains("code\""));
        assert!(debug.contains("***"));
    }
}
