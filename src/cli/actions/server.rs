use crate::api;
use crate::api::email::{EmailSender, LogEmailSender};
use crate::api::handlers::auth::state::{AuthConfig, AuthState};
use crate::cli::{actions::Action, globals::GlobalArgs};
use anyhow::{Context, Result};
use std::sync::Arc;
use url::Url;

/// Handle the server action
pub async fn handle(action: Action, globals: &GlobalArgs) -> Result<()> {
    match action {
        Action::Server { port, dsn } => {
            // Reject malformed connection strings before touching the pool
            Url::parse(&dsn).context("invalid database connection string")?;

            let config =
                AuthConfig::new(globals.code_secret.clone(), globals.token_secret.clone())
                    .with_code_bucket_seconds(globals.code_bucket_seconds)
                    .with_code_max_age_buckets(globals.code_max_age_buckets)
                    .with_token_ttl_seconds(globals.token_ttl_seconds)
                    .with_reserved_alias(globals.reserved_alias.clone());

            let state = Arc::new(AuthState::new(config));
            let sender: Arc<dyn EmailSender> = Arc::new(LogEmailSender);

            api::new(port, dsn, state, sender).await?;
        }
    }

    Ok(())
}
