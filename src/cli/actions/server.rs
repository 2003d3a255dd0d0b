use crate::api;
use crate::api::handlers::auth::AuthConfig;
use crate::cli::actions::Action;
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Server {
            port,
            dsn,
            environment,
            envelope_key,
            token_secret,
            token_ttl_minutes,
            frontend_url,
        } => {
            let config = AuthConfig::new(environment, envelope_key, token_secret, frontend_url)
                .with_token_ttl_minutes(token_ttl_minutes);

            api::new(port, dsn, config).await?;
        }
    }

    Ok(())
}
