//! Serve command - run the HTTP publish service

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::args::ServeArgs;
use crate::config::AppConfig;
use crate::http::{AppState, AuthConfig, router};

use super::wiring;

pub async fn execute(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let wired = wiring::build(&config, config.general.dry_run).await?;

    let state = AppState {
        engine: wired.engine,
        strategies: wired.strategies,
        ledger: wired.ledger,
        attempts: wired.attempts,
        auth: load_auth(&config),
        default_user_id: config.server.default_user_id.clone(),
        linkedin_enabled: config.linkedin.enabled || config.general.dry_run,
        x_enabled: config.x.enabled || config.general.dry_run,
    };

    let app = router(state);

    let host = args.host.unwrap_or(config.server.host);
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!(
        addr = %addr,
        dry_run = config.general.dry_run,
        linkedin = config.linkedin.enabled,
        x = config.x.enabled,
        "postflight listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}

fn load_auth(config: &AppConfig) -> AuthConfig {
    let env_var = &config.server.bearer_token_env;
    if env_var.is_empty() {
        warn!("Bearer auth disabled: no token env var configured");
        return AuthConfig::default();
    }

    match std::env::var(env_var) {
        Ok(value) if !value.is_empty() => AuthConfig {
            bearer_token: Some(SecretString::new(value.into())),
        },
        _ => {
            warn!(env_var = %env_var, "Bearer auth disabled: token env var not set");
            AuthConfig::default()
        }
    }
}
