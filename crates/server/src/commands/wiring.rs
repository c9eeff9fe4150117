//! Shared wiring: store, adapters, and engine construction from config

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use postflight_adapters::linkedin::LinkedInPublisher;
use postflight_adapters::store::SqliteStore;
use postflight_adapters::stub::StubPublisher;
use postflight_adapters::tokens::{EnvTokenProvider, StaticTokenProvider};
use postflight_adapters::x_api::XPublisher;
use postflight_domain::usecases::{PublishEngine, PublishEngineConfig, PublisherSet};
use postflight_domain::{
    AccessTokenProvider, AttemptLog, Clock, Platform, PublicationLedger, StrategyStore,
    SystemClock,
};

use crate::config::AppConfig;
use crate::http::DynPublishEngine;

/// Everything a command needs to run publishes against the store
pub struct Wired {
    pub engine: DynPublishEngine,
    pub ledger: Arc<dyn PublicationLedger>,
    pub attempts: Arc<dyn AttemptLog>,
    pub strategies: Arc<dyn StrategyStore>,
}

pub async fn build(config: &AppConfig, dry_run: bool) -> Result<Wired> {
    let store = Arc::new(
        SqliteStore::new(&config.general.state_db_path)
            .await
            .context("Failed to open state database")?,
    );

    let ledger: Arc<dyn PublicationLedger> = store.clone();
    let attempts: Arc<dyn AttemptLog> = store.clone();
    let strategies: Arc<dyn StrategyStore> = store;

    // Stub publishers never use the token, but the engine still resolves
    // one, so dry runs must not depend on real credentials
    let tokens: Arc<dyn AccessTokenProvider> = if dry_run {
        Arc::new(
            StaticTokenProvider::new()
                .with_token(Platform::Linkedin, "dry-run")
                .with_token(Platform::Twitter, "dry-run"),
        )
    } else {
        Arc::new(
            EnvTokenProvider::new()
                .with_env_var(Platform::Linkedin, &config.linkedin.access_token_env)
                .with_env_var(Platform::Twitter, &config.x.access_token_env),
        )
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let publishers = build_publishers(config, dry_run)?;

    let engine = PublishEngine::new(
        ledger.clone(),
        attempts.clone(),
        strategies.clone(),
        tokens,
        clock,
        publishers,
        PublishEngineConfig {
            adapter_timeout: Duration::from_secs(config.general.adapter_timeout_secs),
            in_progress_lease: Duration::from_secs(config.general.in_progress_lease_secs),
        },
    );

    Ok(Wired {
        engine,
        ledger,
        attempts,
        strategies,
    })
}

fn build_publishers(config: &AppConfig, dry_run: bool) -> Result<PublisherSet> {
    if dry_run {
        return Ok(PublisherSet::new(
            Arc::new(StubPublisher::new(Platform::Linkedin)),
            Arc::new(StubPublisher::new(Platform::Twitter)),
        ));
    }

    let mut linkedin = LinkedInPublisher::new(config.linkedin.author_urn.clone())?;
    if let Some(base_url) = &config.linkedin.api_base_url {
        linkedin = linkedin.with_base_url(base_url);
    }

    let mut x = XPublisher::new()?;
    if let Some(base_url) = &config.x.api_base_url {
        x = x.with_base_url(base_url);
    }

    Ok(PublisherSet::new(Arc::new(linkedin), Arc::new(x)))
}
