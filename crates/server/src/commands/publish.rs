//! Publish command - one-shot publish from the command line

use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use time::OffsetDateTime;

use postflight_domain::{NewStrategy, Platform, PublishOutcome, PublishRequest, validate_content};

use crate::args::PublishArgs;
use crate::config::AppConfig;

use super::wiring;

pub async fn execute(args: PublishArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;

    let platform: Platform = args
        .platform
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let dry_run = args.dry_run || config.general.dry_run;
    if !dry_run {
        let enabled = match platform {
            Platform::Linkedin => config.linkedin.enabled,
            Platform::Twitter => config.x.enabled,
        };
        if !enabled {
            anyhow::bail!(
                "Platform not enabled: {}. Enable it in config or pass --dry-run.",
                platform
            );
        }
    }

    let wired = wiring::build(&config, dry_run).await?;
    let user_id = args.user.unwrap_or(config.server.default_user_id);

    let (strategy_id, content) = match (args.strategy_id, args.content) {
        (Some(strategy_id), None) => {
            let strategy = wired
                .strategies
                .get(&strategy_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Strategy not found: {}", strategy_id))?;
            let content = strategy.content;
            (strategy_id, content)
        }
        (None, Some(content)) => {
            let strategy = wired
                .strategies
                .create(
                    NewStrategy {
                        content: content.clone(),
                        platform,
                        author_id: user_id.clone(),
                        title: args.title,
                    },
                    OffsetDateTime::now_utc(),
                )
                .await?;
            (strategy.id, content)
        }
        _ => anyhow::bail!("Exactly one of --strategy-id or --content is required"),
    };

    validate_content(platform, &content).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let outcome = wired
        .engine
        .execute(PublishRequest {
            strategy_id: strategy_id.clone(),
            platform,
            user_id,
            content,
            image_url: args.image_url,
            idempotency_key: None,
        })
        .await?;

    let failed = matches!(outcome, PublishOutcome::Failed { .. });

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome_json(&strategy_id, platform, &outcome))?);
    } else {
        print_outcome(&strategy_id, platform, &outcome);
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn outcome_json(strategy_id: &str, platform: Platform, outcome: &PublishOutcome) -> serde_json::Value {
    match outcome {
        PublishOutcome::Completed { external_id, url } => json!({
            "status": "completed",
            "strategyId": strategy_id,
            "platform": platform.as_str(),
            "externalId": external_id,
            "url": url,
        }),
        PublishOutcome::AlreadyPublished { external_id, url } => json!({
            "status": "already_published",
            "strategyId": strategy_id,
            "platform": platform.as_str(),
            "externalId": external_id,
            "url": url,
        }),
        PublishOutcome::InProgress => json!({
            "status": "in_progress",
            "strategyId": strategy_id,
            "platform": platform.as_str(),
        }),
        PublishOutcome::Failed { error } => json!({
            "status": "failed",
            "strategyId": strategy_id,
            "platform": platform.as_str(),
            "errorCode": error.code(),
            "error": error.to_string(),
        }),
    }
}

fn print_outcome(strategy_id: &str, platform: Platform, outcome: &PublishOutcome) {
    match outcome {
        PublishOutcome::Completed { external_id, url } => {
            println!("✓ Published {} to {}", strategy_id, platform);
            println!("  id:  {}", external_id);
            println!("  url: {}", url);
        }
        PublishOutcome::AlreadyPublished { external_id, url } => {
            println!("✓ Already published {} to {}", strategy_id, platform);
            println!("  id:  {}", external_id);
            if let Some(url) = url {
                println!("  url: {}", url);
            }
        }
        PublishOutcome::InProgress => {
            println!(
                "⚠ Another publish of {} to {} is in flight; retry shortly",
                strategy_id, platform
            );
        }
        PublishOutcome::Failed { error } => {
            println!("✗ Publish of {} to {} failed: {}", strategy_id, platform, error);
            if error.is_retryable() {
                println!("  This error is retryable; run the command again.");
            }
        }
    }
}
