//! Doctor command - validate configuration and show status

use anyhow::Result;
use postflight_adapters::store::SqliteStore;
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    database: CheckResult,
    auth: CheckResult,
    linkedin: CheckResult,
    x: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok".to_string(),
            message: message.into(),
        }
    }

    fn warn(message: impl Into<String>) -> Self {
        Self {
            status: "warn".to_string(),
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }

    fn is_error(&self) -> bool {
        self.status == "error"
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        database: CheckResult::error("Not checked"),
        auth: CheckResult::error("Not checked"),
        linkedin: CheckResult::error("Not checked"),
        x: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    // Check config
    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.database = check_database(config).await;
        report.auth = check_auth(config);
        report.linkedin = check_linkedin(config);
        report.x = check_x(config);
    }

    // Determine overall status
    let checks = [
        &report.config,
        &report.database,
        &report.auth,
        &report.linkedin,
        &report.x,
    ];

    let has_error = checks.iter().any(|c| c.is_error());
    let all_ok = checks.iter().all(|c| c.is_ok());

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    // Output report
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

async fn check_database(config: &AppConfig) -> CheckResult {
    let path = &config.general.state_db_path;
    match SqliteStore::new(path).await {
        Ok(_) => CheckResult::ok(format!("State database ready: {}", path.display())),
        Err(e) => CheckResult::error(format!("Failed to open state database: {}", e)),
    }
}

fn check_auth(config: &AppConfig) -> CheckResult {
    let env_var = &config.server.bearer_token_env;

    if env_var.is_empty() {
        return CheckResult::warn("Bearer auth disabled (no token env var configured)");
    }

    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => {
            CheckResult::ok(format!("Bearer token: {} (set)", env_var))
        }
        _ => CheckResult::warn(format!(
            "Bearer token: {} (not set); the server will run without auth",
            env_var
        )),
    }
}

fn check_linkedin(config: &AppConfig) -> CheckResult {
    if !config.linkedin.enabled {
        return CheckResult::ok("LinkedIn disabled");
    }

    let env_var = &config.linkedin.access_token_env;
    if env_var.is_empty() {
        return CheckResult::error("No LinkedIn access token env var configured");
    }

    let author = match &config.linkedin.author_urn {
        Some(urn) => format!("author: {}", urn),
        None => "author resolved from token".to_string(),
    };

    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => {
            CheckResult::ok(format!("Access token: {} (set), {}", env_var, author))
        }
        _ => CheckResult::warn(format!(
            "Access token: {} (not set), {}",
            env_var, author
        )),
    }
}

fn check_x(config: &AppConfig) -> CheckResult {
    if !config.x.enabled {
        return CheckResult::ok("X disabled");
    }

    let env_var = &config.x.access_token_env;
    if env_var.is_empty() {
        return CheckResult::error("No X access token env var configured");
    }

    match std::env::var(env_var) {
        Ok(val) if !val.is_empty() => {
            CheckResult::ok(format!("Access token: {} (set)", env_var))
        }
        _ => CheckResult::warn(format!("Access token: {} (not set)", env_var)),
    }
}

fn print_report(report: &DoctorReport) {
    println!("postflight Doctor Report");
    println!("========================");
    println!();

    print_check("Config", &report.config);
    print_check("Database", &report.database);
    print_check("Auth", &report.auth);
    print_check("LinkedIn", &report.linkedin);
    print_check("X", &report.x);

    println!();
    let symbol = match report.overall.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} Overall: {}", symbol, report.overall.to_uppercase());

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: postflight serve");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    let symbol = match result.status.as_str() {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    };
    println!("{} {}: {}", symbol, name, result.message);
}
