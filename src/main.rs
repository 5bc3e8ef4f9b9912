mod api;
mod catalog;
mod cli;
mod config;
mod db;
mod ledger;

use crate::catalog::Catalog;
use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::Database;
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_or_default_config()?;
            run_service(config).await
        }
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Config { command } => handle_config_command(command),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;

    println!("EcoLedger status");
    println!("- users: {}", database.count_users()?);
    println!("- habits: {}", database.count_habits()?);
    println!("- activity_logs: {}", database.count_logs()?);
    println!(
        "- last_logged_at: {}",
        database
            .latest_log_timestamp()?
            .map(|timestamp| timestamp.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    println!("- api_port: {}", config.api_port);

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    if config.catalog_path.exists() {
        match Catalog::load(&config.catalog_path) {
            Ok(catalog) => println!(
                "[OK] catalog valid: {} habits, {} badges",
                catalog.habits.len(),
                catalog.badges.len()
            ),
            Err(error) => {
                println!("[WARN] catalog check failed: {error}");
                issues.push("catalog invalid".to_string());
            }
        }
    } else {
        println!(
            "[WARN] catalog file missing: {}",
            config.catalog_path.display()
        );
        issues.push("catalog missing".to_string());
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;

    let catalog = Catalog::load(&config.catalog_path).with_context(|| {
        format!(
            "Failed to load habit/badge catalog: {}",
            config.catalog_path.display()
        )
    })?;

    let database = Database::open(&config.db_path)?;
    database.ensure_catalog(&catalog)?;
    drop(database);

    let shared_config = Arc::new(config);

    info!("EcoLedger service started");

    tokio::select! {
        api_result = api::run_server(Arc::clone(&shared_config)) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load()
        .with_context(|| "Config file not found. Run `ecoledger serve` once to create it.".to_string())
}
