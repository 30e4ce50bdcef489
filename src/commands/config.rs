//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use indexpool_core::config::AppConfig;
use indexpool_core::error::AppError;
use indexpool_database::connection::mask_password;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
}

/// Execute config commands
pub fn execute(args: &ConfigArgs, config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => show(config, format),
    }
    Ok(())
}

fn show(config: &AppConfig, format: OutputFormat) {
    let masked = masked(config);
    if format == OutputFormat::Json {
        output::print_json(&masked);
        return;
    }

    let db = &masked.database;
    let alloc = &masked.allocation;
    println!("[database]");
    output::print_kv("url", &db.url);
    output::print_kv("max_connections", &db.max_connections.to_string());
    output::print_kv("min_connections", &db.min_connections.to_string());
    output::print_kv("connect_timeout_seconds", &db.connect_timeout_seconds.to_string());
    output::print_kv("idle_timeout_seconds", &db.idle_timeout_seconds.to_string());
    output::print_kv("isolation_level", &db.isolation_level.to_string());
    println!("[allocation]");
    output::print_kv("max_retries", &alloc.max_retries.to_string());
    output::print_kv("base_backoff_ms", &alloc.base_backoff_ms.to_string());
    output::print_kv("max_backoff_ms", &alloc.max_backoff_ms.to_string());
    output::print_kv("max_quantity", &alloc.max_quantity.to_string());
    output::print_kv(
        "attempt_timeout_ms",
        &alloc
            .attempt_timeout_ms
            .map_or_else(|| "none".to_string(), |ms| ms.to_string()),
    );
    println!("[logging]");
    output::print_kv("level", &masked.logging.level);
    output::print_kv("format", &masked.logging.format);
}

/// A copy of `config` that is safe to print.
fn masked(config: &AppConfig) -> AppConfig {
    let mut masked = config.clone();
    masked.database.url = mask_password(&config.database.url);
    masked
}
