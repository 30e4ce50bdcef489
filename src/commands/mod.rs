//! CLI command definitions and dispatch.

pub mod allocate;
pub mod config;
pub mod migrate;
pub mod seed;
pub mod status;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use indexpool_core::config::AppConfig;
use indexpool_core::error::AppError;
use indexpool_database::DatabasePool;

/// IndexPool: allocate uniquely indexed items from shared pools
#[derive(Debug, Parser)]
#[command(name = "indexpool", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Database migration management
    Migrate(migrate::MigrateArgs),
    /// Create pool items with consecutive indices
    Seed(seed::SeedArgs),
    /// Allocate items to an owner
    Allocate(allocate::AllocateArgs),
    /// Show pool statistics
    Status(status::StatusArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::Migrate(args) => migrate::execute(args, &config).await,
            Commands::Seed(args) => seed::execute(args, &config, self.format).await,
            Commands::Allocate(args) => allocate::execute(args, &config, self.format).await,
            Commands::Status(args) => status::execute(args, &config, self.format).await,
            Commands::Config(args) => config::execute(args, &config, self.format),
        }
    }
}

/// Helper: create database pool from config
pub async fn connect(config: &AppConfig) -> Result<DatabasePool, AppError> {
    DatabasePool::connect(&config.database).await
}
