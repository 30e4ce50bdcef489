//! Pool statistics command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use indexpool_core::config::AppConfig;
use indexpool_core::error::AppError;
use indexpool_database::repositories::ItemRepository;
use indexpool_entity::item::PoolStats;

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Limit output to one category
    #[arg(long)]
    pub category: Option<String>,
}

/// Table row for pool statistics
#[derive(Debug, Serialize, Tabled)]
pub struct StatsRow {
    /// Category
    #[tabled(rename = "Category")]
    pub category: String,
    /// Total items
    #[tabled(rename = "Total")]
    pub total: i64,
    /// Available items
    #[tabled(rename = "Available")]
    pub available: i64,
    /// Allocated items
    #[tabled(rename = "Allocated")]
    pub allocated: i64,
    /// Allocated share
    #[tabled(rename = "Utilization")]
    pub utilization: String,
}

impl From<&PoolStats> for StatsRow {
    fn from(stats: &PoolStats) -> Self {
        Self {
            category: stats.category.clone(),
            total: stats.total,
            available: stats.available,
            allocated: stats.allocated,
            utilization: format!("{:.1}%", stats.utilization() * 100.0),
        }
    }
}

/// Execute the status command
pub async fn execute(
    args: &StatusArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let db = super::connect(config).await?;
    let repo = ItemRepository::new(db.pool().clone());

    let stats = repo.stats(args.category.as_deref()).await?;
    db.close().await;

    let rows: Vec<StatsRow> = stats.iter().map(StatsRow::from).collect();
    output::print_rows(&rows, &stats, format);
    Ok(())
}
