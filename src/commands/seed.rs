//! Pool seeding command.

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use indexpool_core::config::AppConfig;
use indexpool_core::error::AppError;
use indexpool_database::repositories::ItemRepository;
use indexpool_entity::item::{Item, ItemMetadata, NewItem};

/// Arguments for the seed command
#[derive(Debug, Args)]
pub struct SeedArgs {
    /// Category to seed
    #[arg(long)]
    pub category: String,
    /// Number of items to create
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100_000))]
    pub count: u32,
    /// First index (defaults to one past the highest existing index)
    #[arg(long)]
    pub start: Option<i64>,
    /// Metadata attached to every item, e.g. `--meta deliveryDate=2024-05-01`
    #[arg(long = "meta", value_parser = parse_key_value)]
    pub meta: Vec<(String, String)>,
}

/// Table row for a seeded item
#[derive(Debug, Serialize, Tabled)]
pub struct SeededRow {
    /// Item ID
    #[tabled(rename = "ID")]
    pub id: String,
    /// Category
    #[tabled(rename = "Category")]
    pub category: String,
    /// Index
    #[tabled(rename = "Index")]
    pub index: i64,
    /// Metadata
    #[tabled(rename = "Metadata")]
    pub metadata: String,
}

impl From<&Item> for SeededRow {
    fn from(item: &Item) -> Self {
        Self {
            id: item.id.to_string(),
            category: item.category.clone(),
            index: item.index,
            metadata: super::allocate::format_metadata(&item.metadata),
        }
    }
}

/// Execute the seed command
pub async fn execute(
    args: &SeedArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let category = args.category.trim();
    if category.is_empty() {
        return Err(AppError::invalid_argument("Category must not be blank"));
    }

    let db = super::connect(config).await?;
    let repo = ItemRepository::new(db.pool().clone());

    let start = match args.start {
        Some(start) => start,
        None => repo.next_index(category).await?,
    };
    let metadata: ItemMetadata = args.meta.iter().cloned().collect();
    let items = build_items(category, start, args.count, &metadata)?;

    let created = repo.seed(&items).await?;
    db.close().await;

    let rows: Vec<SeededRow> = created.iter().map(SeededRow::from).collect();
    output::print_rows(&rows, &created, format);
    if format == OutputFormat::Table {
        output::print_success(&format!(
            "Seeded {} item(s) in '{}'",
            created.len(),
            category
        ));
    }
    Ok(())
}

/// `count` items with consecutive indices starting at `start`.
fn build_items(
    category: &str,
    start: i64,
    count: u32,
    metadata: &ItemMetadata,
) -> Result<Vec<NewItem>, AppError> {
    let last = start
        .checked_add(i64::from(count) - 1)
        .ok_or_else(|| AppError::invalid_argument("Index range overflows"))?;

    Ok((start..=last)
        .map(|index| NewItem::new(category, index).with_metadata(metadata.clone()))
        .collect())
}

/// Parse a `key=value` pair.
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return Err(format!("key and value must not be blank in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
