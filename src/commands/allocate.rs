//! One-shot allocation command.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::output::{self, OutputFormat};
use indexpool_allocator::store::PgItemStore;
use indexpool_allocator::{
    AllocationEngine, AllocationOutcome, AllocationRequest, CallContext, Session,
};
use indexpool_core::config::AppConfig;
use indexpool_core::error::AppError;
use indexpool_core::types::{AllocationFilters, OwnerId};
use indexpool_entity::item::{AllocatedItem, ItemMetadata};

/// Arguments for the allocate command
#[derive(Debug, Args)]
pub struct AllocateArgs {
    /// Category to allocate from
    #[arg(long)]
    pub category: String,
    /// Number of items wanted
    #[arg(long)]
    pub quantity: u32,
    /// Owner the items are allocated to
    #[arg(long)]
    pub owner: String,
    /// Only items whose `deliveryDate` metadata equals this value
    #[arg(long)]
    pub delivery_date: Option<String>,
    /// Only items whose `dayOfWeek` metadata equals this value
    #[arg(long)]
    pub day_of_week: Option<String>,
    /// Abort the whole call after this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

/// Table row for an allocated item
#[derive(Debug, Serialize, Tabled)]
pub struct AllocatedRow {
    /// Item ID
    #[tabled(rename = "Item ID")]
    pub item_id: String,
    /// Index
    #[tabled(rename = "Index")]
    pub index: i64,
    /// Metadata
    #[tabled(rename = "Metadata")]
    pub metadata: String,
}

impl From<&AllocatedItem> for AllocatedRow {
    fn from(item: &AllocatedItem) -> Self {
        Self {
            item_id: item.item_id.to_string(),
            index: item.index,
            metadata: format_metadata(&item.metadata),
        }
    }
}

/// Execute the allocate command
pub async fn execute(
    args: &AllocateArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let request = build_request(args)?;

    let db = super::connect(config).await?;
    let store = PgItemStore::new(db.pool().clone(), config.database.isolation_level);
    let engine = AllocationEngine::from_config(Arc::new(store), &config.allocation);

    let ctx = build_context(args.timeout_ms);
    let token = ctx.cancellation_token().clone();
    let interrupt = tokio::spawn(cancel_on_ctrl_c(token));

    let result = engine.allocate(&request, Session::engine(), &ctx).await;
    interrupt.abort();
    db.close().await;

    let outcome = result?;
    report(&request, &outcome, format);
    Ok(())
}

fn build_request(args: &AllocateArgs) -> Result<AllocationRequest, AppError> {
    let owner = OwnerId::parse(&args.owner)?;

    let mut filters = AllocationFilters::new();
    if let Some(date) = &args.delivery_date {
        filters = filters.delivery_date(date);
    }
    if let Some(day) = &args.day_of_week {
        filters = filters.day_of_week(day);
    }

    Ok(AllocationRequest::new(args.category.trim(), args.quantity, owner).with_filters(filters))
}

fn build_context(timeout_ms: Option<u64>) -> CallContext {
    let ctx = CallContext::new();
    match timeout_ms {
        Some(ms) => ctx.with_timeout(Duration::from_millis(ms)),
        None => ctx,
    }
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupt received, cancelling allocation");
        token.cancel();
    }
}

fn report(request: &AllocationRequest, outcome: &AllocationOutcome, format: OutputFormat) {
    if format == OutputFormat::Json {
        output::print_json(outcome);
        return;
    }

    match outcome {
        AllocationOutcome::Allocated { items } => {
            let rows: Vec<AllocatedRow> = items.iter().map(AllocatedRow::from).collect();
            output::print_rows(&rows, items, format);
            if outcome.is_fulfilled(request.quantity) {
                output::print_success(&format!(
                    "Allocated {} item(s) to '{}'",
                    items.len(),
                    request.owner
                ));
            } else {
                output::print_warning(&format!(
                    "Pool ran short: allocated {} of {} requested item(s) to '{}'",
                    items.len(),
                    request.quantity,
                    request.owner
                ));
            }
        }
        AllocationOutcome::Exhausted => {
            output::print_warning(&format!(
                "No available items in '{}' match the request",
                request.category
            ));
        }
        AllocationOutcome::Conflict { requested, claimed } => {
            output::print_warning(&format!(
                "Conflict: claimed {claimed} of {requested} candidate(s) before a concurrent \
                 allocation won; nothing was allocated, try again"
            ));
        }
    }
}

/// Render metadata as `key=value` pairs. Strings print unquoted, other
/// values as JSON.
pub fn format_metadata(metadata: &ItemMetadata) -> String {
    metadata
        .as_map()
        .iter()
        .map(|(k, v)| match v.as_str() {
            Some(s) => format!("{k}={s}"),
            None => format!("{k}={v}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
