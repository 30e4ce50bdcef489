//! Pool item entities.

pub mod allocated;
pub mod model;
pub mod stats;
pub mod status;

pub use allocated::AllocatedItem;
pub use model::{Item, ItemMetadata, NewItem};
pub use stats::PoolStats;
pub use status::ItemStatus;
