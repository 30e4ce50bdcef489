//! # indexpool-database
//!
//! PostgreSQL connection management, migrations, and the pool item
//! repository used for seeding and reporting. Allocation itself runs
//! through `indexpool_allocator::store::PgItemStore`.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
