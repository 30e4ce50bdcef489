//! # indexpool-core
//!
//! Core crate for IndexPool. Contains configuration schemas, typed
//! identifiers, allocation filter types, and the unified error system.
//!
//! This crate has **no** internal dependencies on other IndexPool crates.

pub mod config;
pub mod error;
pub mod result;
pub mod types;

pub use error::{AppError, ErrorKind};
pub use result::AppResult;
