//! Convenience result type alias for IndexPool.

use crate::error::AppError;

/// A specialized `Result` type for IndexPool operations.
pub type AppResult<T> = Result<T, AppError>;
