//! # Promptvault
//!
//! A personal prompt library with engagement-based ranking and full-text search.
//!
//! Promptvault stores prompt templates per owner and decides, for every list or
//! search request, which prompts to return and in what order. Ranking combines
//! usage frequency, recency of use, favorites, and pins; search runs against an
//! FTS5 index and is re-ranked in-process with the same engagement signals.
//!
//! ## Architecture
//!
//! - Typed document models with an explicit DTO boundary (`models`)
//! - Input validation with fixed limits shared by every call site (`validate`)
//! - A pure, deterministic ranking engine (`ranking`)
//! - A query planner that picks the storage access path and drives the
//!   over-fetch/re-rank compensation for tag-filtered search (`query`)
//! - A denormalized-tag synchronizer with race-safe tag creation (`storage::tags`)
//! - A per-table, per-operation authorization guard (`auth`)
//!
//! ## Example
//!
//! ```rust,ignore
//! use promptvault::{CallerContext, PromptService, SearchRequest};
//!
//! let service = PromptService::in_memory()?;
//! let ctx = CallerContext::new("user-1");
//! let hits = service.search(&ctx, &SearchRequest::new("sql migration"))?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive
// dependencies) and cannot be moved to function level.
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod auth;
pub mod cli;
pub mod config;
pub mod models;
pub mod query;
pub mod ranking;
pub mod services;
pub mod storage;
pub mod validate;

// Re-exports for convenience
pub use auth::{AccessRules, CallerContext, Operation};
pub use config::{RankingConfig, VaultConfig};
pub use models::{ParameterKind, Prompt, PromptDto, PromptInput, PromptParameter, Tag};
pub use query::{ListRequest, SearchRequest};
pub use ranking::{RankMode, rank};
pub use services::PromptService;
pub use storage::{SqlitePromptStore, TagStrategy};

/// Error type for promptvault operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Validation` | Malformed/oversized/missing input; always caller-fixable |
/// | `Conflict` | Duplicate slug within a batch or against existing data |
/// | `Unauthorized` | The ownership predicate failed for a table+operation |
/// | `Storage` | SQLite operations fail, config files cannot be parsed |
///
/// "Not found" is deliberately not an error variant: operations that target a
/// nonexistent owner-scoped document return `Option`/`bool` results so callers
/// can tell "nothing to do" from a hard failure.
#[derive(Debug, ThisError)]
pub enum Error {
    /// Input failed validation.
    ///
    /// Raised when:
    /// - A required text field is empty after trimming
    /// - A field exceeds its fixed length bound
    /// - A prompt carries too many tags
    /// - A slug or tag name violates the restricted charset
    #[error("validation failed: {0}")]
    Validation(String),

    /// A uniqueness constraint would be violated.
    ///
    /// Raised when:
    /// - Two prompts in the same batch share a slug
    /// - A slug already exists for the owner
    ///
    /// Never retried automatically; the caller must choose a different
    /// identifier.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The authorization guard denied an operation.
    ///
    /// Carries the table and operation for audit logging. Always fatal to the
    /// request. In correct operation this never fires because every fetch is
    /// already owner-scoped; it exists to catch a planner bug that forgets the
    /// owner filter.
    #[error("unauthorized: {operation} on '{table}' denied")]
    Unauthorized {
        /// The table the operation targeted.
        table: String,
        /// The operation that was denied.
        operation: String,
    },

    /// A storage operation failed.
    ///
    /// Raised when:
    /// - `SQLite` statements fail to prepare or execute
    /// - The database file cannot be opened
    /// - Stored JSON columns cannot be serialized
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds a storage error from an operation name and any displayable cause.
    pub(crate) fn storage(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::Storage {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for promptvault operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Returns the current Unix timestamp in milliseconds.
///
/// Centralized so every component agrees on the epoch and unit. Engagement
/// timestamps (`last_used_at`) and record timestamps are all millisecond epochs.
#[must_use]
pub fn current_timestamp_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}
