//! Storage layer: the SQLite document store and the tag synchronizer.
//!
//! Each logical operation (a batch insert, an update with tag diff, a delete
//! with cleanup) runs as a single transaction, which is what gives the core
//! its serializable read-then-write model. No locking is implemented above
//! the store itself.

pub mod sqlite;
pub mod tags;

pub use sqlite::SqlitePromptStore;
pub use tags::TagStrategy;

/// Table name for prompts, used by the authorization guard.
pub const TABLE_PROMPTS: &str = "prompts";
/// Table name for tags (shared data, no registered guard predicate).
pub const TABLE_TAGS: &str = "tags";
