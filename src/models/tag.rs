//! Tag and join-row models for the relational tag strategy.

use serde::{Deserialize, Serialize};

/// A per-owner tag record, created on demand.
///
/// Names are normalized (trimmed, lowercased) before the record is created, so
/// at steady state exactly one record exists per `(owner_id, name)`. Concurrent
/// creation can transiently produce duplicates; the synchronizer keeps the
/// oldest by creation order and deletes the younger ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Opaque unique id.
    pub id: String,
    /// Owner identifier.
    pub owner_id: String,
    /// Normalized tag name.
    pub name: String,
    /// Creation timestamp (ms epoch); ties are broken by insertion order.
    pub created_at: u64,
}

/// A many-to-many join row between a prompt and a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTag {
    /// The prompt id.
    pub prompt_id: String,
    /// The tag id.
    pub tag_id: String,
}
