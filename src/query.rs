//! Query planning for list and search requests.
//!
//! The planner normalizes the request, picks the storage access path, applies
//! the tag filter, hands candidates to the ranking engine, and truncates to
//! the page size. Tag-filtered search over-fetches from the text index so the
//! post-filter page is not starved, then re-ranks before truncating.

use crate::config::RankingConfig;
use crate::models::Prompt;
use crate::ranking::{RankMode, rank};
use crate::storage::SqlitePromptStore;
use crate::{Result, current_timestamp_ms};

/// Smallest accepted page size.
pub const MIN_LIMIT: usize = 1;
/// Largest accepted page size.
pub const MAX_LIMIT: usize = 1000;
/// Page size used when the caller does not specify one.
pub const DEFAULT_LIMIT: usize = 50;

/// A browse request: every prompt the owner can see, engagement-ordered.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    /// Optional tag filter; a prompt matches if it carries any of these.
    pub tags: Vec<String>,
    /// Requested page size; clamped to [`MIN_LIMIT`]..=[`MAX_LIMIT`].
    pub limit: Option<usize>,
}

impl ListRequest {
    /// Creates an unfiltered list request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts results to prompts carrying any of the given tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A text search request with optional tag filter.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// The raw query text; normalized by the planner.
    pub query: String,
    /// Optional tag filter; a prompt matches if it carries any of these.
    pub tags: Vec<String>,
    /// Requested page size; clamped to [`MIN_LIMIT`]..=[`MAX_LIMIT`].
    pub limit: Option<usize>,
}

impl SearchRequest {
    /// Creates a search request for the given query text.
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            tags: Vec::new(),
            limit: None,
        }
    }

    /// Restricts results to prompts carrying any of the given tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Clamps a requested page size into the accepted range.
#[must_use]
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(MIN_LIMIT, MAX_LIMIT)
}

/// Plans and executes ranked queries against the store.
///
/// Stateless apart from its borrows; the service constructs one per call.
pub struct QueryPlanner<'a> {
    store: &'a SqlitePromptStore,
    config: &'a RankingConfig,
}

impl<'a> QueryPlanner<'a> {
    /// Creates a planner over a store and ranking configuration.
    #[must_use]
    pub const fn new(store: &'a SqlitePromptStore, config: &'a RankingConfig) -> Self {
        Self { store, config }
    }

    /// Executes a list request: owner scan, tag filter, list-mode rank,
    /// truncate.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage scan fails.
    pub fn list(&self, owner_id: &str, request: &ListRequest) -> Result<Vec<Prompt>> {
        let limit = clamp_limit(request.limit);
        let candidates = self.store.list_owner(owner_id)?;
        let filtered = filter_by_tags(candidates, &request.tags);
        let mut ranked = rank(filtered, self.config, RankMode::List, current_timestamp_ms());
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// Executes a search request.
    ///
    /// An empty query after trimming is a browse, not a search, and falls
    /// through to the list path with the same tag filter. Otherwise the text
    /// index supplies candidates: exactly a page when no tag filter applies,
    /// or up to the configured re-rank bound when one does, so that
    /// post-filter truncation still fills the page where matches exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage query fails.
    pub fn search(&self, owner_id: &str, request: &SearchRequest) -> Result<Vec<Prompt>> {
        let limit = clamp_limit(request.limit);
        let query = request.query.trim().to_lowercase();

        if query.is_empty() {
            let list_request = ListRequest::new()
                .with_tags(request.tags.clone())
                .with_limit(limit);
            return self.list(owner_id, &list_request);
        }

        let fetch_size = if request.tags.is_empty() {
            limit
        } else {
            // The rerank bound caps worst-case work; it does not grow with
            // the requested page size.
            self.config.search_rerank_limit
        };

        let candidates = self.store.search_text(owner_id, &query, fetch_size)?;
        let filtered = filter_by_tags(candidates, &request.tags);
        let mut ranked = rank(filtered, self.config, RankMode::Search, current_timestamp_ms());
        ranked.truncate(limit);
        Ok(ranked)
    }
}

/// Keeps prompts carrying at least one of the requested tags.
///
/// Tag comparison is case-insensitive on the request side; stored tags are
/// already normalized to lowercase.
fn filter_by_tags(prompts: Vec<Prompt>, tags: &[String]) -> Vec<Prompt> {
    if tags.is_empty() {
        return prompts;
    }
    let wanted: Vec<String> = tags.iter().map(|t| t.trim().to_lowercase()).collect();
    prompts
        .into_iter()
        .filter(|p| p.tags.iter().any(|t| wanted.iter().any(|w| w == t)))
        .collect()
}
