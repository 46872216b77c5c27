//! Prompt service: the crate's call surface.
//!
//! Each operation follows the same shape: validate the input, run the storage
//! work (fetching only owner-scoped data), enforce the authorization guard on
//! every document crossing the boundary, and map internal records to DTOs.

use std::sync::Arc;

use crate::auth::{AccessRules, CallerContext, Operation};
use crate::config::{RankingConfig, VaultConfig};
use crate::models::{OwnedDocument, Prompt, PromptDto, PromptInput};
use crate::query::{ListRequest, QueryPlanner, SearchRequest};
use crate::storage::{SqlitePromptStore, TABLE_PROMPTS, TagStrategy};
use crate::{Result, validate};

/// High-level prompt operations with validation and authorization applied.
#[derive(Clone)]
pub struct PromptService {
    store: Arc<SqlitePromptStore>,
    rules: Arc<AccessRules>,
}

impl PromptService {
    /// Opens a service over the configured database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the ranking
    /// configuration cannot be seeded.
    pub fn open(config: &VaultConfig) -> Result<Self> {
        let store = SqlitePromptStore::new(&config.db_path, TagStrategy::default())?;
        if let Some(ranking) = &config.ranking {
            store.save_ranking_config(ranking)?;
        }
        Ok(Self {
            store: Arc::new(store),
            rules: Arc::new(AccessRules::new()),
        })
    }

    /// Creates a service over an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        Self::with_store(SqlitePromptStore::in_memory(TagStrategy::default())?)
    }

    /// Creates a service over an explicit store with the canonical rule set.
    ///
    /// # Errors
    ///
    /// Returns an error if the ranking configuration cannot be seeded.
    pub fn with_store(store: SqlitePromptStore) -> Result<Self> {
        Ok(Self {
            store: Arc::new(store),
            rules: Arc::new(AccessRules::new()),
        })
    }

    /// Replaces the authorization rule registry.
    ///
    /// Rules are injected per instance, so tests can override them without a
    /// process-wide global.
    #[must_use]
    pub fn with_rules(mut self, rules: AccessRules) -> Self {
        self.rules = Arc::new(rules);
        self
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &SqlitePromptStore {
        &self.store
    }

    /// Creates a single prompt.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Validation`] for malformed input,
    /// [`crate::Error::Conflict`] if the slug already exists for the owner,
    /// or a storage error.
    #[tracing::instrument(skip(self, input), fields(owner = %ctx.owner_id, slug = %input.slug))]
    pub fn create(&self, ctx: &CallerContext, input: &PromptInput) -> Result<PromptDto> {
        let mut created = self.create_batch(ctx, std::slice::from_ref(input))?;
        // create_batch returns exactly one DTO per input.
        created.pop().ok_or_else(|| {
            crate::Error::storage("create_prompt", "batch insert returned no record")
        })
    }

    /// Creates a batch of prompts atomically.
    ///
    /// The whole batch is validated first; any invalid input or slug conflict
    /// (within the batch or against existing data) rejects the batch with
    /// nothing persisted.
    ///
    /// # Errors
    ///
    /// Returns a validation, conflict, or storage error.
    #[tracing::instrument(skip(self, inputs), fields(owner = %ctx.owner_id, count = inputs.len()))]
    pub fn create_batch(
        &self,
        ctx: &CallerContext,
        inputs: &[PromptInput],
    ) -> Result<Vec<PromptDto>> {
        let normalized = validate::validate_batch(inputs)?;

        // The guard is a final gate before anything is committed. The store
        // stamps the caller as owner of every record in the batch, so one
        // check against that pending ownership covers the whole batch.
        let pending = PendingDocument {
            owner_id: &ctx.owner_id,
        };
        self.rules
            .enforce(ctx, TABLE_PROMPTS, Operation::Insert, &pending)?;

        let inserted = self.store.insert_batch(&ctx.owner_id, &normalized)?;
        Ok(inserted.iter().map(Prompt::to_dto).collect())
    }

    /// Fetches a prompt by slug, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    #[tracing::instrument(skip(self), fields(owner = %ctx.owner_id))]
    pub fn get(&self, ctx: &CallerContext, slug: &str) -> Result<Option<PromptDto>> {
        let Some(prompt) = self.store.get_by_slug(&ctx.owner_id, slug)? else {
            return Ok(None);
        };
        self.rules
            .enforce(ctx, TABLE_PROMPTS, Operation::Read, &prompt)?;
        Ok(Some(prompt.to_dto()))
    }

    /// Updates a prompt's content fields and tags.
    ///
    /// Engagement fields (usage count, last used, created at) are preserved.
    /// Returns `None` if no prompt with that slug exists for the owner.
    ///
    /// # Errors
    ///
    /// Returns a validation, authorization, or storage error.
    #[tracing::instrument(skip(self, input), fields(owner = %ctx.owner_id))]
    pub fn update(
        &self,
        ctx: &CallerContext,
        slug: &str,
        input: &PromptInput,
    ) -> Result<Option<PromptDto>> {
        let normalized = validate::validate_input(input)?;

        let Some(existing) = self.store.get_by_slug(&ctx.owner_id, slug)? else {
            return Ok(None);
        };
        self.rules
            .enforce(ctx, TABLE_PROMPTS, Operation::Modify, &existing)?;

        let updated = self.store.update(&ctx.owner_id, slug, &normalized)?;
        Ok(updated.as_ref().map(Prompt::to_dto))
    }

    /// Deletes a prompt with full tag cleanup.
    ///
    /// Returns `false` if no prompt with that slug exists for the owner.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    #[tracing::instrument(skip(self), fields(owner = %ctx.owner_id))]
    pub fn delete(&self, ctx: &CallerContext, slug: &str) -> Result<bool> {
        let Some(existing) = self.store.get_by_slug(&ctx.owner_id, slug)? else {
            return Ok(false);
        };
        self.rules
            .enforce(ctx, TABLE_PROMPTS, Operation::Delete, &existing)?;

        self.store.delete(&ctx.owner_id, slug)
    }

    /// Lists the owner's prompts in engagement order.
    ///
    /// Pinned prompts first, then previously-used prompts by score, then
    /// never-used ones.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    #[tracing::instrument(skip(self, request), fields(owner = %ctx.owner_id))]
    pub fn list(&self, ctx: &CallerContext, request: &ListRequest) -> Result<Vec<PromptDto>> {
        let config = self.store.load_ranking_config()?;
        let planner = QueryPlanner::new(&self.store, &config);
        let ranked = planner.list(&ctx.owner_id, request)?;
        self.guard_and_map(ctx, ranked)
    }

    /// Searches the owner's prompts by text relevance re-ranked with
    /// engagement signals.
    ///
    /// An empty query is a browse and behaves like [`Self::list`].
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    #[tracing::instrument(skip(self, request), fields(owner = %ctx.owner_id, query = %request.query))]
    pub fn search(&self, ctx: &CallerContext, request: &SearchRequest) -> Result<Vec<PromptDto>> {
        let config = self.store.load_ranking_config()?;
        let planner = QueryPlanner::new(&self.store, &config);
        let ranked = planner.search(&ctx.owner_id, request)?;
        self.guard_and_map(ctx, ranked)
    }

    /// Records a use of a prompt, returning the new count.
    ///
    /// Returns `None` if no prompt with that slug exists for the owner.
    ///
    /// # Errors
    ///
    /// Returns an authorization or storage error.
    #[tracing::instrument(skip(self), fields(owner = %ctx.owner_id))]
    pub fn record_usage(&self, ctx: &CallerContext, slug: &str) -> Result<Option<u64>> {
        let Some(existing) = self.store.get_by_slug(&ctx.owner_id, slug)? else {
            return Ok(None);
        };
        self.rules
            .enforce(ctx, TABLE_PROMPTS, Operation::Modify, &existing)?;

        self.store.record_usage(&ctx.owner_id, slug)
    }

    /// Returns the effective ranking configuration.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn ranking_config(&self) -> Result<RankingConfig> {
        self.store.load_ranking_config()
    }

    fn guard_and_map(
        &self,
        ctx: &CallerContext,
        prompts: Vec<Prompt>,
    ) -> Result<Vec<PromptDto>> {
        for prompt in &prompts {
            self.rules
                .enforce(ctx, TABLE_PROMPTS, Operation::Read, prompt)?;
        }
        Ok(prompts.iter().map(Prompt::to_dto).collect())
    }
}

/// Ownership view of records about to be written for the caller.
///
/// Lets the guard run before the insert transaction instead of after it: the
/// store stamps the caller as owner, so this is the ownership the committed
/// records will carry.
struct PendingDocument<'a> {
    owner_id: &'a str,
}

impl OwnedDocument for PendingDocument<'_> {
    fn owner_id(&self) -> Option<&str> {
        Some(self.owner_id)
    }
}
