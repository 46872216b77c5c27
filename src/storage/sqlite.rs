//! SQLite-backed prompt store with an FTS5 text-search index.
//!
//! The store is the crate's "indexed document store": equality lookup by
//! owner+slug (unique), an owner-scoped ordered scan, and a relevance-ordered
//! full-text search over the derived `search_text` field. Every logical
//! mutation runs inside one transaction, including the tag synchronizer calls
//! on its write paths.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use uuid::Uuid;

use super::tags::{self, TagStrategy};
use crate::config::RankingConfig;
use crate::models::{Prompt, PromptInput, Tag, build_search_text};
use crate::{Error, Result, current_timestamp_ms};

/// `SQLite`-backed prompt store.
pub struct SqlitePromptStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the `SQLite` database.
    db_path: PathBuf,
    /// How tags are persisted; chosen once at construction.
    strategy: TagStrategy,
}

impl SqlitePromptStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>, strategy: TagStrategy) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::storage("create_db_dir", e))?;
        }

        let conn = Connection::open(&db_path).map_err(|e| Error::storage("open_db", e))?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            strategy,
        })
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory(strategy: TagStrategy) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::storage("open_db_memory", e))?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: PathBuf::from(":memory:"),
            strategy,
        })
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Returns the tag strategy this store was constructed with.
    #[must_use]
    pub const fn strategy(&self) -> TagStrategy {
        self.strategy
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| Error::storage("lock_db", e))
    }

    /// Loads the ranking configuration, lazily seeding defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be read or seeded.
    pub fn load_ranking_config(&self) -> Result<RankingConfig> {
        let conn = self.lock_conn()?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM ranking_config WHERE key = 'default'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::storage("read_ranking_config", e))?;

        if let Some(json) = stored {
            return serde_json::from_str(&json).map_err(|e| Error::storage("parse_ranking_config", e));
        }

        let config = RankingConfig::default();
        let json =
            serde_json::to_string(&config).map_err(|e| Error::storage("seed_ranking_config", e))?;
        conn.execute(
            "INSERT INTO ranking_config (key, value) VALUES ('default', ?1)",
            params![json],
        )
        .map_err(|e| Error::storage("seed_ranking_config", e))?;
        Ok(config)
    }

    /// Stores a ranking configuration, replacing any existing record.
    ///
    /// Administrative path; not exposed through the service surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    pub fn save_ranking_config(&self, config: &RankingConfig) -> Result<()> {
        let conn = self.lock_conn()?;
        let json =
            serde_json::to_string(config).map_err(|e| Error::storage("save_ranking_config", e))?;
        conn.execute(
            "INSERT OR REPLACE INTO ranking_config (key, value) VALUES ('default', ?1)",
            params![json],
        )
        .map_err(|e| Error::storage("save_ranking_config", e))?;
        Ok(())
    }

    /// Inserts a batch of validated inputs atomically.
    ///
    /// The whole batch is checked against existing slugs inside the
    /// transaction before anything is written; any collision rejects the
    /// batch with zero documents persisted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Conflict`] on a slug collision or a storage error if
    /// any statement fails.
    pub fn insert_batch(&self, owner_id: &str, inputs: &[PromptInput]) -> Result<Vec<Prompt>> {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage("begin_insert", e))?;
        let now = current_timestamp_ms();

        // Conflict pre-check: all reads happen before the first write.
        for input in inputs {
            let exists: Option<String> = tx
                .query_row(
                    "SELECT id FROM prompts WHERE owner_id = ?1 AND slug = ?2",
                    params![owner_id, input.slug],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| Error::storage("check_slug", e))?;
            if exists.is_some() {
                return Err(Error::Conflict(format!(
                    "slug '{}' already exists for this owner",
                    input.slug
                )));
            }
        }

        let mut inserted = Vec::with_capacity(inputs.len());
        for input in inputs {
            let prompt = self.insert_one(&tx, owner_id, input, now)?;
            inserted.push(prompt);
        }

        tx.commit().map_err(|e| Error::storage("commit_insert", e))?;
        tracing::info!(owner = owner_id, count = inserted.len(), "inserted prompt batch");
        Ok(inserted)
    }

    /// Inserts one prompt row, its FTS entry, and its tags.
    fn insert_one(
        &self,
        tx: &Transaction<'_>,
        owner_id: &str,
        input: &PromptInput,
        now: u64,
    ) -> Result<Prompt> {
        let mut prompt = Prompt {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            slug: input.slug.clone(),
            name: input.name.clone(),
            description: input.description.clone(),
            content: input.content.clone(),
            parameters: input.parameters.clone(),
            tags: Vec::new(),
            search_text: build_search_text(
                &input.slug,
                &input.name,
                &input.description,
                &input.content,
            ),
            pinned: input.pinned,
            favorited: input.favorited,
            usage_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        };

        // Inline strategy writes the normalized names straight into the
        // document; the relational strategy starts empty and lets the
        // synchronizer patch the array from the join rows.
        if self.strategy == TagStrategy::Inline {
            let mut names = input.tags.clone();
            names.sort();
            prompt.tags = names;
        }

        let parameters = serde_json::to_string(&prompt.parameters)
            .map_err(|e| Error::storage("serialize_parameters", e))?;
        let tags_json =
            serde_json::to_string(&prompt.tags).map_err(|e| Error::storage("serialize_tags", e))?;

        tx.execute(
            "INSERT INTO prompts (id, owner_id, slug, name, description, content, parameters,
                                  tags, search_text, pinned, favorited, usage_count,
                                  last_used_at, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, NULL, ?12, ?12)",
            params![
                prompt.id,
                prompt.owner_id,
                prompt.slug,
                prompt.name,
                prompt.description,
                prompt.content,
                parameters,
                tags_json,
                prompt.search_text,
                prompt.pinned,
                prompt.favorited,
                i64_from(now),
            ],
        )
        .map_err(|e| Error::storage("insert_prompt", e))?;

        let rowid = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO prompts_fts (rowid, search_text) VALUES (?1, ?2)",
            params![rowid, prompt.search_text],
        )
        .map_err(|e| Error::storage("index_prompt", e))?;

        if self.strategy == TagStrategy::Relational {
            tags::apply_tag_diff(tx, owner_id, &prompt.id, &input.tags, now)?;
            prompt.tags = {
                let mut names = input.tags.clone();
                names.sort();
                names
            };
        }

        Ok(prompt)
    }

    /// Fetches a prompt by owner and slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    pub fn get_by_slug(&self, owner_id: &str, slug: &str) -> Result<Option<Prompt>> {
        let conn = self.lock_conn()?;
        conn.query_row(
            &format!("{PROMPT_SELECT} WHERE owner_id = ?1 AND slug = ?2"),
            params![owner_id, slug],
            row_to_prompt,
        )
        .optional()
        .map_err(|e| Error::storage("get_prompt", e))
    }

    /// Fetches all of an owner's prompts as an ordered scan (slug ascending).
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn list_owner(&self, owner_id: &str) -> Result<Vec<Prompt>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "{PROMPT_SELECT} WHERE owner_id = ?1 ORDER BY slug ASC"
            ))
            .map_err(|e| Error::storage("list_prompts", e))?;
        let rows = stmt
            .query_map(params![owner_id], row_to_prompt)
            .map_err(|e| Error::storage("list_prompts", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::storage("list_prompts", e))?;
        Ok(rows)
    }

    /// Runs the text-search index for an owner, returning up to `fetch_size`
    /// candidates in relevance order.
    ///
    /// The query must already be normalized (trimmed, lowercased) by the
    /// planner; tokens are quoted so FTS5 operators in user input are inert.
    ///
    /// # Errors
    ///
    /// Returns an error if the search fails.
    pub fn search_text(
        &self,
        owner_id: &str,
        query: &str,
        fetch_size: usize,
    ) -> Result<Vec<Prompt>> {
        let match_expr = fts_match_expression(query);
        if match_expr.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT p.id, p.owner_id, p.slug, p.name, p.description, p.content,
                        p.parameters, p.tags, p.search_text, p.pinned, p.favorited,
                        p.usage_count, p.last_used_at, p.created_at, p.updated_at
                 FROM prompts_fts
                 JOIN prompts p ON p.rowid = prompts_fts.rowid
                 WHERE prompts_fts MATCH ?1 AND p.owner_id = ?2
                 ORDER BY prompts_fts.rank
                 LIMIT ?3",
            )
            .map_err(|e| Error::storage("search_prompts", e))?;
        let rows = stmt
            .query_map(
                params![match_expr, owner_id, i64::try_from(fetch_size).unwrap_or(i64::MAX)],
                row_to_prompt,
            )
            .map_err(|e| Error::storage("search_prompts", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::storage("search_prompts", e))?;
        Ok(rows)
    }

    /// Updates a prompt's content fields and tags in one transaction.
    ///
    /// Returns the updated record, or `None` if no prompt with that slug
    /// exists for the owner. The derived search text is recomputed and the
    /// FTS entry replaced; engagement fields are preserved.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn update(
        &self,
        owner_id: &str,
        slug: &str,
        input: &PromptInput,
    ) -> Result<Option<Prompt>> {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage("begin_update", e))?;
        let now = current_timestamp_ms();

        let found: Option<(String, i64)> = tx
            .query_row(
                "SELECT id, rowid FROM prompts WHERE owner_id = ?1 AND slug = ?2",
                params![owner_id, slug],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| Error::storage("find_prompt", e))?;
        let Some((id, rowid)) = found else {
            return Ok(None);
        };

        let search_text =
            build_search_text(slug, &input.name, &input.description, &input.content);
        let parameters = serde_json::to_string(&input.parameters)
            .map_err(|e| Error::storage("serialize_parameters", e))?;

        tx.execute(
            "UPDATE prompts SET name = ?1, description = ?2, content = ?3, parameters = ?4,
                                search_text = ?5, pinned = ?6, favorited = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                input.name,
                input.description,
                input.content,
                parameters,
                search_text,
                input.pinned,
                input.favorited,
                i64_from(now),
                id,
            ],
        )
        .map_err(|e| Error::storage("update_prompt", e))?;

        tx.execute(
            "DELETE FROM prompts_fts WHERE rowid = ?1",
            params![rowid],
        )
        .map_err(|e| Error::storage("reindex_prompt", e))?;
        tx.execute(
            "INSERT INTO prompts_fts (rowid, search_text) VALUES (?1, ?2)",
            params![rowid, search_text],
        )
        .map_err(|e| Error::storage("reindex_prompt", e))?;

        match self.strategy {
            TagStrategy::Relational => {
                tags::apply_tag_diff(&tx, owner_id, &id, &input.tags, now)?;
            },
            TagStrategy::Inline => {
                let mut names = input.tags.clone();
                names.sort();
                let json =
                    serde_json::to_string(&names).map_err(|e| Error::storage("serialize_tags", e))?;
                tx.execute(
                    "UPDATE prompts SET tags = ?1 WHERE id = ?2",
                    params![json, id],
                )
                .map_err(|e| Error::storage("update_tags", e))?;
            },
        }

        let updated = tx
            .query_row(
                &format!("{PROMPT_SELECT} WHERE id = ?1"),
                params![id],
                row_to_prompt,
            )
            .map_err(|e| Error::storage("reload_prompt", e))?;

        tx.commit().map_err(|e| Error::storage("commit_update", e))?;
        Ok(Some(updated))
    }

    /// Deletes a prompt with full tag cleanup.
    ///
    /// Returns `false` when no prompt with that slug exists for the owner.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn delete(&self, owner_id: &str, slug: &str) -> Result<bool> {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage("begin_delete", e))?;

        let found: Option<(String, i64)> = tx
            .query_row(
                "SELECT id, rowid FROM prompts WHERE owner_id = ?1 AND slug = ?2",
                params![owner_id, slug],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| Error::storage("find_prompt", e))?;
        let Some((id, rowid)) = found else {
            return Ok(false);
        };

        if self.strategy == TagStrategy::Relational {
            tags::detach_all_tags(&tx, &id)?;
        }
        tx.execute("DELETE FROM prompts WHERE id = ?1", params![id])
            .map_err(|e| Error::storage("delete_prompt", e))?;
        tx.execute("DELETE FROM prompts_fts WHERE rowid = ?1", params![rowid])
            .map_err(|e| Error::storage("deindex_prompt", e))?;

        tx.commit().map_err(|e| Error::storage("commit_delete", e))?;
        Ok(true)
    }

    /// Increments a prompt's usage count and stamps the last-used time.
    ///
    /// Read-then-increment-then-write inside one transaction. Under the
    /// store's serializable model this loses no updates; on a weaker store
    /// this would be an approximate counter (an accepted trade-off, not a
    /// strict counter).
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn record_usage(&self, owner_id: &str, slug: &str) -> Result<Option<u64>> {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage("begin_usage", e))?;
        let now = current_timestamp_ms();

        let found: Option<(String, i64)> = tx
            .query_row(
                "SELECT id, usage_count FROM prompts WHERE owner_id = ?1 AND slug = ?2",
                params![owner_id, slug],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| Error::storage("read_usage", e))?;
        let Some((id, count)) = found else {
            return Ok(None);
        };

        let next = count.saturating_add(1);
        tx.execute(
            "UPDATE prompts SET usage_count = ?1, last_used_at = ?2, updated_at = ?2 WHERE id = ?3",
            params![next, i64_from(now), id],
        )
        .map_err(|e| Error::storage("write_usage", e))?;

        tx.commit().map_err(|e| Error::storage("commit_usage", e))?;
        Ok(Some(u64::try_from(next).unwrap_or(0)))
    }

    /// Finds or creates the canonical tag record for a normalized name.
    ///
    /// Relational strategy only; converges duplicate records to the oldest.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails.
    pub fn find_or_create_tag(&self, owner_id: &str, name: &str) -> Result<Tag> {
        let mut conn = self.lock_conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage("begin_tag", e))?;
        let tag = tags::find_or_create_tag(&tx, owner_id, name, current_timestamp_ms())?;
        tx.commit().map_err(|e| Error::storage("commit_tag", e))?;
        Ok(tag)
    }

    /// Lists an owner's tag records, name ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub fn list_tags(&self, owner_id: &str) -> Result<Vec<Tag>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, owner_id, name, created_at FROM tags
                 WHERE owner_id = ?1 ORDER BY name ASC",
            )
            .map_err(|e| Error::storage("list_tags", e))?;
        let rows = stmt
            .query_map(params![owner_id], |row| {
                let created_at: i64 = row.get(3)?;
                Ok(Tag {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    name: row.get(2)?,
                    created_at: u64::try_from(created_at).unwrap_or(0),
                })
            })
            .map_err(|e| Error::storage("list_tags", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::storage("list_tags", e))?;
        Ok(rows)
    }
}

/// Column list shared by every prompt SELECT.
const PROMPT_SELECT: &str = "SELECT id, owner_id, slug, name, description, content, parameters,
                                    tags, search_text, pinned, favorited, usage_count,
                                    last_used_at, created_at, updated_at
                             FROM prompts";

/// Initializes the database schema.
///
/// The `tags` table deliberately carries no unique constraint on
/// `(owner_id, name)`: duplicate records may transiently exist between a
/// racing create and its reconciliation, and the synchronizer converges them.
pub(crate) fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS prompts (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            slug TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            parameters TEXT NOT NULL DEFAULT '[]',
            tags TEXT NOT NULL DEFAULT '[]',
            search_text TEXT NOT NULL DEFAULT '',
            pinned INTEGER NOT NULL DEFAULT 0,
            favorited INTEGER NOT NULL DEFAULT 0,
            usage_count INTEGER NOT NULL DEFAULT 0,
            last_used_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (owner_id, slug)
        );
        CREATE INDEX IF NOT EXISTS idx_prompts_owner ON prompts(owner_id);

        CREATE TABLE IF NOT EXISTS tags (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tags_owner_name ON tags(owner_id, name);

        CREATE TABLE IF NOT EXISTS prompt_tags (
            prompt_id TEXT NOT NULL,
            tag_id TEXT NOT NULL,
            PRIMARY KEY (prompt_id, tag_id)
        );

        CREATE TABLE IF NOT EXISTS ranking_config (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS prompts_fts USING fts5(search_text);",
    )
    .map_err(|e| Error::storage("init_schema", e))
}

/// Quotes each whitespace-separated token so FTS5 treats user input as plain
/// terms (implicit AND), never as query syntax. Tokens with no alphanumeric
/// content would tokenize to an empty phrase and are dropped.
fn fts_match_expression(query: &str) -> String {
    query
        .split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(|token| format!("\"{}\"", token.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}

#[allow(clippy::cast_sign_loss)]
fn row_to_prompt(row: &rusqlite::Row<'_>) -> rusqlite::Result<Prompt> {
    let parameters: String = row.get(6)?;
    let tags: String = row.get(7)?;
    Ok(Prompt {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        slug: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        content: row.get(5)?,
        parameters: serde_json::from_str(&parameters).unwrap_or_default(),
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        search_text: row.get(8)?,
        pinned: row.get(9)?,
        favorited: row.get(10)?,
        usage_count: row.get::<_, i64>(11)? as u64,
        last_used_at: row.get::<_, Option<i64>>(12)?.map(|v| v as u64),
        created_at: row.get::<_, i64>(13)? as u64,
        updated_at: row.get::<_, i64>(14)? as u64,
    })
}

#[allow(clippy::cast_possible_wrap)]
const fn i64_from(value: u64) -> i64 {
    value as i64
}
