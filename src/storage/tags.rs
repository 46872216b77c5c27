//! Denormalized-tag synchronizer.
//!
//! Keeps the tag-name array on each prompt equal to the set of tag names
//! reachable via the canonical join rows, and converges duplicate tag records
//! created by concurrent writers to a single canonical record per name.
//!
//! Every function here takes the caller's open [`Transaction`]: the
//! reconciliation "trigger" is a synchronous post-write call inside the same
//! transactional unit that mutated the join rows, never an asynchronous queue.

use rusqlite::{OptionalExtension, Transaction, params};
use uuid::Uuid;

use crate::models::Tag;
use crate::{Error, Result};

/// How tags are persisted.
///
/// Chosen once at system construction and never mixed per-call. The two
/// strategies are mutually exclusive consistency designs:
///
/// - `Relational`: tags are separate records related through join rows; the
///   synchronizer reconciles the denormalized array after every join
///   mutation and cleans up orphaned tag records.
/// - `Inline`: normalized tag names are written straight into the prompt
///   document at write time; no join table, no reconciliation, and orphan
///   cleanup is unnecessary because tags are never separately allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagStrategy {
    /// Join-table tags with trigger-style reconciliation.
    #[default]
    Relational,
    /// Tag names embedded directly in the prompt document.
    Inline,
}

/// Finds the canonical tag record for a normalized name, creating it when
/// absent, and converges any duplicate records.
///
/// On a lost creation race the reconciliation keeps the oldest record by
/// creation order and deletes every younger duplicate, including the one just
/// created by this caller if it is not the oldest. The caller always receives
/// the surviving record.
///
/// # Errors
///
/// Returns a storage error if any statement fails.
pub fn find_or_create_tag(
    tx: &Transaction<'_>,
    owner_id: &str,
    name: &str,
    now_ms: u64,
) -> Result<Tag> {
    let existing = lookup_tag(tx, owner_id, name)?;
    if existing.is_none() {
        let tag = Tag {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            created_at: now_ms,
        };
        tx.execute(
            "INSERT INTO tags (id, owner_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![tag.id, tag.owner_id, tag.name, i64_from(tag.created_at)],
        )
        .map_err(|e| Error::storage("create_tag", e))?;
    }

    // Converge to exactly one record per name regardless of write
    // interleaving. The survivor is the oldest by creation order.
    reconcile_duplicate_tags(tx, owner_id, name)
}

/// Looks up a tag by normalized name, preferring the oldest record.
fn lookup_tag(tx: &Transaction<'_>, owner_id: &str, name: &str) -> Result<Option<Tag>> {
    tx.query_row(
        "SELECT id, owner_id, name, created_at FROM tags
         WHERE owner_id = ?1 AND name = ?2
         ORDER BY created_at ASC, rowid ASC LIMIT 1",
        params![owner_id, name],
        row_to_tag,
    )
    .optional()
    .map_err(|e| Error::storage("lookup_tag", e))
}

/// Deletes every duplicate of a tag name except the oldest, repointing join
/// rows so no relation is lost, and returns the survivor.
///
/// Idempotent: with a single record this is a read-only pass.
pub fn reconcile_duplicate_tags(
    tx: &Transaction<'_>,
    owner_id: &str,
    name: &str,
) -> Result<Tag> {
    let mut stmt = tx
        .prepare(
            "SELECT id, owner_id, name, created_at FROM tags
             WHERE owner_id = ?1 AND name = ?2
             ORDER BY created_at ASC, rowid ASC",
        )
        .map_err(|e| Error::storage("reconcile_tags", e))?;
    let records: Vec<Tag> = stmt
        .query_map(params![owner_id, name], row_to_tag)
        .map_err(|e| Error::storage("reconcile_tags", e))?
        .collect::<rusqlite::Result<_>>()
        .map_err(|e| Error::storage("reconcile_tags", e))?;
    drop(stmt);

    let Some(oldest) = records.first().cloned() else {
        return Err(Error::storage(
            "reconcile_tags",
            format!("tag '{name}' vanished during reconciliation"),
        ));
    };

    for younger in &records[1..] {
        // Repoint surviving join rows at the canonical record before the
        // duplicate disappears; a join already present on the survivor is
        // simply dropped.
        tx.execute(
            "UPDATE OR IGNORE prompt_tags SET tag_id = ?1 WHERE tag_id = ?2",
            params![oldest.id, younger.id],
        )
        .map_err(|e| Error::storage("repoint_tag_joins", e))?;
        tx.execute(
            "DELETE FROM prompt_tags WHERE tag_id = ?1",
            params![younger.id],
        )
        .map_err(|e| Error::storage("drop_duplicate_joins", e))?;
        tx.execute("DELETE FROM tags WHERE id = ?1", params![younger.id])
            .map_err(|e| Error::storage("delete_duplicate_tag", e))?;
        tracing::warn!(
            tag = name,
            survivor = %oldest.id,
            removed = %younger.id,
            "resolved concurrent tag creation"
        );
    }

    Ok(oldest)
}

/// Applies a tag diff to a prompt under the relational strategy.
///
/// Inserts join rows for newly desired tags (creating tag records on demand),
/// removes join rows for dropped tags with orphan cleanup, then runs the
/// reconciliation pass so the denormalized array matches the join rows.
///
/// # Errors
///
/// Returns a storage error if any statement fails.
pub fn apply_tag_diff(
    tx: &Transaction<'_>,
    owner_id: &str,
    prompt_id: &str,
    desired: &[String],
    now_ms: u64,
) -> Result<()> {
    let current = current_tag_names(tx, prompt_id)?;

    for name in desired {
        if !current.contains(name) {
            let tag = find_or_create_tag(tx, owner_id, name, now_ms)?;
            tx.execute(
                "INSERT OR IGNORE INTO prompt_tags (prompt_id, tag_id) VALUES (?1, ?2)",
                params![prompt_id, tag.id],
            )
            .map_err(|e| Error::storage("attach_tag", e))?;
        }
    }

    for name in &current {
        if !desired.contains(name) {
            detach_tag(tx, owner_id, prompt_id, name)?;
        }
    }

    reconcile_prompt_tags(tx, prompt_id)?;
    Ok(())
}

/// Removes the join row for one tag name and cleans up the tag record if no
/// join row references it anymore.
fn detach_tag(tx: &Transaction<'_>, owner_id: &str, prompt_id: &str, name: &str) -> Result<()> {
    let Some(tag) = lookup_tag(tx, owner_id, name)? else {
        return Ok(());
    };
    tx.execute(
        "DELETE FROM prompt_tags WHERE prompt_id = ?1 AND tag_id = ?2",
        params![prompt_id, tag.id],
    )
    .map_err(|e| Error::storage("detach_tag", e))?;
    orphan_cleanup(tx, &tag.id)
}

/// Deletes a tag record when the last join row referencing it is gone.
///
/// There is no fixed seeded vocabulary in this store, so every tag is
/// eligible for cleanup.
pub fn orphan_cleanup(tx: &Transaction<'_>, tag_id: &str) -> Result<()> {
    let referenced: i64 = tx
        .query_row(
            "SELECT COUNT(*) FROM prompt_tags WHERE tag_id = ?1",
            params![tag_id],
            |row| row.get(0),
        )
        .map_err(|e| Error::storage("count_tag_joins", e))?;
    if referenced == 0 {
        tx.execute("DELETE FROM tags WHERE id = ?1", params![tag_id])
            .map_err(|e| Error::storage("delete_orphan_tag", e))?;
    }
    Ok(())
}

/// Recomputes a prompt's denormalized tag array from its surviving join rows
/// and patches the stored value only if it differs.
///
/// The differs-check is what makes redundant firings converge instead of
/// looping: repeated passes over an already-consistent prompt produce zero
/// additional writes. Returns `true` when a patch was written.
///
/// # Errors
///
/// Returns a storage error if any statement fails.
pub fn reconcile_prompt_tags(tx: &Transaction<'_>, prompt_id: &str) -> Result<bool> {
    let mut names = current_tag_names(tx, prompt_id)?;
    names.sort();

    let stored: Option<String> = tx
        .query_row(
            "SELECT tags FROM prompts WHERE id = ?1",
            params![prompt_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::storage("read_prompt_tags", e))?;
    let Some(stored) = stored else {
        // Prompt deleted under us; nothing to patch.
        return Ok(false);
    };
    let stored_names: Vec<String> = serde_json::from_str(&stored).unwrap_or_default();

    if stored_names == names {
        return Ok(false);
    }

    let json = serde_json::to_string(&names).map_err(|e| Error::storage("serialize_tags", e))?;
    tx.execute(
        "UPDATE prompts SET tags = ?1 WHERE id = ?2",
        params![json, prompt_id],
    )
    .map_err(|e| Error::storage("patch_prompt_tags", e))?;
    Ok(true)
}

/// Resolves the current tag names for a prompt via its join rows.
pub fn current_tag_names(tx: &Transaction<'_>, prompt_id: &str) -> Result<Vec<String>> {
    let mut stmt = tx
        .prepare(
            "SELECT t.name FROM prompt_tags pt
             JOIN tags t ON t.id = pt.tag_id
             WHERE pt.prompt_id = ?1",
        )
        .map_err(|e| Error::storage("list_prompt_tags", e))?;
    let names = stmt
        .query_map(params![prompt_id], |row| row.get::<_, String>(0))
        .map_err(|e| Error::storage("list_prompt_tags", e))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::storage("list_prompt_tags", e))?;
    Ok(names)
}

/// Removes all join rows for a prompt with orphan cleanup, for delete paths.
///
/// # Errors
///
/// Returns a storage error if any statement fails.
pub fn detach_all_tags(tx: &Transaction<'_>, prompt_id: &str) -> Result<()> {
    let mut stmt = tx
        .prepare("SELECT tag_id FROM prompt_tags WHERE prompt_id = ?1")
        .map_err(|e| Error::storage("list_prompt_joins", e))?;
    let tag_ids = stmt
        .query_map(params![prompt_id], |row| row.get::<_, String>(0))
        .map_err(|e| Error::storage("list_prompt_joins", e))?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(|e| Error::storage("list_prompt_joins", e))?;
    drop(stmt);

    tx.execute(
        "DELETE FROM prompt_tags WHERE prompt_id = ?1",
        params![prompt_id],
    )
    .map_err(|e| Error::storage("detach_all_tags", e))?;

    for tag_id in tag_ids {
        orphan_cleanup(tx, &tag_id)?;
    }
    Ok(())
}

fn row_to_tag(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tag> {
    let created_at: i64 = row.get(3)?;
    Ok(Tag {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        created_at: u64::try_from(created_at).unwrap_or(0),
    })
}

#[allow(clippy::cast_possible_wrap)]
const fn i64_from(value: u64) -> i64 {
    value as i64
}
