/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API over the translation memory, the
 * glossary and the queue snapshot, abstracting away the SQL details.
 */

use anyhow::Result;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::fmt::Display;
use std::str::FromStr;

use super::connection::DatabaseConnection;
use crate::translation::model::{FileEntry, FileStatus, ItemStatus, TranslationItem};

/// Parses a stored status, falling back to `fallback` with a warning
///
/// A row written by a newer build (or edited by hand) should not make the
/// whole queue unreadable.
fn parse_status<T>(raw: &str, fallback: T, context: &str) -> T
where
    T: FromStr + Display,
{
    raw.parse().unwrap_or_else(|_| {
        warn!(
            "Unrecognized status '{}' for {}, treating it as {}",
            raw, context, fallback
        );
        fallback
    })
}

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Get the underlying connection
    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // =========================================================================
    // Translation Memory
    // =========================================================================

    /// Load every translation memory entry as (target language, source, translation)
    pub fn load_memory(&self) -> Result<Vec<(String, String, String)>> {
        self.db.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT target_language, source_text, translated_text FROM translation_memory",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<rusqlite::Result<Vec<(String, String, String)>>>()?;
            Ok(rows)
        })
    }

    /// Insert or replace translation memory entries for one target language
    pub fn save_memory_entries(&self, target_language: &str, entries: &[(String, String)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let now = chrono::Utc::now().to_rfc3339();
        self.db.transaction(|tx| {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO translation_memory (target_language, source_text, translated_text, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(target_language, source_text) DO UPDATE SET
                    translated_text = excluded.translated_text,
                    updated_at = excluded.updated_at
                "#,
            )?;
            for (source, translation) in entries {
                stmt.execute(params![target_language, source, translation, now])?;
            }
            Ok(())
        })?;

        debug!(
            "Persisted {} translation memory entries for '{}'",
            entries.len(),
            target_language
        );
        Ok(())
    }

    /// Remove every translation memory entry, returning how many were removed
    pub fn clear_memory(&self) -> Result<usize> {
        self.db
            .execute(|conn| Ok(conn.execute("DELETE FROM translation_memory", [])?))
    }

    // =========================================================================
    // Glossary
    // =========================================================================

    /// Load every glossary term
    pub fn load_glossary(&self) -> Result<Vec<(String, String)>> {
        self.db.execute(|conn| {
            let mut stmt =
                conn.prepare("SELECT term, translation FROM glossary ORDER BY term")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<Vec<(String, String)>>>()?;
            Ok(rows)
        })
    }

    /// Insert or replace a glossary term
    pub fn upsert_glossary_term(&self, term: &str, translation: &str) -> Result<()> {
        self.db.execute(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO glossary (term, translation) VALUES (?1, ?2)",
                params![term, translation],
            )?;
            Ok(())
        })
    }

    /// Remove a glossary term, returning whether it existed
    pub fn remove_glossary_term(&self, term: &str) -> Result<bool> {
        self.db.execute(|conn| {
            let removed = conn.execute("DELETE FROM glossary WHERE term = ?1", [term])?;
            Ok(removed > 0)
        })
    }

    // =========================================================================
    // Queue Snapshot
    // =========================================================================

    /// Load all queued files with their items, in queue order
    pub fn load_queue(&self) -> Result<Vec<(FileEntry, Vec<TranslationItem>)>> {
        self.db.execute(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT name, status, progress, total_items, completed_items, source_hash, target_language
                FROM queue_files ORDER BY position
                "#,
            )?;
            let entries = stmt
                .query_map([], |row| {
                    let name: String = row.get(0)?;
                    let status: String = row.get(1)?;
                    Ok(FileEntry {
                        status: parse_status(&status, FileStatus::Pending, &name),
                        name,
                        progress: row.get(2)?,
                        total_items: row.get::<_, i64>(3)? as usize,
                        completed_items: row.get::<_, i64>(4)? as usize,
                        source_hash: row.get(5)?,
                        target_language: row.get(6)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<FileEntry>>>()?;

            let mut queue = Vec::with_capacity(entries.len());
            for entry in entries {
                let items = Self::load_items_sync(conn, &entry.name)?;
                queue.push((entry, items));
            }
            Ok(queue)
        })
    }

    fn load_items_sync(conn: &Connection, file_name: &str) -> Result<Vec<TranslationItem>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT id, item_key, source_text, target_text, status, confidence, critique, is_edited
            FROM queue_items WHERE file_name = ?1 ORDER BY id
            "#,
        )?;
        let items = stmt
            .query_map([file_name], |row| {
                let id = row.get::<_, i64>(0)? as usize;
                let status: String = row.get(4)?;
                Ok(TranslationItem {
                    id,
                    key: row.get(1)?,
                    source: row.get(2)?,
                    target: row.get(3)?,
                    status: parse_status(
                        &status,
                        ItemStatus::Pending,
                        &format!("item {} of {}", id, file_name),
                    ),
                    confidence: row.get(5)?,
                    critique: row.get(6)?,
                    is_edited: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<TranslationItem>>>()?;
        Ok(items)
    }

    /// Replace a file and all its items, appending it to the queue if new
    pub fn save_file(&self, entry: &FileEntry, items: &[TranslationItem]) -> Result<()> {
        self.db.transaction(|tx| {
            let position: Option<i64> = tx
                .query_row(
                    "SELECT position FROM queue_files WHERE name = ?1",
                    [&entry.name],
                    |row| row.get(0),
                )
                .optional()?;
            let position = match position {
                Some(position) => position,
                None => tx.query_row(
                    "SELECT COALESCE(MAX(position), 0) + 1 FROM queue_files",
                    [],
                    |row| row.get(0),
                )?,
            };

            tx.execute("DELETE FROM queue_items WHERE file_name = ?1", [&entry.name])?;
            Self::upsert_entry_sync(tx, entry, Some(position))?;
            Self::upsert_items_sync(tx, &entry.name, items)?;
            Ok(())
        })
    }

    /// Update a file's counters and the given subset of its items
    pub fn save_progress(&self, entry: &FileEntry, items: &[&TranslationItem]) -> Result<()> {
        self.db.transaction(|tx| {
            Self::upsert_entry_sync(tx, entry, None)?;
            let mut stmt = tx.prepare(Self::UPSERT_ITEM_SQL)?;
            for item in items {
                Self::execute_item(&mut stmt, &entry.name, item)?;
            }
            Ok(())
        })
    }

    /// Remove a file and its items from the queue
    pub fn delete_file(&self, name: &str) -> Result<bool> {
        self.db.execute(|conn| {
            let removed = conn.execute("DELETE FROM queue_files WHERE name = ?1", [name])?;
            Ok(removed > 0)
        })
    }

    const UPSERT_ITEM_SQL: &'static str = r#"
        INSERT INTO queue_items (
            file_name, id, item_key, source_text, target_text, status, confidence, critique, is_edited
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(file_name, id) DO UPDATE SET
            target_text = excluded.target_text,
            status = excluded.status,
            confidence = excluded.confidence,
            critique = excluded.critique,
            is_edited = excluded.is_edited
    "#;

    fn execute_item(
        stmt: &mut rusqlite::Statement<'_>,
        file_name: &str,
        item: &TranslationItem,
    ) -> Result<()> {
        stmt.execute(params![
            file_name,
            item.id as i64,
            item.key,
            item.source,
            item.target,
            item.status.to_string(),
            item.confidence,
            item.critique,
            item.is_edited,
        ])?;
        Ok(())
    }

    fn upsert_items_sync(conn: &Connection, file_name: &str, items: &[TranslationItem]) -> Result<()> {
        let mut stmt = conn.prepare(Self::UPSERT_ITEM_SQL)?;
        for item in items {
            Self::execute_item(&mut stmt, file_name, item)?;
        }
        Ok(())
    }

    fn upsert_entry_sync(conn: &Connection, entry: &FileEntry, position: Option<i64>) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        match position {
            Some(position) => {
                conn.execute(
                    r#"
                    INSERT INTO queue_files (
                        name, position, status, progress, total_items, completed_items,
                        source_hash, target_language, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                    ON CONFLICT(name) DO UPDATE SET
                        status = excluded.status,
                        progress = excluded.progress,
                        total_items = excluded.total_items,
                        completed_items = excluded.completed_items,
                        source_hash = excluded.source_hash,
                        target_language = excluded.target_language,
                        updated_at = excluded.updated_at
                    "#,
                    params![
                        entry.name,
                        position,
                        entry.status.to_string(),
                        entry.progress,
                        entry.total_items as i64,
                        entry.completed_items as i64,
                        entry.source_hash,
                        entry.target_language,
                        now,
                    ],
                )?;
            }
            None => {
                conn.execute(
                    r#"
                    UPDATE queue_files SET
                        status = ?2, progress = ?3, total_items = ?4, completed_items = ?5, updated_at = ?6
                    WHERE name = ?1
                    "#,
                    params![
                        entry.name,
                        entry.status.to_string(),
                        entry.progress,
                        entry.total_items as i64,
                        entry.completed_items as i64,
                        now,
                    ],
                )?;
            }
        }
        Ok(())
    }
}
