/*!
 * Schema for the state database.
 *
 * Migrations are applied in order on open; `schema_version` holds the number
 * of the last one applied.
 */

use anyhow::{Context, Result, bail};
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension};

/// (version, DDL) pairs, ascending
const MIGRATIONS: &[(i32, &str)] = &[
    (
        1,
        r#"
    CREATE TABLE IF NOT EXISTS translation_memory (
        source_text TEXT PRIMARY KEY,
        translated_text TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS glossary (
        term TEXT PRIMARY KEY,
        translation TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS queue_files (
        name TEXT PRIMARY KEY,
        position INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        progress INTEGER NOT NULL DEFAULT 0,
        total_items INTEGER NOT NULL DEFAULT 0,
        completed_items INTEGER NOT NULL DEFAULT 0,
        source_hash TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_queue_files_position ON queue_files(position);

    CREATE TABLE IF NOT EXISTS queue_items (
        file_name TEXT NOT NULL REFERENCES queue_files(name) ON DELETE CASCADE,
        id INTEGER NOT NULL,
        item_key TEXT NOT NULL,
        source_text TEXT NOT NULL,
        target_text TEXT,
        status TEXT NOT NULL DEFAULT 'pending',
        confidence INTEGER,
        critique TEXT,
        is_edited INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (file_name, id)
    );
    "#,
    ),
    (
        2,
        // v1 memory rows carry no language and cannot be attributed to one
        r#"
    DROP TABLE translation_memory;
    CREATE TABLE translation_memory (
        target_language TEXT NOT NULL,
        source_text TEXT NOT NULL,
        translated_text TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (target_language, source_text)
    );

    ALTER TABLE queue_files ADD COLUMN target_language TEXT NOT NULL DEFAULT '';
    "#,
    ),
];

/// Highest version this build knows how to create
pub fn latest_version() -> i32 {
    MIGRATIONS.last().map(|(version, _)| *version).unwrap_or(0)
}

/// Brings the database up to `latest_version()`
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    // Per connection, not stored in the file
    conn.pragma_update(None, "foreign_keys", true)?;
    let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    debug!("SQLite journal mode: {}", mode);

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL,
            updated_at TEXT NOT NULL
        );",
    )?;

    let current = current_version(conn)?;
    let latest = latest_version();
    if current > latest {
        bail!(
            "State database is at schema v{} but this build only knows v{}; upgrade locbatch",
            current,
            latest
        );
    }
    if current == latest {
        debug!("Database schema is up to date (v{})", current);
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    for (version, ddl) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        info!("Applying database migration v{}", version);
        tx.execute_batch(ddl)
            .with_context(|| format!("Migration v{} failed", version))?;
    }
    tx.execute(
        "INSERT OR REPLACE INTO schema_version (id, version, updated_at) VALUES (1, ?1, datetime('now'))",
        [latest],
    )?;
    tx.commit()?;
    Ok(())
}

fn current_version(conn: &Connection) -> Result<i32> {
    let version = conn
        .query_row("SELECT version FROM schema_version WHERE id = 1", [], |row| row.get(0))
        .optional()
        .context("Failed to read schema version")?;
    Ok(version.unwrap_or(0))
}
