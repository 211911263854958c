//! Database schema migrations.
//!
//! Migrations are versioned and applied automatically when opening the
//! database, before the core services answer any request. Changes are
//! additive only: new columns arrive with defaults, existing data is
//! backfilled in the same transaction. The `schema_version` table tracks
//! the current version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations.
///
/// # Errors
/// Returns an error if a migration fails; the failing migration is
/// rolled back in full.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;
    let current = get_schema_version(conn);

    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    if current < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Current schema version, 0 for a fresh database.
pub(crate) fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// Migration v1: baseline schema (tables created by `Store::open`).
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    set_schema_version(conn, 1)
}

/// Migration v2: finalize tracking and day breakdowns.
///
/// Adds to day_ledger:
/// - finalized: whether penalties for the date have been computed
/// - details: JSON breakdown of completions and penalties
///
/// Also creates the habit_skips table recording habit occurrences the
/// planner purged before they were completed.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE day_ledger ADD COLUMN finalized INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE day_ledger ADD COLUMN details TEXT;

         CREATE TABLE IF NOT EXISTS habit_skips (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id    INTEGER NOT NULL,
            date       TEXT NOT NULL,
            habit_type TEXT NOT NULL DEFAULT 'skill',
            UNIQUE(item_id, date)
         );
         CREATE INDEX IF NOT EXISTS idx_habit_skips_date ON habit_skips(date);",
    )?;

    // Rows with a recorded penalty predate the finalized flag.
    tx.execute(
        "UPDATE day_ledger SET finalized = 1 WHERE points_penalty > 0",
        [],
    )?;

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (2)", [])?;
    tx.commit()
}

/// Migration v3: roll/tracker bookkeeping on the settings row.
///
/// - pending_roll: auto-roll fired but the roll has not succeeded yet
/// - active_item_id: the single active item, maintained transactionally
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(
        "ALTER TABLE settings ADD COLUMN pending_roll INTEGER NOT NULL DEFAULT 0;
         ALTER TABLE settings ADD COLUMN active_item_id INTEGER;",
    )?;

    // Backfill from item status for databases carrying an active item.
    tx.execute(
        "UPDATE settings
         SET active_item_id = (SELECT id FROM items WHERE status = 'active' LIMIT 1)",
        [],
    )?;

    tx.execute("DELETE FROM schema_version", [])?;
    tx.execute("INSERT INTO schema_version (version) VALUES (3)", [])?;
    tx.commit()
}
