//! Connection setup and schema migrations for the logbook database.

use std::path::Path;

use rusqlite::Connection;

use crate::config;

use super::DatabaseError;

/// Schema steps in order. Each file ends by recording its own version.
const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    include_str!("../../resources/migrations/001_initial.sql"),
)];

/// Open (or create) the logbook at its default location under the app
/// data directory.
pub fn open_logbook() -> Result<Connection, DatabaseError> {
    let path = config::database_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    open_database(&path)
}

/// Open a logbook file and bring its schema up to date.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    tracing::debug!(path = %path.display(), "Opening logbook");
    prepare(Connection::open(path)?)
}

/// Fresh logbook that lives only as long as the connection.
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    prepare(Connection::open_in_memory()?)
}

fn prepare(conn: Connection) -> Result<Connection, DatabaseError> {
    // Condition rows go away with their filter through ON DELETE CASCADE,
    // which SQLite only honours with foreign keys switched on.
    conn.pragma_update(None, "foreign_keys", true)?;
    run_migrations(&conn)?;
    Ok(conn)
}

pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    apply_migrations(conn, MIGRATIONS)
}

/// Apply every step newer than the stored version, each in its own
/// transaction, so a failing step leaves the schema at the previous version.
fn apply_migrations(conn: &Connection, steps: &[(i64, &str)]) -> Result<(), DatabaseError> {
    let current = schema_version(conn)?;

    for &(version, sql) in steps.iter().filter(|(version, _)| *version > current) {
        tracing::info!(from = current, to = version, "Migrating logbook schema");
        let failed = |e: rusqlite::Error| DatabaseError::MigrationFailed {
            version,
            reason: e.to_string(),
        };
        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(sql).map_err(failed)?;
        tx.commit().map_err(failed)?;
    }

    Ok(())
}

/// Highest applied schema version; 0 for a database without a schema.
pub fn schema_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let has_table: bool = conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version')",
        [],
        |row| row.get(0),
    )?;
    if !has_table {
        return Ok(0);
    }
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(version.unwrap_or(0))
}

/// Number of user tables, excluding SQLite internals.
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}
