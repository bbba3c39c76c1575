//! Versioned schema for the `assets` table.
//!
//! Applied versions are recorded in `schema_migrations`. Each step runs in
//! its own transaction together with its bookkeeping row. Column additions
//! are skipped when the column is already there, which is the case for
//! tables created by the external creation flow.

use rusqlite::{params, Connection};

use super::error::DatabaseError;

enum Step {
    Sql(&'static str),
    /// `ALTER TABLE .. ADD COLUMN`, a no-op when `column` exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
        sql: &'static str,
    },
}

struct Migration {
    version: u32,
    name: &'static str,
    step: Step,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_assets",
        step: Step::Sql(include_str!("sql/001_create_assets.sql")),
    },
    Migration {
        version: 2,
        name: "add_failure_reason",
        step: Step::AddColumn {
            table: "assets",
            column: "failure_reason",
            sql: include_str!("sql/002_add_failure_reason.sql"),
        },
    },
    // SQLite cannot change a column default in place, so this one rebuilds
    // the table. Rows inserted with only the creation-flow columns get
    // their timestamps from the defaults.
    Migration {
        version: 3,
        name: "default_timestamps",
        step: Step::Sql(include_str!("sql/003_default_timestamps.sql")),
    },
];

/// Highest version the binary knows about.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Highest version recorded as applied.
pub fn current_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

/// Brings the schema up to [`latest_version`].
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let current = current_version(conn)?;
    if current > latest_version() {
        log::warn!(
            "Database schema v{} is newer than this worker (v{})",
            current,
            latest_version()
        );
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration).map_err(|e| match e {
            DatabaseError::Sqlite(source) => DatabaseError::Migration {
                version: migration.version,
                reason: source.to_string(),
            },
            other => other,
        })?;
    }

    Ok(())
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;

    match &migration.step {
        Step::Sql(sql) => tx.execute_batch(sql)?,
        Step::AddColumn { table, column, sql } => {
            if has_column(&tx, table, column)? {
                log::info!(
                    "Schema v{}: {}.{} already present",
                    migration.version,
                    table,
                    column
                );
            } else {
                tx.execute_batch(sql)?;
            }
        }
    }

    tx.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
        params![migration.version, migration.name],
    )?;
    tx.commit()?;

    log::info!("Applied schema v{} ({})", migration.version, migration.name);
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let found: u32 = conn.query_row(
        "SELECT COUNT(*) FROM pragma_table_info(?1) WHERE name = ?2",
        params![table, column],
        |r| r.get(0),
    )?;
    Ok(found > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(conn: &Connection) -> u32 {
        conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_fresh_database_reaches_latest_version() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(applied(&conn), MIGRATIONS.len() as u32);
        assert!(has_column(&conn, "assets", "failure_reason").unwrap());
        assert!(has_column(&conn, "assets", "output_url").unwrap());
    }

    #[test]
    fn test_rerun_applies_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        assert_eq!(applied(&conn), MIGRATIONS.len() as u32);
    }

    #[test]
    fn test_table_from_creation_flow_is_adopted() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE assets (
                id TEXT PRIMARY KEY NOT NULL,
                asset_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'processing',
                original_document_url TEXT NOT NULL,
                original_document_name TEXT NOT NULL DEFAULT '',
                audience TEXT,
                tone TEXT,
                compliance_text TEXT,
                output_url TEXT,
                completed_at TEXT,
                failure_reason TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );",
        )
        .unwrap();

        run_all(&conn).unwrap();

        assert_eq!(current_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn test_rebuild_keeps_existing_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .unwrap();
        for migration in MIGRATIONS.iter().filter(|m| m.version < 3) {
            apply(&conn, migration).unwrap();
        }
        conn.execute(
            "INSERT INTO assets (id, asset_type, status, original_document_url, output_url,
             completed_at, created_at, updated_at)
             VALUES ('old', 'video', 'completed', 'doc://old', 'https://cdn/x.json',
             '2026-01-02T00:00:00Z', '2026-01-01T00:00:00Z', '2026-01-02T00:00:00Z')",
            [],
        )
        .unwrap();

        run_all(&conn).unwrap();

        let (status, created): (String, String) = conn
            .query_row(
                "SELECT status, created_at FROM assets WHERE id = 'old'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(status, "completed");
        assert_eq!(created, "2026-01-01T00:00:00Z");
        assert!(has_column(&conn, "assets", "failure_reason").unwrap());
    }

    #[test]
    fn test_timestamps_default_on_minimal_insert() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        conn.execute(
            "INSERT INTO assets (id, asset_type, status, original_document_url)
             VALUES ('x1', 'job-aid', 'processing', 'doc://x')",
            [],
        )
        .unwrap();

        let (created, updated): (String, String) = conn
            .query_row(
                "SELECT created_at, updated_at FROM assets WHERE id = 'x1'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert!(created.ends_with('Z'), "{}", created);
        assert_eq!(created.len(), "2026-01-01T00:00:00.000Z".len());
        assert!(!updated.is_empty());
    }

    #[test]
    fn test_has_column_on_unknown_table() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(!has_column(&conn, "nope", "id").unwrap());
    }
}
