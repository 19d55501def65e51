//! Version-tracked database migrations for the libSQL backend.
//!
//! Each migration has a version number and SQL. `init_schema()` checks the
//! current version and applies only the new ones, in order.

use libsql::{Connection, params};
use tracing::info;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// All migrations in order. Add new versions to the end.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "todos",
        sql: r#"
            CREATE TABLE IF NOT EXISTS todos (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_todos_created ON todos(created_at);
        "#,
    },
    Migration {
        version: 2,
        name: "agent_memory",
        sql: r#"
            CREATE TABLE IF NOT EXISTS threads (
                id TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                title TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (resource_id, id)
            );
            CREATE INDEX IF NOT EXISTS idx_threads_updated ON threads(resource_id, updated_at);

            CREATE TABLE IF NOT EXISTS thread_messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                role TEXT NOT NULL,
                parts TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL,
                UNIQUE (resource_id, thread_id, id)
            );
            CREATE INDEX IF NOT EXISTS idx_thread_messages_thread
                ON thread_messages(resource_id, thread_id, seq);
        "#,
    },
    Migration {
        version: 3,
        name: "suspended_calls",
        sql: r#"
            CREATE TABLE IF NOT EXISTS suspended_calls (
                tool_call_id TEXT NOT NULL,
                thread_id TEXT NOT NULL,
                resource_id TEXT NOT NULL,
                message_id TEXT NOT NULL,
                tool_name TEXT NOT NULL,
                input TEXT NOT NULL,
                suspend_payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'suspended',
                created_at TEXT NOT NULL,
                resolved_at TEXT,
                PRIMARY KEY (resource_id, thread_id, tool_call_id)
            );
            CREATE INDEX IF NOT EXISTS idx_suspended_calls_status
                ON suspended_calls(resource_id, thread_id, status);
        "#,
    },
    Migration {
        version: 4,
        name: "profiles",
        sql: r#"
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
    },
];

/// Apply every migration newer than the recorded version.
pub async fn init_schema(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("create _migrations: {e}")))?;

    let current = current_version(conn).await?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        conn.execute_batch(migration.sql).await.map_err(|e| {
            DatabaseError::Migration(format!(
                "V{} ({}) failed: {e}",
                migration.version, migration.name
            ))
        })?;
        conn.execute(
            "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )
        .await
        .map_err(|e| DatabaseError::Migration(format!("record V{}: {e}", migration.version)))?;
        info!(version = migration.version, name = migration.name, "Applied migration");
    }

    Ok(())
}

/// Highest applied migration version, 0 for a fresh database.
pub async fn current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("read version: {e}")))?;

    match rows.next().await {
        Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0)),
        Ok(None) => Ok(0),
        Err(e) => Err(DatabaseError::Migration(format!("read version: {e}"))),
    }
}

/// Latest version known to this build.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}
