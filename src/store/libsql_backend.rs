//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local files, in-memory databases, remote libSQL servers and
//! embedded replicas of a remote server.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::chat::ui::{UiMessage, UiPart, UiRole};
use crate::error::DatabaseError;
use crate::profile::model::Profile;
use crate::store::migrations;
use crate::store::traits::{Database, SuspendedCallRecord, SuspendedStatus, ThreadInfo};
use crate::todos::model::Todo;

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Connect to a remote libSQL server and run migrations.
    pub async fn new_remote(url: &str, auth_token: &str) -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to connect to {url}: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(url, "Remote database connected");
        Ok(backend)
    }

    /// Open a local embedded replica of a remote libSQL server.
    ///
    /// Writes are forwarded to the remote primary and applied locally before
    /// they return, so the replica always reads its own writes. Writes made
    /// elsewhere arrive on the next sync.
    pub async fn new_remote_replica(
        path: &Path,
        url: &str,
        auth_token: &str,
        sync_interval: Duration,
    ) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create replica directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_remote_replica(path, url.to_string(), auth_token.to_string())
            .read_your_writes(true)
            .sync_interval(sync_interval)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open embedded replica: {e}")))?;
        db.sync()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Initial replica sync failed: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), url, "Embedded replica opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Canonical write format. Fixed width so text ordering matches time ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T, what: &str) -> Result<String, DatabaseError> {
    serde_json::to_string(value)
        .map_err(|e| DatabaseError::Serialization(format!("{what}: {e}")))
}

const TODO_COLUMNS: &str = "id, title, completed, created_at";

fn row_to_todo(row: &libsql::Row) -> Result<Todo, DatabaseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("todo id: {e}")))?;
    let id = Uuid::parse_str(&id_str)
        .map_err(|e| DatabaseError::Serialization(format!("todo id {id_str}: {e}")))?;
    let created: String = row.get(3).unwrap_or_default();
    Ok(Todo {
        id,
        title: row.get(1).unwrap_or_default(),
        completed: row.get::<i64>(2).unwrap_or(0) != 0,
        created_at: parse_datetime(&created),
    })
}

const THREAD_COLUMNS: &str = "id, resource_id, title, created_at, updated_at";

fn row_to_thread(row: &libsql::Row) -> Result<ThreadInfo, DatabaseError> {
    let created: String = row.get(3).unwrap_or_default();
    let updated: String = row.get(4).unwrap_or_default();
    Ok(ThreadInfo {
        id: row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("thread id: {e}")))?,
        resource_id: row.get(1).unwrap_or_default(),
        title: row.get(2).ok(),
        created_at: parse_datetime(&created),
        updated_at: parse_datetime(&updated),
    })
}

fn row_to_message(row: &libsql::Row) -> Result<UiMessage, DatabaseError> {
    let id: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("message id: {e}")))?;
    let role_str: String = row.get(1).unwrap_or_default();
    let role = UiRole::parse(&role_str).ok_or_else(|| {
        DatabaseError::Serialization(format!("message {id}: unknown role {role_str}"))
    })?;
    let parts_json: String = row.get(2).unwrap_or_else(|_| "[]".to_string());
    let parts: Vec<UiPart> = serde_json::from_str(&parts_json)
        .map_err(|e| DatabaseError::Serialization(format!("message {id} parts: {e}")))?;
    let metadata = row
        .get::<String>(3)
        .ok()
        .and_then(|m| serde_json::from_str(&m).ok());
    Ok(UiMessage {
        id,
        role,
        parts,
        metadata,
    })
}

const SUSPENDED_COLUMNS: &str = "tool_call_id, thread_id, resource_id, message_id, tool_name, input, suspend_payload, status, created_at, resolved_at";

fn row_to_suspended(row: &libsql::Row) -> Result<SuspendedCallRecord, DatabaseError> {
    let parse_json = |idx: i32, what: &str| -> Result<serde_json::Value, DatabaseError> {
        let raw: String = row.get(idx).unwrap_or_else(|_| "null".to_string());
        serde_json::from_str(&raw).map_err(|e| DatabaseError::Serialization(format!("{what}: {e}")))
    };
    let status: String = row.get(7).unwrap_or_default();
    let created: String = row.get(8).unwrap_or_default();
    let resolved: Option<String> = row.get(9).ok();
    Ok(SuspendedCallRecord {
        tool_call_id: row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("tool_call_id: {e}")))?,
        thread_id: row.get(1).unwrap_or_default(),
        resource_id: row.get(2).unwrap_or_default(),
        message_id: row.get(3).unwrap_or_default(),
        tool_name: row.get(4).unwrap_or_default(),
        input: parse_json(5, "input")?,
        suspend_payload: parse_json(6, "suspend_payload")?,
        status: SuspendedStatus::parse(&status),
        created_at: parse_datetime(&created),
        resolved_at: resolved.as_deref().map(parse_datetime),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::init_schema(self.conn()).await
    }

    async fn ping(&self) -> Result<(), DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT 1", ())
            .await
            .map_err(|e| DatabaseError::Query(format!("ping: {e}")))?;
        match rows.next().await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(DatabaseError::Query("ping: no row".to_string())),
            Err(e) => Err(DatabaseError::Query(format!("ping: {e}"))),
        }
    }

    // ── Todos ───────────────────────────────────────────────────────

    async fn create_todo(&self, title: &str) -> Result<Todo, DatabaseError> {
        let todo = Todo::new(title);
        self.conn()
            .execute(
                "INSERT INTO todos (id, title, completed, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    todo.id.to_string(),
                    todo.title.clone(),
                    0i64,
                    format_datetime(&todo.created_at),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("create_todo: {e}")))?;

        debug!(todo_id = %todo.id, "Todo created");
        Ok(todo)
    }

    async fn get_todo(&self, id: Uuid) -> Result<Option<Todo>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1"),
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_todo: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_todo(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_todo: {e}"))),
        }
    }

    async fn list_todos(&self) -> Result<Vec<Todo>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {TODO_COLUMNS} FROM todos ORDER BY created_at DESC, rowid DESC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_todos: {e}")))?;

        let mut todos = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            todos.push(row_to_todo(&row)?);
        }
        Ok(todos)
    }

    async fn toggle_todo(&self, id: Uuid) -> Result<Todo, DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE todos SET completed = 1 - completed WHERE id = ?1",
                params![id.to_string()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("toggle_todo: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "todo".to_string(),
                id: id.to_string(),
            });
        }
        self.get_todo(id).await?.ok_or_else(|| DatabaseError::NotFound {
            entity: "todo".to_string(),
            id: id.to_string(),
        })
    }

    async fn delete_todo(&self, id: Uuid) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute("DELETE FROM todos WHERE id = ?1", params![id.to_string()])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_todo: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "todo".to_string(),
                id: id.to_string(),
            });
        }
        debug!(todo_id = %id, "Todo deleted");
        Ok(())
    }

    // ── Threads & messages ──────────────────────────────────────────

    async fn touch_thread(
        &self,
        thread_id: &str,
        resource_id: &str,
        title: Option<&str>,
    ) -> Result<ThreadInfo, DatabaseError> {
        let now = format_datetime(&Utc::now());
        self.conn()
            .execute(
                "INSERT INTO threads (id, resource_id, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(resource_id, id) DO UPDATE SET
                    updated_at = excluded.updated_at,
                    title = COALESCE(threads.title, excluded.title)",
                params![thread_id, resource_id, opt_text(title), now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("touch_thread: {e}")))?;

        self.get_thread(thread_id, resource_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "thread".to_string(),
                id: thread_id.to_string(),
            })
    }

    async fn get_thread(
        &self,
        thread_id: &str,
        resource_id: &str,
    ) -> Result<Option<ThreadInfo>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = ?1 AND resource_id = ?2"),
                params![thread_id, resource_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_thread: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_thread(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_thread: {e}"))),
        }
    }

    async fn list_threads(&self, resource_id: &str) -> Result<Vec<ThreadInfo>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {THREAD_COLUMNS} FROM threads WHERE resource_id = ?1 ORDER BY updated_at DESC"
                ),
                params![resource_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_threads: {e}")))?;

        let mut threads = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            threads.push(row_to_thread(&row)?);
        }
        Ok(threads)
    }

    async fn delete_thread(&self, thread_id: &str, resource_id: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "DELETE FROM thread_messages WHERE thread_id = ?1 AND resource_id = ?2",
            params![thread_id, resource_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("delete_thread messages: {e}")))?;
        conn.execute(
            "DELETE FROM suspended_calls WHERE thread_id = ?1 AND resource_id = ?2",
            params![thread_id, resource_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("delete_thread suspended: {e}")))?;
        let changed = conn
            .execute(
                "DELETE FROM threads WHERE id = ?1 AND resource_id = ?2",
                params![thread_id, resource_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_thread: {e}")))?;

        debug!(thread = thread_id, resource = resource_id, existed = changed > 0, "Thread deleted");
        Ok(changed > 0)
    }

    async fn save_message(
        &self,
        thread_id: &str,
        resource_id: &str,
        message: &UiMessage,
    ) -> Result<(), DatabaseError> {
        let parts = to_json(&message.parts, "message parts")?;
        let metadata = match &message.metadata {
            Some(m) => Some(to_json(m, "message metadata")?),
            None => None,
        };
        self.conn()
            .execute(
                "INSERT INTO thread_messages (id, thread_id, resource_id, role, parts, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(resource_id, thread_id, id) DO UPDATE SET
                    parts = excluded.parts,
                    metadata = excluded.metadata",
                params![
                    message.id.clone(),
                    thread_id,
                    resource_id,
                    message.role.as_str(),
                    parts,
                    opt_text(metadata.as_deref()),
                    format_datetime(&Utc::now()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("save_message: {e}")))?;
        Ok(())
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        resource_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<UiMessage>, DatabaseError> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut rows = self
            .conn()
            .query(
                "SELECT id, role, parts, metadata FROM (
                    SELECT seq, id, role, parts, metadata FROM thread_messages
                    WHERE thread_id = ?1 AND resource_id = ?2
                    ORDER BY seq DESC LIMIT ?3
                 ) ORDER BY seq ASC",
                params![thread_id, resource_id, limit],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_messages: {e}")))?;

        let mut messages = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            messages.push(row_to_message(&row)?);
        }
        Ok(messages)
    }

    // ── Suspended tool calls ────────────────────────────────────────

    async fn insert_suspended_call(&self, record: &SuspendedCallRecord) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                &format!(
                    "INSERT INTO suspended_calls ({SUSPENDED_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    record.tool_call_id.clone(),
                    record.thread_id.clone(),
                    record.resource_id.clone(),
                    record.message_id.clone(),
                    record.tool_name.clone(),
                    to_json(&record.input, "suspended input")?,
                    to_json(&record.suspend_payload, "suspend payload")?,
                    record.status.as_str(),
                    format_datetime(&record.created_at),
                    opt_text(record.resolved_at.as_ref().map(format_datetime).as_deref()),
                ],
            )
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE") {
                    DatabaseError::Constraint(format!(
                        "tool call {} already recorded",
                        record.tool_call_id
                    ))
                } else {
                    DatabaseError::Query(format!("insert_suspended_call: {msg}"))
                }
            })?;

        debug!(tool_call_id = %record.tool_call_id, tool = %record.tool_name, "Suspended call recorded");
        Ok(())
    }

    async fn get_suspended_call(
        &self,
        thread_id: &str,
        resource_id: &str,
        tool_call_id: &str,
    ) -> Result<Option<SuspendedCallRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SUSPENDED_COLUMNS} FROM suspended_calls
                     WHERE thread_id = ?1 AND resource_id = ?2 AND tool_call_id = ?3"
                ),
                params![thread_id, resource_id, tool_call_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_suspended_call: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_suspended(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_suspended_call: {e}"))),
        }
    }

    async fn pending_suspended_call(
        &self,
        thread_id: &str,
        resource_id: &str,
    ) -> Result<Option<SuspendedCallRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SUSPENDED_COLUMNS} FROM suspended_calls
                     WHERE thread_id = ?1 AND resource_id = ?2 AND status = 'suspended'
                     ORDER BY created_at ASC LIMIT 1"
                ),
                params![thread_id, resource_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("pending_suspended_call: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_suspended(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("pending_suspended_call: {e}"))),
        }
    }

    async fn resolve_suspended_call(
        &self,
        thread_id: &str,
        resource_id: &str,
        tool_call_id: &str,
        status: SuspendedStatus,
    ) -> Result<(), DatabaseError> {
        let changed = self
            .conn()
            .execute(
                "UPDATE suspended_calls SET status = ?1, resolved_at = ?2
                 WHERE thread_id = ?3 AND resource_id = ?4 AND tool_call_id = ?5",
                params![
                    status.as_str(),
                    format_datetime(&Utc::now()),
                    thread_id,
                    resource_id,
                    tool_call_id,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("resolve_suspended_call: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "suspended tool call".to_string(),
                id: tool_call_id.to_string(),
            });
        }
        Ok(())
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError> {
        let mut rows = self
            .conn()
            .query("SELECT data FROM profiles WHERE user_id = ?1", params![user_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let data: String = row
                    .get(0)
                    .map_err(|e| DatabaseError::Query(format!("get_profile row: {e}")))?;
                let profile = serde_json::from_str(&data)
                    .map_err(|e| DatabaseError::Serialization(format!("profile {user_id}: {e}")))?;
                Ok(Some(profile))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile: {e}"))),
        }
    }

    async fn put_profile(&self, user_id: &str, profile: &Profile) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO profiles (user_id, data, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                params![
                    user_id,
                    to_json(profile, "profile")?,
                    format_datetime(&Utc::now()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("put_profile: {e}")))?;

        debug!(user_id, "Profile saved");
        Ok(())
    }
}
