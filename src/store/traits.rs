//! `Database` trait — single async interface for all persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::ui::UiMessage;
use crate::error::DatabaseError;
use crate::profile::model::Profile;
use crate::todos::model::Todo;

/// A conversation thread, scoped to the resource (user) that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadInfo {
    pub id: String,
    pub resource_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Persisted status of a suspended tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuspendedStatus {
    Suspended,
    Resumed,
    Errored,
}

impl SuspendedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Suspended => "suspended",
            Self::Resumed => "resumed",
            Self::Errored => "errored",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "resumed" => Self::Resumed,
            "errored" => Self::Errored,
            _ => Self::Suspended,
        }
    }
}

/// A tool call parked waiting for client input.
#[derive(Debug, Clone, PartialEq)]
pub struct SuspendedCallRecord {
    pub tool_call_id: String,
    pub thread_id: String,
    pub resource_id: String,
    /// Assistant message carrying the tool part.
    pub message_id: String,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub suspend_payload: serde_json::Value,
    pub status: SuspendedStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Cheap round trip used by the health check.
    async fn ping(&self) -> Result<(), DatabaseError>;

    // ── Todos ───────────────────────────────────────────────────────

    async fn create_todo(&self, title: &str) -> Result<Todo, DatabaseError>;

    async fn get_todo(&self, id: Uuid) -> Result<Option<Todo>, DatabaseError>;

    /// All todos, newest first.
    async fn list_todos(&self) -> Result<Vec<Todo>, DatabaseError>;

    /// Flip `completed`. `NotFound` if the todo does not exist.
    async fn toggle_todo(&self, id: Uuid) -> Result<Todo, DatabaseError>;

    /// `NotFound` if the todo does not exist.
    async fn delete_todo(&self, id: Uuid) -> Result<(), DatabaseError>;

    // ── Threads & messages ──────────────────────────────────────────

    /// Create the thread if missing, otherwise bump `updated_at`.
    async fn touch_thread(
        &self,
        thread_id: &str,
        resource_id: &str,
        title: Option<&str>,
    ) -> Result<ThreadInfo, DatabaseError>;

    async fn get_thread(
        &self,
        thread_id: &str,
        resource_id: &str,
    ) -> Result<Option<ThreadInfo>, DatabaseError>;

    /// Threads owned by `resource_id`, most recently updated first.
    async fn list_threads(&self, resource_id: &str) -> Result<Vec<ThreadInfo>, DatabaseError>;

    /// Delete a thread with its messages and suspended calls. Returns whether it existed.
    async fn delete_thread(&self, thread_id: &str, resource_id: &str) -> Result<bool, DatabaseError>;

    /// Insert a message, or replace its parts if the id already exists in the thread.
    async fn save_message(
        &self,
        thread_id: &str,
        resource_id: &str,
        message: &UiMessage,
    ) -> Result<(), DatabaseError>;

    /// Messages in insertion order. With `limit`, only the last `limit` messages.
    async fn list_messages(
        &self,
        thread_id: &str,
        resource_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<UiMessage>, DatabaseError>;

    // ── Suspended tool calls ────────────────────────────────────────

    async fn insert_suspended_call(&self, record: &SuspendedCallRecord) -> Result<(), DatabaseError>;

    async fn get_suspended_call(
        &self,
        thread_id: &str,
        resource_id: &str,
        tool_call_id: &str,
    ) -> Result<Option<SuspendedCallRecord>, DatabaseError>;

    /// Oldest call still in `suspended` status for the thread.
    async fn pending_suspended_call(
        &self,
        thread_id: &str,
        resource_id: &str,
    ) -> Result<Option<SuspendedCallRecord>, DatabaseError>;

    async fn resolve_suspended_call(
        &self,
        thread_id: &str,
        resource_id: &str,
        tool_call_id: &str,
        status: SuspendedStatus,
    ) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<Profile>, DatabaseError>;

    async fn put_profile(&self, user_id: &str, profile: &Profile) -> Result<(), DatabaseError>;
}
