//! Thread memory: messages and suspended calls scoped by `(thread, resource)`.

use crate::chat::ui::{UiMessage, UiRole};
use crate::error::DatabaseError;
use crate::store::{Stores, SuspendedCallRecord, SuspendedStatus, ThreadInfo};

const TITLE_CHARS: usize = 80;

/// Thread-scoped view over the message and suspension tables.
#[derive(Clone)]
pub struct ThreadMemory {
    stores: Stores,
}

/// Thread title derived from the first user message.
fn title_for(message: &UiMessage) -> Option<String> {
    if message.role != UiRole::User {
        return None;
    }
    let text = message.text();
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(TITLE_CHARS).collect())
}

impl ThreadMemory {
    pub fn new(stores: Stores) -> Self {
        Self { stores }
    }

    /// Most recent messages, oldest first. `None` recalls the whole thread.
    pub async fn recall(
        &self,
        thread_id: &str,
        resource_id: &str,
        last_messages: Option<usize>,
        force_primary: bool,
    ) -> Result<Vec<UiMessage>, DatabaseError> {
        self.stores
            .reader(force_primary)
            .list_messages(thread_id, resource_id, last_messages)
            .await
    }

    /// Find one message anywhere in the thread.
    pub async fn find_message(
        &self,
        thread_id: &str,
        resource_id: &str,
        message_id: &str,
    ) -> Result<Option<UiMessage>, DatabaseError> {
        let messages = self
            .stores
            .writer()
            .list_messages(thread_id, resource_id, None)
            .await?;
        Ok(messages.into_iter().find(|m| m.id == message_id))
    }

    /// Insert or replace a message and bump the thread.
    pub async fn save(
        &self,
        thread_id: &str,
        resource_id: &str,
        message: &UiMessage,
    ) -> Result<(), DatabaseError> {
        let db = self.stores.writer();
        let title = title_for(message);
        db.touch_thread(thread_id, resource_id, title.as_deref()).await?;
        db.save_message(thread_id, resource_id, message).await
    }

    pub async fn list_threads(
        &self,
        resource_id: &str,
        force_primary: bool,
    ) -> Result<Vec<ThreadInfo>, DatabaseError> {
        self.stores.reader(force_primary).list_threads(resource_id).await
    }

    pub async fn delete_thread(&self, thread_id: &str, resource_id: &str) -> Result<bool, DatabaseError> {
        let deleted = self.stores.writer().delete_thread(thread_id, resource_id).await?;
        if deleted {
            tracing::info!(thread = %thread_id, resource = %resource_id, "Thread deleted");
        }
        Ok(deleted)
    }

    // Suspension state is read from the primary: it was usually written
    // moments ago by the previous turn.

    pub async fn pending_suspension(
        &self,
        thread_id: &str,
        resource_id: &str,
    ) -> Result<Option<SuspendedCallRecord>, DatabaseError> {
        self.stores
            .writer()
            .pending_suspended_call(thread_id, resource_id)
            .await
    }

    /// The call if it is still suspended.
    pub async fn suspended_call(
        &self,
        thread_id: &str,
        resource_id: &str,
        tool_call_id: &str,
    ) -> Result<Option<SuspendedCallRecord>, DatabaseError> {
        Ok(self
            .stores
            .writer()
            .get_suspended_call(thread_id, resource_id, tool_call_id)
            .await?
            .filter(|r| r.status == SuspendedStatus::Suspended))
    }

    pub async fn record_suspension(&self, record: &SuspendedCallRecord) -> Result<(), DatabaseError> {
        self.stores.writer().insert_suspended_call(record).await
    }

    pub async fn resolve(
        &self,
        record: &SuspendedCallRecord,
        status: SuspendedStatus,
    ) -> Result<(), DatabaseError> {
        self.stores
            .writer()
            .resolve_suspended_call(
                &record.thread_id,
                &record.resource_id,
                &record.tool_call_id,
                status,
            )
            .await
    }
}
