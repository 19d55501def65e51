//! `/chat`: streamed agent turns and thread recall.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::HeaderValue;
use axum::http::header::HeaderName;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use super::ui::{UiChunk, UiMessage};
use crate::agent::{ResumeRequest, TurnRequest};
use crate::auth::{RequestContext, scopes};
use crate::error::ApiError;
use crate::server::AppState;

/// Header announcing the UI message stream protocol.
pub const UI_STREAM_HEADER: &str = "x-vercel-ai-ui-message-stream";
pub const DEFAULT_THREAD: &str = "default";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeBody {
    pub tool_call_id: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<UiMessage>,
    #[serde(default)]
    pub resume: Option<ResumeBody>,
}

impl ChatBody {
    /// `threadId`, else the chat `id`, else the default thread.
    pub fn thread(&self) -> String {
        self.thread_id
            .clone()
            .or_else(|| self.id.clone())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_THREAD.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallQuery {
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
}

/// Encode a chunk stream as SSE `data:` events ending with `[DONE]`.
pub fn ui_stream_response(rx: tokio::sync::mpsc::Receiver<UiChunk>) -> Response {
    let events = ReceiverStream::new(rx)
        .map(|chunk| Event::default().json_data(chunk))
        .chain(tokio_stream::once(Ok(Event::default().data("[DONE]"))));
    let sse = Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)));
    (
        [(HeaderName::from_static(UI_STREAM_HEADER), HeaderValue::from_static("v1"))],
        sse,
    )
        .into_response()
}

/// POST /chat
async fn post_chat(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<ChatBody>,
) -> Result<Response, ApiError> {
    ctx.require_scope(scopes::CHAT_WRITE)?;
    let agent = state.catalog.resolve(body.agent_id.as_deref())?;

    let request = TurnRequest {
        agent,
        thread_id: body.thread(),
        resource_id: ctx.user_id().to_string(),
        user_id: ctx.user_id().to_string(),
        messages: body.messages,
        resume: body.resume.map(|r| ResumeRequest {
            tool_call_id: r.tool_call_id,
            data: r.data,
        }),
    };
    let prepared = state.runner.prepare(request).await?;
    Ok(ui_stream_response(state.runner.stream(prepared)))
}

/// GET /chat
///
/// Recall failures are logged and answered with an empty list.
async fn get_chat(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(query): Query<RecallQuery>,
) -> Result<Json<Value>, ApiError> {
    ctx.require_scope(scopes::CHAT_READ)?;
    let thread_id = query
        .thread_id
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_THREAD.to_string());

    let limit = state
        .catalog
        .resolve(query.agent_id.as_deref())
        .ok()
        .and_then(|agent| agent.memory)
        .map(|m| m.last_messages);

    let messages = match state
        .runner
        .memory()
        .recall(&thread_id, ctx.user_id(), limit, ctx.force_primary)
        .await
    {
        Ok(messages) => messages,
        Err(e) => {
            warn!(thread = %thread_id, error = %e, "No previous messages recalled");
            Vec::new()
        }
    };
    Ok(Json(json!({ "messages": messages })))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/chat", post(post_chat).get(get_chat))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_resolution_order() {
        let body: ChatBody = serde_json::from_value(json!({"id": "chat1", "threadId": "t9"})).unwrap();
        assert_eq!(body.thread(), "t9");

        let body: ChatBody = serde_json::from_value(json!({"id": "chat1"})).unwrap();
        assert_eq!(body.thread(), "chat1");

        let body: ChatBody = serde_json::from_value(json!({"messages": []})).unwrap();
        assert_eq!(body.thread(), DEFAULT_THREAD);
    }

    #[test]
    fn resume_body_parses() {
        let body: ChatBody = serde_json::from_value(json!({
            "messages": [],
            "resume": {"toolCallId": "call_1", "data": {"city": "Rome"}}
        }))
        .unwrap();
        let resume = body.resume.unwrap();
        assert_eq!(resume.tool_call_id, "call_1");
        assert_eq!(resume.data["city"], "Rome");
    }
}
