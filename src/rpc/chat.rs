//! `chat.*` procedures.

use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use super::{parse_input, to_value};
use crate::agent::{AgentDefinition, TurnRequest};
use crate::auth::{RequestContext, scopes};
use crate::chat::{UiChunk, UiMessage};
use crate::error::ApiError;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentInput {
    agent_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadsInput {
    agent_id: String,
    #[serde(default)]
    resource_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThreadInput {
    agent_id: String,
    thread_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageInput {
    agent_id: String,
    message: String,
    thread_id: String,
}

/// One event of a `chat.streamChat` subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum StreamEvent {
    Chunk { content: String },
    Finish { thread_id: String },
    Error { error: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk { .. })
    }
}

/// Text deltas become chunks; the first error or finish ends the stream.
pub fn stream_event(chunk: UiChunk, thread_id: &str) -> Option<StreamEvent> {
    match chunk {
        UiChunk::TextDelta { delta, .. } => Some(StreamEvent::Chunk { content: delta }),
        UiChunk::Finish => Some(StreamEvent::Finish {
            thread_id: thread_id.to_string(),
        }),
        UiChunk::Error { error_text } => Some(StreamEvent::Error { error: error_text }),
        _ => None,
    }
}

/// An agent that keeps thread memory.
fn memory_agent(state: &AppState, agent_id: &str) -> Result<Arc<AgentDefinition>, ApiError> {
    let agent = state.catalog.get(agent_id)?;
    agent.memory()?;
    Ok(agent)
}

fn turn(ctx: &RequestContext, agent: Arc<AgentDefinition>, input: MessageInput) -> TurnRequest {
    TurnRequest {
        agent,
        thread_id: input.thread_id,
        resource_id: ctx.user_id().to_string(),
        user_id: ctx.user_id().to_string(),
        messages: vec![UiMessage::user_text(Uuid::new_v4().to_string(), input.message)],
        resume: None,
    }
}

pub async fn call(
    state: &AppState,
    ctx: &RequestContext,
    procedure: &str,
    input: Value,
) -> Result<Value, ApiError> {
    match procedure {
        "getAgent" => {
            ctx.require_scope(scopes::CHAT_READ)?;
            let input: AgentInput = parse_input(input)?;
            let agent = state.catalog.get(&input.agent_id)?;
            Ok(json!({ "name": agent.summary() }))
        }
        "getMemory" => {
            ctx.require_scope(scopes::CHAT_READ)?;
            let input: AgentInput = parse_input(input)?;
            let memory = state.catalog.get(&input.agent_id)?.memory()?;
            Ok(json!({ "memory": memory }))
        }
        "getThreads" => {
            ctx.require_scope(scopes::CHAT_READ)?;
            let input: ThreadsInput = parse_input(input)?;
            if input.resource_id.as_deref().is_some_and(|r| r != ctx.user_id()) {
                return Err(ApiError::Forbidden(
                    "Threads can only be listed for the caller".to_string(),
                ));
            }
            memory_agent(state, &input.agent_id)?;
            let threads = state
                .runner
                .memory()
                .list_threads(ctx.user_id(), ctx.force_primary)
                .await?;
            to_value(threads)
        }
        "getThreadMessages" => {
            ctx.require_scope(scopes::CHAT_READ)?;
            let input: ThreadInput = parse_input(input)?;
            memory_agent(state, &input.agent_id)?;
            let messages = state
                .runner
                .memory()
                .recall(&input.thread_id, ctx.user_id(), None, ctx.force_primary)
                .await?;
            Ok(json!({ "messages": messages }))
        }
        "deleteThread" => {
            ctx.require_scope(scopes::CHAT_WRITE)?;
            let input: ThreadInput = parse_input(input)?;
            memory_agent(state, &input.agent_id)?;
            state
                .runner
                .memory()
                .delete_thread(&input.thread_id, ctx.user_id())
                .await?;
            Ok(json!({ "success": true }))
        }
        "sendMessage" => {
            ctx.require_scope(scopes::CHAT_WRITE)?;
            let input: MessageInput = parse_input(input)?;
            let agent = state.catalog.get(&input.agent_id)?;
            let thread_id = input.thread_id.clone();
            let prepared = state.runner.prepare(turn(ctx, agent, input)).await?;
            let summary = state.runner.generate(prepared).await?;
            Ok(json!({ "text": summary.text, "threadId": thread_id }))
        }
        other => Err(ApiError::not_found(format!("No procedure named chat.{other}"))),
    }
}

/// `chat.streamChat`: agent text as an SSE subscription.
///
/// Failures after the input is accepted are reported in-stream.
pub async fn stream_chat(
    state: &AppState,
    ctx: &RequestContext,
    input: Value,
) -> Result<Response, ApiError> {
    ctx.require_scope(scopes::CHAT_WRITE)?;
    let input: MessageInput = parse_input(input)?;
    let thread_id = input.thread_id.clone();

    let (tx, rx) = mpsc::channel(16);
    let prepared = match state.catalog.get(&input.agent_id) {
        Ok(agent) => state.runner.prepare(turn(ctx, agent, input)).await,
        Err(e) => Err(e),
    };
    match prepared {
        Ok(prepared) => {
            let mut chunks = state.runner.stream(prepared);
            tokio::spawn(async move {
                while let Some(chunk) = chunks.recv().await {
                    let Some(event) = stream_event(chunk, &thread_id) else {
                        continue;
                    };
                    let terminal = event.is_terminal();
                    if tx.send(event).await.is_err() || terminal {
                        break;
                    }
                }
            });
        }
        Err(e) => {
            let _ = tx.send(StreamEvent::Error { error: e.to_string() }).await;
        }
    }

    let events = ReceiverStream::new(rx).map(|event| Event::default().json_data(event));
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
        .into_response())
}
