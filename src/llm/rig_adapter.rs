//! Bridge from rig's `CompletionModel` to [`LlmProvider`].

use std::time::Duration;

use async_trait::async_trait;
use rig::OneOrMany;
use rig::completion::message::{AssistantContent, Message, ToolResultContent, UserContent};
use rig::completion::{CompletionError, CompletionModel, ToolDefinition as RigToolDefinition};
use tracing::debug;

use crate::error::LlmError;
use crate::llm::provider::{
    ChatMessage, FinishReason, LlmProvider, Role, ToolCall, ToolCompletionRequest,
    ToolCompletionResponse,
};

/// Wraps any rig completion model.
pub struct RigAdapter<M> {
    model: M,
    model_name: String,
    provider: &'static str,
    timeout: Duration,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str, timeout: Duration) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
            timeout,
        }
    }
}

/// System messages become the preamble; the rest become rig history.
///
/// Tool results travel as user messages carrying a `ToolResult` part.
/// Assistant turns with neither text nor tool calls are dropped.
fn to_rig_messages(messages: Vec<ChatMessage>) -> (Option<String>, Vec<Message>) {
    let mut preamble: Vec<String> = Vec::new();
    let mut history = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => preamble.push(msg.content),
            Role::User => history.push(Message::user(msg.content)),
            Role::Tool => {
                let id = msg.tool_call_id.unwrap_or_default();
                history.push(Message::User {
                    content: OneOrMany::one(UserContent::tool_result(
                        id,
                        OneOrMany::one(ToolResultContent::text(msg.content)),
                    )),
                });
            }
            Role::Assistant => {
                let mut parts = Vec::new();
                if !msg.content.is_empty() {
                    parts.push(AssistantContent::text(msg.content));
                }
                for call in msg.tool_calls {
                    parts.push(AssistantContent::tool_call(call.id, call.name, call.arguments));
                }
                if let Ok(content) = OneOrMany::many(parts) {
                    history.push(Message::Assistant { id: None, content });
                }
            }
        }
    }

    let preamble = (!preamble.is_empty()).then(|| preamble.join("\n\n"));
    (preamble, history)
}

/// Collect text and tool calls from a rig choice.
fn from_rig_choice(choice: OneOrMany<AssistantContent>) -> (Option<String>, Vec<ToolCall>) {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for content in choice {
        match content {
            AssistantContent::Text(t) => text.push_str(&t.text),
            AssistantContent::ToolCall(call) => tool_calls.push(ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            }),
            _ => {}
        }
    }
    ((!text.is_empty()).then_some(text), tool_calls)
}

fn map_error(provider: &str, e: CompletionError) -> LlmError {
    let reason = e.to_string();
    if reason.contains("401") || reason.contains("Unauthorized") {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else if reason.contains("429") {
        LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason,
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + Send + Sync + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse, LlmError> {
        let (preamble, mut history) = to_rig_messages(request.messages);
        let prompt = history.pop().ok_or_else(|| LlmError::RequestFailed {
            provider: self.provider.to_string(),
            reason: "completion request has no messages".to_string(),
        })?;

        let tools = request
            .tools
            .into_iter()
            .map(|t| RigToolDefinition {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            })
            .collect::<Vec<_>>();

        let mut builder = self.model.completion_request(prompt).messages(history).tools(tools);
        if let Some(preamble) = preamble {
            builder = builder.preamble(preamble);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }

        debug!(provider = self.provider, model = %self.model_name, "Completion request");

        let response = tokio::time::timeout(self.timeout, builder.send())
            .await
            .map_err(|_| LlmError::RequestFailed {
                provider: self.provider.to_string(),
                reason: format!("timed out after {}s", self.timeout.as_secs()),
            })?
            .map_err(|e| map_error(self.provider, e))?;

        let usage = response.usage;
        let (content, tool_calls) = from_rig_choice(response.choice);
        let finish_reason = if tool_calls.is_empty() {
            FinishReason::Stop
        } else {
            FinishReason::ToolUse
        };

        Ok(ToolCompletionResponse {
            content,
            tool_calls,
            input_tokens: u32::try_from(usage.input_tokens).unwrap_or(u32::MAX),
            output_tokens: u32::try_from(usage.output_tokens).unwrap_or(u32::MAX),
            finish_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn system_messages_become_preamble() {
        let call = ToolCall {
            id: "call_1".into(),
            name: "askLocationTool".into(),
            arguments: json!({}),
        };
        let (preamble, history) = to_rig_messages(vec![
            ChatMessage::system("Be brief."),
            ChatMessage::system("The caller is alice."),
            ChatMessage::user("hi"),
            ChatMessage::assistant_with_tool_calls("", vec![call]),
            ChatMessage::tool_result("call_1", &json!({"city": "Lisbon"})),
        ]);

        assert_eq!(preamble.as_deref(), Some("Be brief.\n\nThe caller is alice."));
        assert_eq!(history.len(), 3);
        assert!(matches!(history[1], Message::Assistant { .. }));
        assert!(matches!(history[2], Message::User { .. }));
    }

    #[test]
    fn empty_assistant_turns_are_dropped() {
        let (preamble, history) =
            to_rig_messages(vec![ChatMessage::user("hi"), ChatMessage::assistant("")]);
        assert!(preamble.is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn choice_yields_text_and_tool_calls() {
        let choice = OneOrMany::many(vec![
            AssistantContent::text("Checking"),
            AssistantContent::tool_call("call_9", "fetchWeatherTool", json!({"location": "Oslo"})),
        ])
        .unwrap();
        let (text, calls) = from_rig_choice(choice);
        assert_eq!(text.as_deref(), Some("Checking"));
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].arguments["location"], "Oslo");
    }

    #[test]
    fn provider_errors_are_classified() {
        let err = map_error("openai", CompletionError::ProviderError("401 Unauthorized".into()));
        assert!(matches!(err, LlmError::AuthFailed { .. }));
        let err = map_error("openai", CompletionError::ProviderError("429 slow down".into()));
        assert!(matches!(err, LlmError::RateLimited { .. }));
        let err = map_error("openai", CompletionError::ProviderError("boom".into()));
        assert!(matches!(err, LlmError::RequestFailed { .. }));
    }
}
