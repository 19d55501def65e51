//! Conversion from client UI messages to LLM chat messages.

use serde_json::{Value, json};

use super::ui::{ToolPart, ToolPartState, UiMessage, UiPart, UiRole};
use crate::llm::{ChatMessage, ToolCall};

/// Result the model sees for a call that is still waiting on the user.
fn pending_result(part: &ToolPart, payload: Option<&Value>) -> Value {
    json!({
        "status": "suspended",
        "message": format!("{} is awaiting user input", part.tool_name),
        "payload": payload.cloned().unwrap_or(Value::Null),
    })
}

fn tool_result(part: &ToolPart, message: &UiMessage) -> Value {
    match (&part.output, &part.error_text, part.state) {
        (Some(output), _, _) => output.clone(),
        (None, Some(error), _) => json!({ "error": error }),
        (None, None, ToolPartState::OutputError) => json!({ "error": "tool call failed" }),
        _ => {
            let payload = message.parts.iter().find_map(|p| match p {
                UiPart::Suspended(data) if data.tool_call_id == part.tool_call_id => {
                    Some(&data.suspend_payload)
                }
                _ => None,
            });
            pending_result(part, payload)
        }
    }
}

/// Flush accumulated assistant text and tool calls into chat messages.
fn flush(
    out: &mut Vec<ChatMessage>,
    text: &mut String,
    calls: &mut Vec<(ToolCall, Value)>,
) {
    if calls.is_empty() {
        if !text.is_empty() {
            out.push(ChatMessage::assistant(std::mem::take(text)));
        }
        return;
    }
    let (tool_calls, results): (Vec<_>, Vec<_>) = std::mem::take(calls).into_iter().unzip();
    let ids: Vec<String> = tool_calls.iter().map(|c| c.id.clone()).collect();
    out.push(ChatMessage::assistant_with_tool_calls(std::mem::take(text), tool_calls));
    for (id, result) in ids.into_iter().zip(results) {
        out.push(ChatMessage::tool_result(id, &result));
    }
}

/// Convert one UI message. Assistant messages split into alternating
/// assistant/tool-result messages in part order.
pub fn message_to_llm(message: &UiMessage) -> Vec<ChatMessage> {
    match message.role {
        UiRole::User => {
            let text = message.text();
            if text.is_empty() {
                Vec::new()
            } else {
                vec![ChatMessage::user(text)]
            }
        }
        UiRole::System => vec![ChatMessage::system(message.text())],
        UiRole::Assistant => {
            let mut out = Vec::new();
            let mut text = String::new();
            let mut calls: Vec<(ToolCall, Value)> = Vec::new();
            for part in &message.parts {
                match part {
                    UiPart::Text { text: t } => {
                        // Text after tool calls belongs to the next assistant turn.
                        if !calls.is_empty() {
                            flush(&mut out, &mut text, &mut calls);
                        }
                        text.push_str(t);
                    }
                    UiPart::Tool(tool) => {
                        let call = ToolCall {
                            id: tool.tool_call_id.clone(),
                            name: tool.tool_name.clone(),
                            arguments: tool.input.clone(),
                        };
                        calls.push((call, tool_result(tool, message)));
                    }
                    UiPart::StepStart | UiPart::Suspended(_) | UiPart::Other(_) => {}
                }
            }
            flush(&mut out, &mut text, &mut calls);
            out
        }
    }
}

/// Convert a conversation, oldest first.
pub fn to_llm_messages(messages: &[UiMessage]) -> Vec<ChatMessage> {
    messages.iter().flat_map(message_to_llm).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ui::SuspendedData;
    use crate::llm::Role;

    fn tool_part(id: &str, state: ToolPartState, output: Option<Value>) -> UiPart {
        UiPart::Tool(ToolPart {
            tool_call_id: id.into(),
            tool_name: "askLocationTool".into(),
            state,
            input: json!({}),
            output,
            error_text: None,
        })
    }

    #[test]
    fn user_text_becomes_user_message() {
        let msgs = to_llm_messages(&[UiMessage::user_text("u1", "hello")]);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, Role::User);
        assert_eq!(msgs[0].content, "hello");
    }

    #[test]
    fn assistant_tool_calls_are_paired_with_results() {
        let mut msg = UiMessage::new("a1", UiRole::Assistant);
        msg.parts.push(UiPart::Text { text: "Let me check. ".into() });
        msg.parts.push(tool_part("call_1", ToolPartState::OutputAvailable, Some(json!({"city": "Oslo"}))));
        msg.parts.push(UiPart::Text { text: "It is sunny.".into() });

        let out = message_to_llm(&msg);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].role, Role::Assistant);
        assert_eq!(out[0].tool_calls[0].id, "call_1");
        assert_eq!(out[1].role, Role::Tool);
        assert_eq!(out[1].tool_call_id.as_deref(), Some("call_1"));
        assert!(out[1].content.contains("Oslo"));
        assert_eq!(out[2].content, "It is sunny.");
    }

    #[test]
    fn suspended_call_gets_placeholder_result() {
        let mut msg = UiMessage::new("a1", UiRole::Assistant);
        msg.parts.push(tool_part("call_1", ToolPartState::InputAvailable, None));
        msg.parts.push(UiPart::Suspended(SuspendedData {
            tool_call_id: "call_1".into(),
            tool_name: "askLocationTool".into(),
            suspend_payload: json!({"question": "Which city?"}),
        }));

        let out = message_to_llm(&msg);
        assert_eq!(out.len(), 2);
        assert!(out[1].content.contains("suspended"));
        assert!(out[1].content.contains("Which city?"));
    }

    #[test]
    fn errored_call_reports_error_text() {
        let mut msg = UiMessage::new("a1", UiRole::Assistant);
        msg.parts.push(UiPart::Tool(ToolPart {
            tool_call_id: "call_2".into(),
            tool_name: "fetchWeatherTool".into(),
            state: ToolPartState::OutputError,
            input: json!({"location": "Atlantis"}),
            output: None,
            error_text: Some("not found".into()),
        }));
        let out = message_to_llm(&msg);
        assert!(out[1].content.contains("not found"));
    }
}
