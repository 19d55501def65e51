//! Which suspended tool call a client should prompt for.

use serde::Serialize;

use super::ui::{UiMessage, UiPart};

/// A prompt the client should show before the user can type again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInput {
    /// Input type; the suspended tool's name.
    #[serde(rename = "type")]
    pub input_type: String,
    /// Question from the suspend payload.
    pub message: String,
    pub tool_call_id: String,
    pub tool: String,
}

/// Whether any part of `message` carries an output for `tool_call_id`.
fn has_output(message: &UiMessage, tool_call_id: &str) -> bool {
    message.parts.iter().any(|part| match part {
        UiPart::Tool(tool) => tool.tool_call_id == tool_call_id && tool.has_output(),
        UiPart::Other(raw) => {
            let matches_id = raw.get("toolCallId").and_then(|v| v.as_str()) == Some(tool_call_id)
                || raw.pointer("/data/toolCallId").and_then(|v| v.as_str()) == Some(tool_call_id);
            let resolved = raw.get("output").is_some_and(|o| !o.is_null())
                || raw.get("state").and_then(|s| s.as_str()) == Some("output-available");
            matches_id && resolved
        }
        _ => false,
    })
}

/// First suspended call in `message` without an output.
///
/// Only payloads with a `question` produce a prompt. When a prompt is
/// already displayed it is kept.
pub fn pending_input(message: &UiMessage, current: Option<&PendingInput>) -> Option<PendingInput> {
    if let Some(current) = current {
        return Some(current.clone());
    }
    message.parts.iter().find_map(|part| {
        let UiPart::Suspended(data) = part else {
            return None;
        };
        let question = data.suspend_payload.get("question")?.as_str()?;
        if has_output(message, &data.tool_call_id) {
            return None;
        }
        Some(PendingInput {
            input_type: data.tool_name.clone(),
            message: question.to_string(),
            tool_call_id: data.tool_call_id.clone(),
            tool: data.tool_name.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ui::{SuspendedData, ToolPart, ToolPartState, UiRole};
    use serde_json::json;

    fn suspended(id: &str, question: &str) -> UiPart {
        UiPart::Suspended(SuspendedData {
            tool_call_id: id.into(),
            tool_name: "askLocationTool".into(),
            suspend_payload: json!({ "question": question }),
        })
    }

    fn tool(id: &str, output: Option<serde_json::Value>) -> UiPart {
        UiPart::Tool(ToolPart {
            tool_call_id: id.into(),
            tool_name: "askLocationTool".into(),
            state: if output.is_some() {
                ToolPartState::OutputAvailable
            } else {
                ToolPartState::InputAvailable
            },
            input: json!({}),
            output,
            error_text: None,
        })
    }

    #[test]
    fn first_unresolved_suspension_wins() {
        let mut msg = UiMessage::new("a1", UiRole::Assistant);
        msg.parts.push(tool("call_1", Some(json!({"city": "Oslo"}))));
        msg.parts.push(suspended("call_1", "Which city?"));
        msg.parts.push(tool("call_2", None));
        msg.parts.push(suspended("call_2", "Which other city?"));
        msg.parts.push(suspended("call_3", "And another?"));

        let pending = pending_input(&msg, None).unwrap();
        assert_eq!(pending.tool_call_id, "call_2");
        assert_eq!(pending.message, "Which other city?");
        assert_eq!(pending.input_type, "askLocationTool");
    }

    #[test]
    fn payload_without_question_is_ignored() {
        let mut msg = UiMessage::new("a1", UiRole::Assistant);
        msg.parts.push(UiPart::Suspended(SuspendedData {
            tool_call_id: "call_1".into(),
            tool_name: "askLocationTool".into(),
            suspend_payload: json!({ "hint": "city" }),
        }));
        assert!(pending_input(&msg, None).is_none());
    }

    #[test]
    fn displayed_prompt_is_kept() {
        let mut msg = UiMessage::new("a1", UiRole::Assistant);
        msg.parts.push(suspended("call_9", "New question?"));
        let shown = PendingInput {
            input_type: "askLocationTool".into(),
            message: "Old question?".into(),
            tool_call_id: "call_1".into(),
            tool: "askLocationTool".into(),
        };
        assert_eq!(pending_input(&msg, Some(&shown)), Some(shown));
    }

    #[test]
    fn serializes_type_field() {
        let mut msg = UiMessage::new("a1", UiRole::Assistant);
        msg.parts.push(suspended("call_1", "Which city?"));
        let value = serde_json::to_value(pending_input(&msg, None).unwrap()).unwrap();
        assert_eq!(value["type"], "askLocationTool");
        assert_eq!(value["toolCallId"], "call_1");
    }
}
