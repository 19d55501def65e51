//! Client-facing message model and stream chunks.
//!
//! Mirrors the UI message format spoken by the web client: a message is an
//! ordered list of parts, and a turn is streamed as a sequence of chunks that
//! the client folds into parts.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Part type carrying a suspended tool call's payload.
pub const SUSPENDED_PART_TYPE: &str = "data-tool-call-suspended";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiRole {
    System,
    User,
    Assistant,
}

impl UiRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(Self::System),
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// A message as the client sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiMessage {
    pub id: String,
    pub role: UiRole,
    #[serde(default)]
    pub parts: Vec<UiPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl UiMessage {
    pub fn new(id: impl Into<String>, role: UiRole) -> Self {
        Self {
            id: id.into(),
            role,
            parts: Vec::new(),
            metadata: None,
        }
    }

    pub fn user_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        let mut message = Self::new(id, UiRole::User);
        message.parts.push(UiPart::Text { text: text.into() });
        message
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                UiPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    pub fn tool_part(&self, tool_call_id: &str) -> Option<&ToolPart> {
        self.parts.iter().find_map(|p| match p {
            UiPart::Tool(tool) if tool.tool_call_id == tool_call_id => Some(tool),
            _ => None,
        })
    }

    pub fn tool_part_mut(&mut self, tool_call_id: &str) -> Option<&mut ToolPart> {
        self.parts.iter_mut().find_map(|p| match p {
            UiPart::Tool(tool) if tool.tool_call_id == tool_call_id => Some(tool),
            _ => None,
        })
    }
}

/// Lifecycle of a tool part as rendered by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolPartState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

/// A tool invocation inside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub state: ToolPartState,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_text: Option<String>,
}

impl ToolPart {
    pub fn has_output(&self) -> bool {
        self.output.is_some() || self.state == ToolPartState::OutputAvailable
    }
}

/// Payload of a `data-tool-call-suspended` part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendedData {
    pub tool_call_id: String,
    pub tool_name: String,
    pub suspend_payload: Value,
}

/// One part of a [`UiMessage`].
///
/// Tool parts arrive either as `dynamic-tool` (with `toolName`) or as
/// `tool-<name>`; both fold into [`UiPart::Tool`] and are written back as
/// `dynamic-tool`. Part types this server does not interpret are kept
/// verbatim in [`UiPart::Other`].
#[derive(Debug, Clone, PartialEq)]
pub enum UiPart {
    Text { text: String },
    Tool(ToolPart),
    Suspended(SuspendedData),
    StepStart,
    Other(Value),
}

#[derive(Serialize, Deserialize)]
#[serde(tag = "type")]
enum WirePart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "dynamic-tool")]
    DynamicTool(ToolPart),
    #[serde(rename = "data-tool-call-suspended")]
    Suspended { data: SuspendedData },
    #[serde(rename = "step-start")]
    StepStart,
}

impl Serialize for UiPart {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text { text } => WirePart::Text { text: text.clone() }.serialize(serializer),
            Self::Tool(tool) => WirePart::DynamicTool(tool.clone()).serialize(serializer),
            Self::Suspended(data) => WirePart::Suspended { data: data.clone() }.serialize(serializer),
            Self::StepStart => WirePart::StepStart.serialize(serializer),
            Self::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for UiPart {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        let part_type = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default();

        // Statically-typed tool parts carry the tool name in the type tag.
        if let Some(name) = part_type.strip_prefix("tool-") {
            if let Some(obj) = value.as_object_mut() {
                obj.entry("toolName").or_insert_with(|| Value::String(name.to_string()));
                obj.insert("type".into(), Value::String("dynamic-tool".into()));
            }
        }

        match part_type.as_str() {
            "text" | "dynamic-tool" | "step-start" | SUSPENDED_PART_TYPE => {}
            t if t.starts_with("tool-") => {}
            _ => return Ok(Self::Other(value)),
        }

        let wire: WirePart = serde_json::from_value(value).map_err(serde::de::Error::custom)?;
        Ok(match wire {
            WirePart::Text { text } => Self::Text { text },
            WirePart::DynamicTool(tool) => Self::Tool(tool),
            WirePart::Suspended { data } => Self::Suspended(data),
            WirePart::StepStart => Self::StepStart,
        })
    }
}

/// One event of a streamed turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum UiChunk {
    Start {
        message_id: String,
    },
    StartStep,
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: Value,
        dynamic: bool,
    },
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
        dynamic: bool,
    },
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
        dynamic: bool,
    },
    DataToolCallSuspended {
        data: SuspendedData,
    },
    FinishStep,
    Finish,
    Error {
        error_text: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn static_tool_parts_fold_into_tool() {
        let part: UiPart = serde_json::from_value(json!({
            "type": "tool-askLocationTool",
            "toolCallId": "call_1",
            "state": "output-available",
            "input": {},
            "output": {"data": {"city": "Lisbon"}}
        }))
        .unwrap();
        let UiPart::Tool(tool) = part else {
            panic!("expected tool part");
        };
        assert_eq!(tool.tool_name, "askLocationTool");
        assert!(tool.has_output());
    }

    #[test]
    fn unknown_parts_survive_round_trip() {
        let raw = json!({"type": "reasoning", "text": "thinking"});
        let part: UiPart = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(part, UiPart::Other(raw.clone()));
        assert_eq!(serde_json::to_value(&part).unwrap(), raw);
    }

    #[test]
    fn suspended_part_wire_shape() {
        let part = UiPart::Suspended(SuspendedData {
            tool_call_id: "call_1".into(),
            tool_name: "askLocationTool".into(),
            suspend_payload: json!({"question": "Which city?"}),
        });
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], SUSPENDED_PART_TYPE);
        assert_eq!(value["data"]["toolCallId"], "call_1");
        assert_eq!(value["data"]["suspendPayload"]["question"], "Which city?");
    }

    #[test]
    fn chunk_tags_and_field_names() {
        let chunk = UiChunk::ToolOutputError {
            tool_call_id: "call_2".into(),
            error_text: "nope".into(),
            dynamic: true,
        };
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(value["type"], "tool-output-error");
        assert_eq!(value["toolCallId"], "call_2");
        assert_eq!(value["errorText"], "nope");

        let value = serde_json::to_value(UiChunk::StartStep).unwrap();
        assert_eq!(value, json!({"type": "start-step"}));
    }

    #[test]
    fn message_text_joins_text_parts() {
        let mut message = UiMessage::user_text("m1", "Hello ");
        message.parts.push(UiPart::StepStart);
        message.parts.push(UiPart::Text { text: "there".into() });
        assert_eq!(message.text(), "Hello there");
    }
}
