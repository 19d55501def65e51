//! Tool-call state machine for the suspend/resume protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::{SuspendedCallRecord, SuspendedStatus};

/// Lifecycle state of a single tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCallState {
    /// Arguments known, not yet executed.
    InputAvailable,
    /// Parked waiting for client input.
    Suspended,
    /// Client data accepted; the tool is running again.
    Resumed,
    /// Finished with an output.
    OutputAvailable,
    /// Failed validation or execution.
    Errored,
}

impl ToolCallState {
    /// Check if this state allows transitioning to another state.
    pub fn can_transition_to(&self, target: ToolCallState) -> bool {
        use ToolCallState::*;

        matches!(
            (self, target),
            (InputAvailable, Suspended)
                | (InputAvailable, OutputAvailable)
                | (InputAvailable, Errored)
                | (Suspended, Resumed)
                | (Suspended, Errored)
                | (Resumed, OutputAvailable)
                | (Resumed, Errored)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::OutputAvailable | Self::Errored)
    }
}

impl std::fmt::Display for ToolCallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InputAvailable => "input-available",
            Self::Suspended => "suspended",
            Self::Resumed => "resumed",
            Self::OutputAvailable => "output-available",
            Self::Errored => "errored",
        };
        write!(f, "{s}")
    }
}

impl From<SuspendedStatus> for ToolCallState {
    fn from(status: SuspendedStatus) -> Self {
        match status {
            SuspendedStatus::Suspended => Self::Suspended,
            SuspendedStatus::Resumed => Self::Resumed,
            SuspendedStatus::Errored => Self::Errored,
        }
    }
}

/// Attempted an illegal state change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid tool call transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: ToolCallState,
    pub to: ToolCallState,
}

/// A tool call tracked through one turn.
#[derive(Debug, Clone)]
pub struct TrackedCall {
    pub tool_call_id: String,
    pub tool_name: String,
    pub input: Value,
    state: ToolCallState,
}

impl TrackedCall {
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>, input: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            input,
            state: ToolCallState::InputAvailable,
        }
    }

    /// Rehydrate a call from its stored suspension.
    pub fn from_record(record: &SuspendedCallRecord) -> Self {
        Self {
            tool_call_id: record.tool_call_id.clone(),
            tool_name: record.tool_name.clone(),
            input: record.input.clone(),
            state: record.status.into(),
        }
    }

    pub fn state(&self) -> ToolCallState {
        self.state
    }

    pub fn transition_to(&mut self, target: ToolCallState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(target) {
            return Err(InvalidTransition {
                from: self.state,
                to: target,
            });
        }
        tracing::debug!(
            tool_call_id = %self.tool_call_id,
            from = %self.state,
            to = %target,
            "Tool call transition"
        );
        self.state = target;
        Ok(())
    }

    /// Build the record persisted when this call suspends.
    pub fn suspension_record(
        &self,
        thread_id: &str,
        resource_id: &str,
        message_id: &str,
        suspend_payload: Value,
        now: DateTime<Utc>,
    ) -> SuspendedCallRecord {
        SuspendedCallRecord {
            tool_call_id: self.tool_call_id.clone(),
            thread_id: thread_id.to_string(),
            resource_id: resource_id.to_string(),
            message_id: message_id.to_string(),
            tool_name: self.tool_name.clone(),
            input: self.input.clone(),
            suspend_payload,
            status: SuspendedStatus::Suspended,
            created_at: now,
            resolved_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_transitions() {
        use ToolCallState::*;

        assert!(InputAvailable.can_transition_to(Suspended));
        assert!(InputAvailable.can_transition_to(OutputAvailable));
        assert!(Suspended.can_transition_to(Resumed));
        assert!(Resumed.can_transition_to(OutputAvailable));
        assert!(Suspended.can_transition_to(Errored));

        assert!(!Suspended.can_transition_to(OutputAvailable));
        assert!(!OutputAvailable.can_transition_to(Suspended));
        assert!(!Errored.can_transition_to(Resumed));
        assert!(!Resumed.can_transition_to(Suspended));
    }

    #[test]
    fn test_terminal_states() {
        assert!(ToolCallState::OutputAvailable.is_terminal());
        assert!(ToolCallState::Errored.is_terminal());
        assert!(!ToolCallState::Suspended.is_terminal());
    }

    #[test]
    fn tracked_call_rejects_skipping_resume() {
        let mut call = TrackedCall::new("call_1", "askLocationTool", json!({}));
        call.transition_to(ToolCallState::Suspended).unwrap();
        let err = call.transition_to(ToolCallState::OutputAvailable).unwrap_err();
        assert_eq!(err.from, ToolCallState::Suspended);
        call.transition_to(ToolCallState::Resumed).unwrap();
        call.transition_to(ToolCallState::OutputAvailable).unwrap();
        assert!(call.state().is_terminal());
    }

    #[test]
    fn record_round_trips_into_tracked_call() {
        let call = TrackedCall::new("call_9", "askLocationTool", json!({}));
        let record = call.suspension_record(
            "t1",
            "alice",
            "msg_1",
            json!({"question": "Where?"}),
            Utc::now(),
        );
        assert_eq!(record.status, SuspendedStatus::Suspended);
        let back = TrackedCall::from_record(&record);
        assert_eq!(back.state(), ToolCallState::Suspended);
        assert_eq!(back.tool_call_id, "call_9");
    }

    #[test]
    fn display_uses_wire_names() {
        assert_eq!(ToolCallState::OutputAvailable.to_string(), "output-available");
    }
}
