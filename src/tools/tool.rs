//! Tool trait and outcome types.
//!
//! A tool declares four schemas: input, output, and optionally suspend and
//! resume (always as a pair). A tool with a suspend schema may park itself by
//! returning [`ToolOutcome::Suspend`]; the runner re-invokes it with
//! [`ToolContext::resume_data`] once the client answers.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::ToolContext;

/// Tool-layer errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
    #[error("Tool {0} not found")]
    NotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid resume data: {0}")]
    InvalidResume(String),

    #[error("Tool {0} cannot suspend")]
    SuspendNotAllowed(String),

    #[error("Invalid tool declaration: {0}")]
    InvalidDeclaration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// What a tool invocation produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    /// Finished; the value matches the output schema.
    Output(Value),
    /// Parked; the value matches the suspend schema and goes to the client.
    Suspend(Value),
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema the LLM sees for the call arguments.
    fn input_schema(&self) -> Value;

    fn output_schema(&self) -> Value;

    fn suspend_schema(&self) -> Option<Value> {
        None
    }

    fn resume_schema(&self) -> Option<Value> {
        None
    }

    /// Check call arguments before `execute` runs.
    fn validate_input(&self, input: &Value) -> Result<(), ToolError>;

    /// Check client resume data before the call is re-invoked.
    fn validate_resume(&self, _data: &Value) -> Result<(), ToolError> {
        Err(ToolError::InvalidResume(format!(
            "{} does not accept resume data",
            self.name()
        )))
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError>;

    fn can_suspend(&self) -> bool {
        self.suspend_schema().is_some()
    }
}

/// Deserialize tool arguments into their typed form.
pub fn parse_input<T: DeserializeOwned>(input: &Value) -> Result<T, ToolError> {
    // Models send `null` for tools with no arguments.
    let value = if input.is_null() {
        Value::Object(Default::default())
    } else {
        input.clone()
    };
    serde_json::from_value(value).map_err(|e| ToolError::InvalidParameters(e.to_string()))
}

/// Deserialize resume data into its typed form.
pub fn parse_resume<T: DeserializeOwned>(data: &Value) -> Result<T, ToolError> {
    serde_json::from_value(data.clone()).map_err(|e| ToolError::InvalidResume(e.to_string()))
}

/// Serialize a typed output.
pub fn to_output<T: serde::Serialize>(output: &T) -> Result<ToolOutcome, ToolError> {
    serde_json::to_value(output)
        .map(ToolOutcome::Output)
        .map_err(|e| ToolError::ExecutionFailed(format!("serialize output: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct CityInput {
        city: String,
    }

    #[test]
    fn parse_input_reports_schema_errors() {
        let ok: CityInput = parse_input(&json!({"city": "Lisbon"})).unwrap();
        assert_eq!(ok.city, "Lisbon");

        let err = parse_input::<CityInput>(&json!({"town": "Lisbon"})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }

    #[test]
    fn parse_resume_uses_resume_error() {
        let err = parse_resume::<CityInput>(&json!({"city": 42})).unwrap_err();
        assert!(matches!(err, ToolError::InvalidResume(_)));
    }
}
