//! Ask the user which city they want weather for.
//!
//! First call suspends with a question; the resumed call returns the city
//! the client supplied.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::context::ToolContext;
use crate::tools::tool::{Tool, ToolError, ToolOutcome, parse_input, parse_resume, to_output};

pub const QUESTION: &str = "What city do you want to know the weather for?";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Input {}

#[derive(Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct Resume {
    city: String,
}

#[derive(Debug, Serialize)]
struct Output {
    city: String,
}

pub struct AskLocationTool;

#[async_trait]
impl Tool for AskLocationTool {
    fn name(&self) -> &str {
        "askLocationTool"
    }

    fn description(&self) -> &str {
        "Ask the user for a city if none is provided, then resume with their answer."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "city": { "type": "string" } },
            "required": ["city"]
        })
    }

    fn suspend_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": { "question": { "type": "string" } },
            "required": ["question"]
        }))
    }

    fn resume_schema(&self) -> Option<Value> {
        Some(json!({
            "type": "object",
            "properties": { "city": { "type": "string", "description": "City name" } },
            "required": ["city"]
        }))
    }

    fn validate_input(&self, input: &Value) -> Result<(), ToolError> {
        parse_input::<Input>(input).map(|_| ())
    }

    fn validate_resume(&self, data: &Value) -> Result<(), ToolError> {
        let resume: Resume = parse_resume(data)?;
        if resume.city.trim().is_empty() {
            return Err(ToolError::InvalidResume("city must not be empty".to_string()));
        }
        Ok(())
    }

    async fn execute(&self, _input: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        match &ctx.resume_data {
            None => Ok(ToolOutcome::Suspend(json!({ "question": QUESTION }))),
            Some(data) => {
                let resume: Resume = parse_resume(data)?;
                to_output(&Output {
                    city: resume.city.trim().to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_suspends_with_question() {
        let outcome = AskLocationTool
            .execute(json!({}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(outcome, ToolOutcome::Suspend(json!({ "question": QUESTION })));
    }

    #[tokio::test]
    async fn resumed_call_returns_city() {
        let ctx = ToolContext::default().with_resume_data(json!({"city": " Lisbon "}));
        let outcome = AskLocationTool.execute(json!({}), &ctx).await.unwrap();
        assert_eq!(outcome, ToolOutcome::Output(json!({"city": "Lisbon"})));
    }

    #[test]
    fn resume_validation() {
        assert!(AskLocationTool.validate_resume(&json!({"city": "Oslo"})).is_ok());
        assert!(AskLocationTool.validate_resume(&json!({"city": ""})).is_err());
        assert!(AskLocationTool.validate_resume(&json!({"town": "Oslo"})).is_err());
    }

    #[test]
    fn declares_suspend_pair() {
        assert!(AskLocationTool.can_suspend());
        assert!(AskLocationTool.resume_schema().is_some());
        assert!(AskLocationTool.validate_input(&Value::Null).is_ok());
    }
}
