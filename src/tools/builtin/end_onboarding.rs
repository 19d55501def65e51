//! Terminal onboarding tool. Its appearance in the stream tells the client
//! onboarding is done.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::profile_persistence::profile_properties;
use crate::context::ToolContext;
use crate::profile::model::whole_number;
use crate::profile::{CareerTrack, CompanySize, Industry, Region};
use crate::tools::tool::{Tool, ToolError, ToolOutcome, parse_input, to_output};

pub const COMPLETION_MESSAGE: &str = "Onboarding complete! Thank you for sharing your information.";

/// Collected onboarding data. Tier 1 fields are required.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OnboardingSummary {
    summary: String,
    role: String,
    years_experience: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    company_name: Option<String>,
    company_size: CompanySize,
    career_track: CareerTrack,
    #[serde(deserialize_with = "whole_number::required")]
    immediate_team_size: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    cross_functional_teams: Option<u32>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    direct_reports: Option<u32>,
    industry: Industry,
    region: Region,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "whole_number::optional"
    )]
    company_employee_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    company_funding_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    company_known_leveling: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    self_reported_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    primary_tech_stack: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope_confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    track_consistency: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    industry_alignment_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anomaly_flags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    enrichment_confidence: Option<f64>,
}

#[derive(Debug, Serialize)]
struct Output {
    success: bool,
    message: &'static str,
    data: OnboardingSummary,
}

pub struct EndOnboardingTool;

#[async_trait]
impl Tool for EndOnboardingTool {
    fn name(&self) -> &str {
        "endOnboardingTool"
    }

    fn description(&self) -> &str {
        "Call this immediately after saving the profile once all required information has been \
         collected. Signals that the onboarding conversation is complete."
    }

    fn input_schema(&self) -> Value {
        let mut props = profile_properties();
        props.insert(
            "summary".into(),
            json!({
                "type": "string",
                "description": "A comprehensive summary of all information collected during onboarding"
            }),
        );
        json!({
            "type": "object",
            "properties": props,
            "required": [
                "summary", "role", "yearsExperience", "companySize",
                "careerTrack", "immediateTeamSize", "industry", "region"
            ],
            "additionalProperties": false
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "success": { "type": "boolean" },
                "message": { "type": "string" },
                "data": { "type": "object" }
            },
            "required": ["success", "message", "data"]
        })
    }

    fn validate_input(&self, input: &Value) -> Result<(), ToolError> {
        parse_input::<OnboardingSummary>(input).map(|_| ())
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let data: OnboardingSummary = parse_input(&input)?;
        tracing::info!(user_id = %ctx.user_id, thread = %ctx.thread_id, "Onboarding completed");
        to_output(&Output {
            success: true,
            message: COMPLETION_MESSAGE,
            data,
        })
    }
}
