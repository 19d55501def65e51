//! Store and retrieve the caller's career profile.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::context::ToolContext;
use crate::profile::{CareerTrack, CompanySize, Industry, Profile, ProfileService, Region};
use crate::tools::tool::{Tool, ToolError, ToolOutcome, parse_input, to_output};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Action {
    Get,
    Update,
    Append,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Input {
    user_id: String,
    action: Action,
    #[serde(default)]
    data: Option<Profile>,
}

#[derive(Debug, Serialize)]
struct Output {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    profile: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Output {
    fn ok(profile: Profile) -> Self {
        Self {
            success: true,
            profile: Some(profile),
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            profile: None,
            error: Some(error.into()),
        }
    }
}

/// JSON schema properties for every profile field.
pub fn profile_properties() -> Map<String, Value> {
    let number = || json!({ "type": "number" });
    let count = || json!({ "type": "integer", "minimum": 0 });
    let string = || json!({ "type": "string" });
    let strings = || json!({ "type": "array", "items": { "type": "string" } });

    let mut props = Map::new();
    props.insert("role".into(), json!({ "type": "string", "description": "Current job title or role" }));
    props.insert("yearsExperience".into(), json!({ "type": "number", "description": "Years of professional experience" }));
    props.insert("companyName".into(), string());
    props.insert("companySize".into(), json!({ "type": "string", "enum": CompanySize::ALL }));
    props.insert("careerTrack".into(), json!({ "type": "string", "enum": CareerTrack::ALL }));
    props.insert("immediateTeamSize".into(), count());
    props.insert("crossFunctionalTeams".into(), count());
    props.insert("directReports".into(), count());
    props.insert("industry".into(), json!({ "type": "string", "enum": Industry::ALL }));
    props.insert("region".into(), json!({ "type": "string", "enum": Region::ALL }));
    props.insert("companyEmployeeCount".into(), count());
    props.insert("companyFundingStage".into(), string());
    props.insert("companyKnownLeveling".into(), string());
    props.insert("selfReportedLevel".into(), string());
    props.insert("primaryTechStack".into(), strings());
    props.insert("scopeConfidence".into(), number());
    props.insert("trackConsistency".into(), json!({ "type": "boolean" }));
    props.insert("industryAlignmentScore".into(), number());
    props.insert("anomalyFlags".into(), strings());
    props.insert("enrichmentConfidence".into(), number());
    props
}

pub struct ProfilePersistenceTool {
    profiles: ProfileService,
}

impl ProfilePersistenceTool {
    pub fn new(profiles: ProfileService) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl Tool for ProfilePersistenceTool {
    fn name(&self) -> &str {
        "profilePersistenceTool"
    }

    fn description(&self) -> &str {
        "Store and retrieve enriched user profile information with contextual calibration signals. \
         Actions: get (retrieve profile), update (replace profile data), append (add to existing data)."
    }

    fn input_schema(&self) -> Value {
        let mut data = profile_properties();
        data.insert("enrichedAt".into(), json!({ "type": "string" }));
        json!({
            "type": "object",
            "properties": {
                "userId": { "type": "string", "description": "The user's ID" },
                "action": { "type": "string", "enum": ["get", "update", "append"] },
                "data": {
                    "type": "object",
                    "properties": data,
                    "additionalProperties": false,
                    "description": "Profile data to store (required for update/append)"
                }
            },
            "required": ["userId", "action"],
            "additionalProperties": false
        })
    }

    fn output_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "success": { "type": "boolean" },
                "profile": { "type": "object" },
                "error": { "type": "string" }
            },
            "required": ["success"]
        })
    }

    fn validate_input(&self, input: &Value) -> Result<(), ToolError> {
        parse_input::<Input>(input).map(|_| ())
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
        let input: Input = parse_input(&input)?;

        if input.user_id != ctx.user_id {
            tracing::warn!(
                requested = %input.user_id,
                caller = %ctx.user_id,
                "Profile access for another user refused"
            );
            return to_output(&Output::failed("userId does not match the authenticated user"));
        }

        let result = match (input.action, input.data) {
            (Action::Get, _) => self.profiles.get_latest(&input.user_id).await,
            (Action::Append, Some(data)) => self.profiles.append(&input.user_id, data).await,
            (Action::Update, Some(data)) => self.profiles.update(&input.user_id, data).await,
            (Action::Append | Action::Update, None) => {
                return to_output(&Output::failed("data is required for update and append"));
            }
        };

        match result {
            Ok(profile) => to_output(&Output::ok(profile)),
            Err(e) => {
                tracing::error!(user_id = %input.user_id, error = %e, "Profile persistence failed");
                to_output(&Output::failed(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Database, LibSqlBackend, Stores};
    use std::sync::Arc;

    async fn tool() -> ProfilePersistenceTool {
        let db = LibSqlBackend::new_memory().await.unwrap();
        ProfilePersistenceTool::new(ProfileService::new(Stores::new(Arc::new(db))))
    }

    fn ctx() -> ToolContext {
        ToolContext::new("alice", "t1", "alice", "call_1")
    }

    async fn run(tool: &ProfilePersistenceTool, input: Value) -> Value {
        match tool.execute(input, &ctx()).await.unwrap() {
            ToolOutcome::Output(v) => v,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn append_then_get() {
        let tool = tool().await;
        let out = run(
            &tool,
            json!({"userId": "alice", "action": "append", "data": {"role": "Engineer", "region": "EUROPE"}}),
        )
        .await;
        assert_eq!(out["success"], true);

        run(
            &tool,
            json!({"userId": "alice", "action": "append", "data": {"careerTrack": "IC"}}),
        )
        .await;

        let out = run(&tool, json!({"userId": "alice", "action": "get"})).await;
        assert_eq!(out["profile"]["role"], "Engineer");
        assert_eq!(out["profile"]["region"], "EUROPE");
        assert_eq!(out["profile"]["careerTrack"], "IC");
    }

    #[tokio::test]
    async fn get_sees_append_with_replica_configured() {
        let primary = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let replica = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let stores = Stores::new(primary).with_replica(replica);
        let tool = ProfilePersistenceTool::new(ProfileService::new(stores.clone()));

        run(
            &tool,
            json!({"userId": "alice", "action": "append", "data": {"role": "Engineer"}}),
        )
        .await;
        let out = run(&tool, json!({"userId": "alice", "action": "get"})).await;
        assert_eq!(out["success"], true);
        assert_eq!(out["profile"]["role"], "Engineer");

        let stored = stores.reader(false).get_profile("alice").await.unwrap();
        assert_eq!(stored.and_then(|p| p.role).as_deref(), Some("Engineer"));
    }

    #[tokio::test]
    async fn update_without_data_fails() {
        let tool = tool().await;
        let out = run(&tool, json!({"userId": "alice", "action": "update"})).await;
        assert_eq!(out["success"], false);
        assert!(out["error"].as_str().unwrap().contains("data is required"));
    }

    #[tokio::test]
    async fn other_user_is_refused() {
        let tool = tool().await;
        let out = run(&tool, json!({"userId": "mallory", "action": "get"})).await;
        assert_eq!(out["success"], false);
    }

    #[tokio::test]
    async fn invalid_enum_fails_validation() {
        let tool = tool().await;
        let err = tool
            .validate_input(&json!({"userId": "alice", "action": "append", "data": {"region": "MARS"}}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
        assert!(tool.validate_input(&json!({"userId": "alice", "action": "drop"})).is_err());
    }

    #[tokio::test]
    async fn headcounts_follow_declared_integer_schema() {
        let tool = tool().await;
        let props = profile_properties();
        assert_eq!(props["immediateTeamSize"], json!({"type": "integer", "minimum": 0}));
        assert_eq!(props["companyEmployeeCount"]["type"], "integer");

        tool.validate_input(&json!({
            "userId": "alice",
            "action": "append",
            "data": {"immediateTeamSize": 5.0, "companyEmployeeCount": 125.0}
        }))
        .unwrap();

        let err = tool
            .validate_input(&json!({
                "userId": "alice",
                "action": "append",
                "data": {"immediateTeamSize": -2}
            }))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParameters(_)));
    }
}
