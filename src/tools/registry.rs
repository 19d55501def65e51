//! Name-indexed set of the tools agents may call.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::llm::ToolDefinition;
use crate::tools::tool::{Tool, ToolError};

/// Tools by name. Filled at startup, read by every turn.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

/// Suspend and resume schemas come as a pair or not at all.
fn check_schema_pair(tool: &dyn Tool) -> Result<(), ToolError> {
    let missing = match (tool.suspend_schema().is_some(), tool.resume_schema().is_some()) {
        (true, false) => "a suspend schema without a resume schema",
        (false, true) => "a resume schema without a suspend schema",
        _ => return Ok(()),
    };
    Err(ToolError::InvalidDeclaration(format!(
        "{} declares {missing}",
        tool.name()
    )))
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool during startup. Names are unique.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        check_schema_pair(tool.as_ref())?;
        let name = tool.name().to_string();
        let Ok(mut tools) = self.tools.try_write() else {
            return Err(ToolError::InvalidDeclaration(format!(
                "registry is in use; cannot add {name}"
            )));
        };
        if tools.contains_key(&name) {
            return Err(ToolError::InvalidDeclaration(format!(
                "{name} is already registered"
            )));
        }
        tracing::debug!(tool = %name, suspendable = tool.can_suspend(), "Tool registered");
        tools.insert(name, tool);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub fn count(&self) -> usize {
        self.tools.try_read().map(|t| t.len()).unwrap_or(0)
    }

    /// LLM definitions for an agent's tool list, in the agent's order.
    /// Unknown names are skipped.
    pub async fn definitions_for(&self, names: &[&str]) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        names
            .iter()
            .filter_map(|name| tools.get(*name))
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.input_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ToolContext;
    use crate::tools::tool::ToolOutcome;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct Probe {
        name: &'static str,
        suspend: bool,
        resume: bool,
    }

    fn probe(name: &'static str) -> Arc<Probe> {
        Arc::new(Probe {
            name,
            suspend: false,
            resume: false,
        })
    }

    #[async_trait]
    impl Tool for Probe {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "probe"
        }
        fn input_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }
        fn output_schema(&self) -> Value {
            json!({"type": "object"})
        }
        fn suspend_schema(&self) -> Option<Value> {
            self.suspend.then(|| json!({"type": "object"}))
        }
        fn resume_schema(&self) -> Option<Value> {
            self.resume.then(|| json!({"type": "object"}))
        }
        fn validate_input(&self, _input: &Value) -> Result<(), ToolError> {
            Ok(())
        }
        async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
            Ok(ToolOutcome::Output(json!({})))
        }
    }

    #[tokio::test]
    async fn suspend_without_resume_is_rejected() {
        let registry = ToolRegistry::new();
        let half = Arc::new(Probe {
            name: "askHalf",
            suspend: true,
            resume: false,
        });
        assert!(matches!(
            registry.register(half),
            Err(ToolError::InvalidDeclaration(_))
        ));
        assert!(registry.get("askHalf").await.is_none());

        let other = Arc::new(Probe {
            name: "resumeOnly",
            suspend: false,
            resume: true,
        });
        assert!(registry.register(other).is_err());

        let paired = Arc::new(Probe {
            name: "askPaired",
            suspend: true,
            resume: true,
        });
        registry.register(paired).unwrap();
        assert!(registry.get("askPaired").await.unwrap().can_suspend());
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let registry = ToolRegistry::new();
        registry.register(probe("fetchWeatherTool")).unwrap();
        assert!(registry.register(probe("fetchWeatherTool")).is_err());
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn definitions_follow_agent_order() {
        let registry = ToolRegistry::new();
        registry.register(probe("askLocationTool")).unwrap();
        registry.register(probe("fetchWeatherTool")).unwrap();

        let defs = registry
            .definitions_for(&["fetchWeatherTool", "missingTool", "askLocationTool"])
            .await;
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["fetchWeatherTool", "askLocationTool"]);
    }
}
