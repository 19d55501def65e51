//! Agent definitions and the catalog that resolves them by id.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::prompts;
use crate::error::AgentError;

pub const WEATHER_AGENT: &str = "weather-agent";
pub const PROFILE_AGENT: &str = "profile-agent";

/// Conversation memory settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    /// How many recent messages are recalled into each turn.
    pub last_messages: usize,
}

/// A configured agent: instructions, model, tools, memory.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    /// Alternate ids the agent answers to.
    pub aliases: Vec<String>,
    pub instructions: String,
    pub model: String,
    pub tools: Vec<String>,
    pub memory: Option<MemoryConfig>,
    /// Offer a pending suspended tool back to the model when a plain message arrives.
    pub auto_resume: bool,
}

/// Public view of an agent.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub model: String,
    pub tools: Vec<String>,
    pub memory_enabled: bool,
    pub auto_resume: bool,
}

impl AgentDefinition {
    pub fn weather(model: &str) -> Self {
        Self {
            id: WEATHER_AGENT.to_string(),
            name: "Weather Agent".to_string(),
            aliases: vec!["weatherAgent".to_string()],
            instructions: prompts::WEATHER_AGENT_INSTRUCTIONS.to_string(),
            model: model.to_string(),
            tools: vec!["askLocationTool".to_string(), "fetchWeatherTool".to_string()],
            memory: Some(MemoryConfig { last_messages: 10 }),
            auto_resume: true,
        }
    }

    pub fn profile(model: &str) -> Self {
        Self {
            id: PROFILE_AGENT.to_string(),
            name: "Profile Intelligence Agent".to_string(),
            aliases: vec!["profileAgent".to_string()],
            instructions: prompts::PROFILE_AGENT_INSTRUCTIONS.to_string(),
            model: model.to_string(),
            tools: vec![
                "endOnboardingTool".to_string(),
                "profilePersistenceTool".to_string(),
                "companyEnrichmentTool".to_string(),
            ],
            memory: Some(MemoryConfig { last_messages: 20 }),
            auto_resume: false,
        }
    }

    /// Memory settings, or `MemoryDisabled`.
    pub fn memory(&self) -> Result<MemoryConfig, AgentError> {
        self.memory.ok_or_else(|| AgentError::MemoryDisabled {
            id: self.id.clone(),
        })
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(String::as_str).collect()
    }

    pub fn summary(&self) -> AgentSummary {
        AgentSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            model: self.model.clone(),
            tools: self.tools.clone(),
            memory_enabled: self.memory.is_some(),
            auto_resume: self.auto_resume,
        }
    }
}

/// Agents by id and alias.
pub struct AgentCatalog {
    agents: HashMap<String, Arc<AgentDefinition>>,
    default_id: String,
}

impl AgentCatalog {
    pub fn new(default_id: impl Into<String>) -> Self {
        Self {
            agents: HashMap::new(),
            default_id: default_id.into(),
        }
    }

    /// The weather and profile agents, both on `model`.
    pub fn builtin(model: &str, default_id: impl Into<String>) -> Self {
        let mut catalog = Self::new(default_id);
        catalog.register(AgentDefinition::weather(model));
        catalog.register(AgentDefinition::profile(model));
        catalog
    }

    pub fn register(&mut self, agent: AgentDefinition) {
        let agent = Arc::new(agent);
        for alias in &agent.aliases {
            self.agents.insert(alias.clone(), Arc::clone(&agent));
        }
        self.agents.insert(agent.id.clone(), agent);
    }

    pub fn get(&self, id: &str) -> Result<Arc<AgentDefinition>, AgentError> {
        self.agents
            .get(id)
            .cloned()
            .ok_or_else(|| AgentError::NotFound { id: id.to_string() })
    }

    /// The named agent, or the default when `id` is absent.
    pub fn resolve(&self, id: Option<&str>) -> Result<Arc<AgentDefinition>, AgentError> {
        self.get(id.unwrap_or(&self.default_id))
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }

    /// Distinct agents, sorted by id.
    pub fn list(&self) -> Vec<Arc<AgentDefinition>> {
        let mut agents: Vec<_> = self
            .agents
            .iter()
            .filter(|(key, agent)| *key == &agent.id)
            .map(|(_, agent)| Arc::clone(agent))
            .collect();
        agents.sort_by(|a, b| a.id.cmp(&b.id));
        agents
    }
}
