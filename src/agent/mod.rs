//! Agent runtime: definitions, thread memory, suspend/resume, and the turn runner.

pub mod definition;
pub mod memory;
pub mod prompts;
pub mod runner;
pub mod suspend;

pub use definition::{
    AgentCatalog, AgentDefinition, AgentSummary, MemoryConfig, PROFILE_AGENT, WEATHER_AGENT,
};
pub use memory::ThreadMemory;
pub use runner::{AgentRunner, PreparedTurn, ResumeRequest, TurnRequest, TurnSummary};
pub use suspend::{InvalidTransition, ToolCallState, TrackedCall};
