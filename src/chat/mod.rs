//! Chat transport: UI message model, conversion for the LLM, and `/chat`.

pub mod convert;
pub mod pending;
pub mod routes;
pub mod ui;

pub use pending::{PendingInput, pending_input};
pub use ui::{SuspendedData, ToolPart, ToolPartState, UiChunk, UiMessage, UiPart, UiRole};
