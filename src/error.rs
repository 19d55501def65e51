//! Error types for the Humblebrag API.

use std::time::Duration;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

pub use crate::tools::ToolError;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Script exhausted: no response left for call {call}")]
    ScriptExhausted { call: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Credential verification errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingCredentials,

    #[error("Invalid bearer token")]
    InvalidToken,

    #[error("Missing required scope: {scope}")]
    MissingScope { scope: String },
}

/// Agent runtime errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent {id} not found")]
    NotFound { id: String },

    #[error("Agent {id} has no memory configured")]
    MemoryDisabled { id: String },

    #[error("No suspended tool call with id {tool_call_id} in this thread")]
    UnknownToolCall { tool_call_id: String },

    #[error("Invalid chat request: {0}")]
    InvalidRequest(String),

    #[error("Agent exceeded {max} steps without finishing")]
    MaxStepsExceeded { max: usize },

    #[error(transparent)]
    InvalidTransition(#[from] crate::agent::InvalidTransition),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Error surfaced to HTTP and RPC callers.
///
/// Every variant maps to a stable machine-readable code; `Internal` keeps the
/// underlying error for logging.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{message}")]
    NotFound { code: &'static str, message: String },

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    MethodNotSupported(String),

    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ApiError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            code: "NOT_FOUND",
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>, source: impl Into<Error>) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(Box::new(source.into())),
        }
    }

    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound { code, .. } => code,
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::MethodNotSupported(_) => "METHOD_NOT_SUPPORTED",
            Self::Internal { .. } => "INTERNAL_SERVER_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::MethodNotSupported(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log internal failures; client errors stay quiet.
    pub fn log(&self) {
        if let Self::Internal { message, source } = self {
            match source {
                Some(source) => tracing::error!(error = %source, "{message}"),
                None => tracing::error!("{message}"),
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingCredentials | AuthError::InvalidToken => {
                Self::Unauthorized("Unauthorized".to_string())
            }
            AuthError::MissingScope { .. } => Self::Forbidden(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { ref entity, .. } if entity == "todo" => Self::NotFound {
                code: "TODO_NOT_FOUND",
                message: e.to_string(),
            },
            DatabaseError::NotFound { .. } => Self::not_found(e.to_string()),
            other => Self::internal("Database operation failed", other),
        }
    }
}

impl From<AgentError> for ApiError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::NotFound { .. } => Self::not_found(e.to_string()),
            AgentError::MemoryDisabled { .. }
            | AgentError::UnknownToolCall { .. }
            | AgentError::InvalidRequest(_) => Self::BadRequest(e.to_string()),
            AgentError::Database(db) => db.into(),
            other => Self::internal("Agent run failed", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status();
        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        (status, Json(body)).into_response()
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
