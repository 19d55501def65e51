//! tRPC-compatible procedure endpoint.
//!
//! `GET /trpc/{procedure}?input=<json>` runs queries and subscriptions,
//! `POST /trpc/{procedure}` with a JSON body runs mutations. Results are
//! wrapped as `{"result":{"data":…}}`, failures as
//! `{"error":{"code","message"}}` with the matching HTTP status.

pub mod chat;
pub mod todos;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::auth::RequestContext;
use crate::error::ApiError;
use crate::server::AppState;

/// How a procedure is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcedureKind {
    Query,
    Mutation,
    Subscription,
}

/// Every procedure the endpoint serves.
pub const PROCEDURES: &[(&str, ProcedureKind)] = &[
    ("todos.getAll", ProcedureKind::Query),
    ("todos.create", ProcedureKind::Mutation),
    ("chat.getAgent", ProcedureKind::Query),
    ("chat.getMemory", ProcedureKind::Query),
    ("chat.getThreads", ProcedureKind::Query),
    ("chat.getThreadMessages", ProcedureKind::Query),
    ("chat.deleteThread", ProcedureKind::Mutation),
    ("chat.sendMessage", ProcedureKind::Mutation),
    ("chat.streamChat", ProcedureKind::Subscription),
];

pub fn procedure_kind(name: &str) -> Option<ProcedureKind> {
    PROCEDURES
        .iter()
        .find(|(procedure, _)| *procedure == name)
        .map(|(_, kind)| *kind)
}

/// Error response in the tRPC envelope.
pub struct RpcError(pub ApiError);

impl From<ApiError> for RpcError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let err = self.0;
        err.log();
        let body = json!({
            "error": {
                "code": err.code(),
                "message": err.to_string(),
            }
        });
        (err.status(), Json(body)).into_response()
    }
}

pub fn success(data: impl serde::Serialize) -> Response {
    Json(json!({ "result": { "data": data } })).into_response()
}

pub fn to_value(data: impl serde::Serialize) -> Result<Value, ApiError> {
    serde_json::to_value(data).map_err(|e| ApiError::internal("Failed to encode result", e))
}

/// Deserialize procedure input. A missing input reads as `null`.
pub fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ApiError> {
    serde_json::from_value(input).map_err(|e| ApiError::BadRequest(format!("Invalid input: {e}")))
}

#[derive(Debug, Default, Deserialize)]
pub struct RpcQuery {
    #[serde(default)]
    pub input: Option<String>,
}

fn query_input(query: &RpcQuery) -> Result<Value, ApiError> {
    match query.input.as_deref() {
        None | Some("") => Ok(Value::Null),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("Input is not valid JSON: {e}"))),
    }
}

fn body_input(body: &Bytes) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Body is not valid JSON: {e}")))
}

fn lookup(name: &str, allowed: &[ProcedureKind]) -> Result<ProcedureKind, ApiError> {
    let kind = procedure_kind(name)
        .ok_or_else(|| ApiError::not_found(format!("No procedure named {name}")))?;
    if allowed.contains(&kind) {
        Ok(kind)
    } else {
        Err(ApiError::MethodNotSupported(format!(
            "Procedure {name} does not support this method"
        )))
    }
}

async fn call(
    state: &AppState,
    ctx: &RequestContext,
    name: &str,
    input: Value,
) -> Result<Response, ApiError> {
    match name.split_once('.') {
        Some(("todos", procedure)) => todos::call(state, ctx, procedure, input).await.map(success),
        Some(("chat", "streamChat")) => chat::stream_chat(state, ctx, input).await,
        Some(("chat", procedure)) => chat::call(state, ctx, procedure, input).await.map(success),
        _ => Err(ApiError::not_found(format!("No procedure named {name}"))),
    }
}

/// GET /trpc/{procedure}
async fn handle_get(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(name): Path<String>,
    Query(query): Query<RpcQuery>,
) -> Result<Response, RpcError> {
    lookup(&name, &[ProcedureKind::Query, ProcedureKind::Subscription])?;
    let input = query_input(&query)?;
    Ok(call(&state, &ctx, &name, input).await?)
}

/// POST /trpc/{procedure}
async fn handle_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Response, RpcError> {
    lookup(&name, &[ProcedureKind::Mutation])?;
    let input = body_input(&body)?;
    Ok(call(&state, &ctx, &name, input).await?)
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/trpc/{procedure}", get(handle_get).post(handle_post))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedures_are_routed_by_method() {
        assert_eq!(
            lookup("todos.getAll", &[ProcedureKind::Query]).unwrap(),
            ProcedureKind::Query
        );
        let err = lookup("todos.create", &[ProcedureKind::Query]).unwrap_err();
        assert_eq!(err.code(), "METHOD_NOT_SUPPORTED");
        let err = lookup("todos.explode", &[ProcedureKind::Mutation]).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn inputs_default_to_null() {
        assert_eq!(query_input(&RpcQuery::default()).unwrap(), Value::Null);
        assert_eq!(body_input(&Bytes::from_static(b"  ")).unwrap(), Value::Null);
        let query = RpcQuery {
            input: Some(r#"{"agentId":"weather-agent"}"#.into()),
        };
        assert_eq!(query_input(&query).unwrap()["agentId"], "weather-agent");
        assert_eq!(body_input(&Bytes::from_static(b"{oops")).unwrap_err().code(), "BAD_REQUEST");
    }
}
