//! REST endpoints for todos.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::json;
use uuid::Uuid;

use super::model::CreateTodo;
use crate::auth::{RequestContext, scopes};
use crate::error::{ApiError, DatabaseError};
use crate::server::AppState;

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    // An id that is not a uuid cannot name an existing todo.
    Uuid::parse_str(raw).map_err(|_| {
        ApiError::from(DatabaseError::NotFound {
            entity: "todo".to_string(),
            id: raw.to_string(),
        })
    })
}

/// GET /todos
///
/// All todos, newest first.
async fn list_todos(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require_scope(scopes::TODOS_READ)?;
    let todos = state.stores.reader(ctx.force_primary).list_todos().await?;
    Ok(Json(json!({ "data": todos })))
}

/// POST /todos
async fn create_todo(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<CreateTodo>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require_scope(scopes::TODOS_WRITE)?;
    let title = body.validated_title().map_err(ApiError::BadRequest)?;
    let todo = state.stores.writer().create_todo(title).await?;
    tracing::info!(todo = %todo.id, user = %ctx.user_id(), "Todo created");
    Ok((StatusCode::CREATED, Json(todo)))
}

/// POST /todos/{id}/toggle
async fn toggle_todo(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require_scope(scopes::TODOS_WRITE)?;
    let todo = state.stores.writer().toggle_todo(parse_id(&id)?).await?;
    Ok(Json(todo))
}

/// DELETE /todos/{id}
async fn delete_todo(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ctx.require_scope(scopes::TODOS_WRITE)?;
    state.stores.writer().delete_todo(parse_id(&id)?).await?;
    Ok(Json(json!({ "success": true })))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/{id}/toggle", post(toggle_todo))
        .route("/todos/{id}", delete(delete_todo))
}
