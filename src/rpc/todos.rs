//! `todos.*` procedures.

use serde_json::Value;

use super::{parse_input, to_value};
use crate::auth::{RequestContext, scopes};
use crate::error::ApiError;
use crate::server::AppState;
use crate::todos::CreateTodo;

pub async fn call(
    state: &AppState,
    ctx: &RequestContext,
    procedure: &str,
    input: Value,
) -> Result<Value, ApiError> {
    match procedure {
        "getAll" => {
            ctx.require_scope(scopes::TODOS_READ)?;
            let todos = state.stores.reader(ctx.force_primary).list_todos().await?;
            to_value(todos)
        }
        "create" => {
            ctx.require_scope(scopes::TODOS_WRITE)?;
            let body: CreateTodo = parse_input(input)?;
            let title = body.validated_title().map_err(ApiError::BadRequest)?;
            let todo = state.stores.writer().create_todo(title).await?;
            to_value(todo)
        }
        other => Err(ApiError::not_found(format!("No procedure named todos.{other}"))),
    }
}
