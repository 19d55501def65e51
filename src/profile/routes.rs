//! REST endpoint for the caller's career profile.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::model::Profile;
use crate::auth::{RequestContext, scopes};
use crate::error::ApiError;
use crate::server::AppState;

/// GET /profile
///
/// The stored profile, or 404 if nothing was saved yet.
async fn get_profile(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> Result<Json<Profile>, ApiError> {
    ctx.require_scope(scopes::PROFILE_READ)?;
    if !state.profiles.exists(ctx.user_id(), ctx.force_primary).await? {
        return Err(ApiError::not_found("No profile exists yet"));
    }
    let profile = state.profiles.get(ctx.user_id(), ctx.force_primary).await?;
    Ok(Json(profile))
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/profile", get(get_profile))
}
