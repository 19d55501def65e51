//! HTTP server assembly: shared state, router, health check.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router, middleware};
use serde_json::json;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::agent::{AgentCatalog, AgentRunner, ThreadMemory};
use crate::auth::{CredentialVerifier, StaticTokenVerifier, authenticate};
use crate::config::ServerConfig;
use crate::error::Error;
use crate::llm::LlmProvider;
use crate::profile::ProfileService;
use crate::store::Stores;
use crate::tools::ToolRegistry;
use crate::tools::builtin::{BuiltinDeps, HttpEnricher, OpenMeteo, register_builtins};
use crate::{chat, profile, rpc, todos};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub profiles: ProfileService,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub catalog: Arc<AgentCatalog>,
    pub runner: Arc<AgentRunner>,
}

impl AppState {
    /// Wire the built-in tools and agents around `stores` and `llm`.
    pub fn build(
        config: &ServerConfig,
        stores: Stores,
        llm: Arc<dyn LlmProvider>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Result<Self, Error> {
        let deps = BuiltinDeps {
            weather: Arc::new(OpenMeteo::new(&config.weather)?),
            enricher: Arc::new(HttpEnricher::new(config.enrichment_url.clone())?),
            profiles: ProfileService::new(stores.clone()),
        };
        Self::with_deps(config, stores, llm, verifier, deps)
    }

    /// Like [`AppState::build`] with caller-supplied tool backends.
    pub fn with_deps(
        config: &ServerConfig,
        stores: Stores,
        llm: Arc<dyn LlmProvider>,
        verifier: Arc<dyn CredentialVerifier>,
        deps: BuiltinDeps,
    ) -> Result<Self, Error> {
        let registry = ToolRegistry::new();
        let profiles = deps.profiles.clone();
        register_builtins(&registry, deps)?;

        let catalog = AgentCatalog::builtin(&config.llm.model, config.agent.default_agent.clone());
        catalog.get(catalog.default_id())?;

        let runner = AgentRunner::new(
            llm,
            Arc::new(registry),
            ThreadMemory::new(stores.clone()),
            config.agent.max_steps,
        );

        Ok(Self {
            stores,
            profiles,
            verifier,
            catalog: Arc::new(catalog),
            runner: Arc::new(runner),
        })
    }
}

/// Verifier for the configured `API_TOKENS` table. No table, no tokens.
pub fn token_verifier(config: &ServerConfig) -> Result<Arc<dyn CredentialVerifier>, Error> {
    let verifier = match &config.api_tokens {
        Some(table) => StaticTokenVerifier::from_table(table)?,
        None => {
            warn!("API_TOKENS is not set; every request will be rejected");
            StaticTokenVerifier::new()
        }
    };
    Ok(Arc::new(verifier))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// GET /health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.stores.writer().ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "db": { "ok": true, "details": "reachable" } })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "error", "db": { "ok": false, "details": e.to_string() } })),
        ),
    }
}

/// Full router: public health check plus authenticated API routes.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let protected = Router::new()
        .merge(chat::routes::routes())
        .merge(todos::routes::routes())
        .merge(profile::routes::routes())
        .merge(rpc::routes())
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state.verifier),
            authenticate,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
