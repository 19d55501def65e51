use std::sync::Arc;

use anyhow::Context;
use humblebrag_api::config::ServerConfig;
use humblebrag_api::llm::create_provider;
use humblebrag_api::logging;
use humblebrag_api::server::{AppState, build_router, token_verifier};
use humblebrag_api::store::{Database, LibSqlBackend, Stores};
use secrecy::ExposeSecret;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = logging::init(config.log_dir.as_deref());

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.llm.model,
        "Starting Humblebrag API"
    );

    // ── Database ─────────────────────────────────────────────────────────
    let db = &config.database;
    let stores = match &db.remote_url {
        Some(url) => {
            let token = db
                .auth_token
                .as_ref()
                .map(|t| t.expose_secret().to_string())
                .unwrap_or_default();
            let primary: Arc<dyn Database> = Arc::new(
                LibSqlBackend::new_remote(url, &token)
                    .await
                    .with_context(|| format!("Failed to connect to database at {url}"))?,
            );
            let mut stores = Stores::new(primary);
            if let Some(path) = &db.replica_path {
                let replica: Arc<dyn Database> = Arc::new(
                    LibSqlBackend::new_remote_replica(path, url, &token, db.sync_interval)
                        .await
                        .with_context(|| format!("Failed to open replica at {}", path.display()))?,
                );
                stores = stores.with_replica(replica);
            }
            stores
        }
        None => Stores::new(Arc::new(
            LibSqlBackend::new_local(&db.primary_path)
                .await
                .with_context(|| {
                    format!("Failed to open database at {}", db.primary_path.display())
                })?,
        )),
    };

    // ── Agents ───────────────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    let verifier = token_verifier(&config)?;
    let state = AppState::build(&config, stores, llm, verifier)?;
    let app = build_router(state, &config.cors_origins);

    // ── Serve ────────────────────────────────────────────────────────────
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}
