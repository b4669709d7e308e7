//! Minivault Web Server
//!
//! Run with: cargo run -p minivault-web

use minivault_llm::{build_backend, AuditLogger, RequestHandler};
use minivault_web::config::Config;
use minivault_web::router::build_router;
use minivault_web::state::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("minivault=debug,info")),
        )
        .init();

    info!("Minivault starting up...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    match config.remote_summary() {
        Some((base_url, model)) => info!(%base_url, %model, "Using remote ollama backend"),
        None => info!("Using stubbed backend"),
    }

    // Audit log: started before the first request, closed after the last.
    tokio::fs::create_dir_all(&config.audit.log_dir).await?;
    let audit = AuditLogger::start(&config.audit.log_dir);
    info!(log_dir = %config.audit.log_dir.display(), "Audit logger started");

    let backend = build_backend(&config.llm_service)?;
    let handler = RequestHandler::new(backend, audit.handle());
    let state = AppState::new(handler).with_max_prompt_chars(config.server.max_prompt_chars);
    let app = build_router(state);

    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, flushing audit log...");
    audit.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
    }
}
