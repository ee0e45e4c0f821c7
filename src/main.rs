//! Mathe-Challenge · daily math exercise backend
//!
//! - Axum HTTP API around the challenge engine
//! - Optional photo grading through an OpenAI-compatible vision model
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   APP_CONFIG_PATH     : path to TOML config (rules, prompts, problem bank)
//!   STORE               : "file" (default) or "memory"
//!   DATA_DIR            : directory for the file store (default ./data)
//!   OPENAI_API_KEY      : enables photo grading if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_VISION_MODEL : default "gpt-4o-mini"
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use mathe_backend::routes::build_router;
use mathe_backend::state::AppState;
use mathe_backend::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  let state = Arc::new(AppState::from_env());
  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "mathe_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "mathe_backend", error = %e, "Failed to listen for shutdown signal");
  }
  info!(target: "mathe_backend", "Shutting down");
}
