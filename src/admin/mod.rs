//! Admin HTTP surface.
//!
//! `GET /stats` returns the ledger snapshot as JSON and
//! `POST /reset?ip=<address>` lifts one client's block and clears its day.

mod client;

pub use client::AdminClient;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::watch::{LedgerSnapshot, ResetError, StatsStore};

#[derive(Debug, Deserialize)]
struct ResetParams {
    ip: Option<String>,
}

impl IntoResponse for ResetError {
    fn into_response(self) -> Response {
        let status = match &self {
            ResetError::NotFound(_) => StatusCode::NOT_FOUND,
            ResetError::UnblockFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

pub fn router(store: Arc<StatsStore>) -> Router {
    Router::new()
        .route("/stats", get(get_stats))
        .route("/reset", post(post_reset))
        .with_state(store)
}

/// Serve the admin API until `shutdown` turns true
pub async fn serve(addr: SocketAddr, store: Arc<StatsStore>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind admin API on {}", addr))?;
    info!("Admin API listening on {}", addr);

    axum::serve(listener, router(store))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .context("Admin API server failed")?;

    info!("Admin API stopped");
    Ok(())
}

async fn get_stats(State(store): State<Arc<StatsStore>>) -> Json<LedgerSnapshot> {
    Json(store.snapshot().await)
}

async fn post_reset(
    State(store): State<Arc<StatsStore>>,
    Query(params): Query<ResetParams>,
) -> Result<(StatusCode, String), Response> {
    let Some(ip) = params.ip.filter(|ip| !ip.trim().is_empty()) else {
        return Err((StatusCode::BAD_REQUEST, "missing ip parameter".to_string()).into_response());
    };

    store.reset_client(ip.trim()).await.map_err(IntoResponse::into_response)?;
    Ok((StatusCode::OK, format!("Stats for {} reset", ip.trim())))
}
