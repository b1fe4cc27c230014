//! GitLab pipeline webhook: announces finished pipelines in a stream.

use std::net::SocketAddr;

use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tbot_core::{pipeline::PipelineStatus, sender::OutboundSender};

#[derive(Clone)]
pub struct WebhookState {
    pub sender: OutboundSender,
    pub stream: String,
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/pipeline-status", post(pipeline_status))
        .with_state(state)
}

async fn pipeline_status(
    State(state): State<WebhookState>,
    Json(payload): Json<Value>,
) -> (StatusCode, String) {
    let status = match PipelineStatus::from_payload(&payload) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "rejecting pipeline webhook");
            return (StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let Some(msg) = status.notification(&state.stream) else {
        return (StatusCode::OK, format!("ignored {}", status.status));
    };

    match state.sender.send(&msg).await {
        Ok(()) => {
            info!(project = %status.project, status = %status.status, "pipeline announced");
            (StatusCode::OK, "sent".to_string())
        }
        Err(e) => {
            warn!(project = %status.project, error = %e, "announcing pipeline failed");
            (StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

/// Serve the webhook on `addr` until `cancel` fires.
pub async fn serve(
    addr: &str,
    state: WebhookState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid webhook address {addr}"))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding webhook listener on {addr}"))?;
    info!(address = %addr, "webhook listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("webhook server")?;

    info!("webhook stopped");
    Ok(())
}
