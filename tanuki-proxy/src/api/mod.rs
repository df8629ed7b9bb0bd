//! Management HTTP API.
//!
//! Serves proxy and upstream state on a separate listener from the miner
//! endpoint, with OpenAPI metadata and a Swagger UI at `/docs`. Handlers
//! never touch proxy state directly; they send a command with a oneshot
//! reply channel into the core and translate the answer into HTTP.

pub mod v0;

use std::time::Duration;

use axum::http::StatusCode;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_client::ProxyState;
use crate::error::Result;
use crate::proxy::ProxyCommand;
use crate::tracing::prelude::*;

/// How long a handler waits for the core before giving up.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SharedState {
    pub proxy_cmd_tx: mpsc::Sender<ProxyCommand>,
}

impl SharedState {
    /// Fetch a full state snapshot from the proxy core.
    async fn proxy_state(&self) -> std::result::Result<ProxyState, StatusCode> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.proxy_cmd_tx
            .send(ProxyCommand::GetState { reply: reply_tx })
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        let Ok(Ok(state)) = tokio::time::timeout(COMMAND_TIMEOUT, reply_rx).await else {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        };
        Ok(state)
    }
}

#[derive(OpenApi)]
#[openapi(info(
    title = "tanuki-proxy",
    description = "Management API for the tanuki mining proxy"
))]
struct ApiDoc;

/// Assemble the full API router.
pub fn router(state: SharedState) -> axum::Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/v0", v0::routes())
        .split_for_parts();
    router
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", api))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the management API until shutdown.
pub async fn serve(addr: &str, state: SharedState, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Management API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
