//! Miner-facing HTTP endpoint.
//!
//! Speaks the plain burst pool protocol on `/burst`, so any pool-capable
//! miner binary can point at the proxy unmodified. getMiningInfo is
//! answered straight from a watch channel without entering the proxy
//! core; submitNonce crosses into the core through the command channel
//! and waits for the routed outcome.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::error::Result;
use crate::mining_info::MiningInfo;
use crate::proxy::{ProxyCommand, SubmitError, SubmitNonceParams};
use crate::tracing::prelude::*;
use crate::upstream::SubmitterMeta;

#[derive(Clone)]
pub struct MinerEndpoint {
    pub mining_info_rx: watch::Receiver<Option<MiningInfo>>,
    pub proxy_cmd_tx: mpsc::Sender<ProxyCommand>,
}

/// Query parameters of the burst protocol. requestType selects the
/// operation; everything else is submitNonce material.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct BurstQuery {
    request_type: Option<String>,
    account_id: Option<String>,
    blockheight: Option<String>,
    nonce: Option<String>,
    deadline: Option<String>,
    secret_phrase: Option<String>,
}

impl BurstQuery {
    fn into_submit_params(self) -> SubmitNonceParams {
        SubmitNonceParams {
            account_id: self.account_id,
            blockheight: self.blockheight,
            nonce: self.nonce,
            deadline: self.deadline,
            secret_phrase: self.secret_phrase,
        }
    }
}

pub fn router(state: MinerEndpoint) -> Router {
    Router::new()
        .route("/burst", get(handle_get).post(handle_post))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the miner endpoint until shutdown.
pub async fn serve(
    addr: &str,
    state: MinerEndpoint,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Miner endpoint listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn handle_get(
    State(state): State<MinerEndpoint>,
    Query(query): Query<BurstQuery>,
) -> Response {
    match query.request_type.as_deref() {
        Some("getMiningInfo") => get_mining_info(&state),
        other => unknown_request_type(other),
    }
}

async fn handle_post(
    State(state): State<MinerEndpoint>,
    headers: HeaderMap,
    Query(query): Query<BurstQuery>,
) -> Response {
    match query.request_type.as_deref() {
        Some("getMiningInfo") => get_mining_info(&state),
        Some("submitNonce") => submit_nonce(state, headers, query).await,
        other => unknown_request_type(other),
    }
}

fn get_mining_info(state: &MinerEndpoint) -> Response {
    match state.mining_info_rx.borrow().clone() {
        Some(info) => Json(info).into_response(),
        None => Json(json!({"error": "No miningInfo available!"})).into_response(),
    }
}

async fn submit_nonce(
    state: MinerEndpoint,
    headers: HeaderMap,
    query: BurstQuery,
) -> Response {
    let meta = submitter_meta(&headers);
    let (reply_tx, reply_rx) = oneshot::channel();
    let command = ProxyCommand::SubmitNonce {
        params: query.into_submit_params(),
        meta,
        reply: reply_tx,
    };
    if state.proxy_cmd_tx.send(command).await.is_err() {
        return error_response(SubmitError::unreachable());
    }
    match reply_rx.await {
        Ok(Ok(body)) => Json(body).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(_) => error_response(SubmitError::unreachable()),
    }
}

fn unknown_request_type(request_type: Option<&str>) -> Response {
    warn!(request_type, "Unknown request type on miner endpoint");
    error_response(SubmitError::unknown_request_type())
}

fn error_response(error: SubmitError) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": error }))).into_response()
}

/// Scrape submitter metadata from the miner's request headers.
fn submitter_meta(headers: &HeaderMap) -> SubmitterMeta {
    let text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    SubmitterMeta {
        miner_software: text("x-miner").or_else(|| text("user-agent")),
        miner_name: text("x-minername").or_else(|| text("x-miner")),
        miner_alias: text("x-accountname").or_else(|| text("x-mineralias")),
        capacity_gib: text("x-capacity").and_then(|raw| raw.parse().ok()),
        account_key: text("x-account"),
    }
}
