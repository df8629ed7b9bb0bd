//! API v0 endpoints.
//!
//! Version 0 signals an unstable API -- breaking changes are expected
//! until the proxy reaches 1.0.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use super::SharedState;
use crate::api_client::types::{ProxyState, UpstreamState};

/// Build the v0 API routes with OpenAPI metadata.
pub fn routes() -> OpenApiRouter<SharedState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(get_proxy))
        .routes(routes!(get_upstreams))
        .routes(routes!(get_upstream))
}

/// Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = OK, description = "Server is running", body = String),
    ),
)]
async fn health() -> &'static str {
    "OK"
}

/// Return the full proxy state snapshot.
#[utoipa::path(
    get,
    path = "/proxy",
    tag = "proxy",
    responses(
        (status = OK, description = "Current proxy state", body = ProxyState),
        (status = INTERNAL_SERVER_ERROR, description = "Proxy core unavailable"),
    ),
)]
async fn get_proxy(
    State(state): State<SharedState>,
) -> Result<Json<ProxyState>, StatusCode> {
    Ok(Json(state.proxy_state().await?))
}

/// Return all configured upstreams.
#[utoipa::path(
    get,
    path = "/upstreams",
    tag = "upstreams",
    responses(
        (status = OK, description = "List of upstreams", body = Vec<UpstreamState>),
        (status = INTERNAL_SERVER_ERROR, description = "Proxy core unavailable"),
    ),
)]
async fn get_upstreams(
    State(state): State<SharedState>,
) -> Result<Json<Vec<UpstreamState>>, StatusCode> {
    Ok(Json(state.proxy_state().await?.upstreams))
}

/// Return a single upstream by name, or 404 if not found.
#[utoipa::path(
    get,
    path = "/upstreams/{name}",
    tag = "upstreams",
    params(
        ("name" = String, Path, description = "Upstream name"),
    ),
    responses(
        (status = OK, description = "Upstream state", body = UpstreamState),
        (status = NOT_FOUND, description = "No such upstream"),
        (status = INTERNAL_SERVER_ERROR, description = "Proxy core unavailable"),
    ),
)]
async fn get_upstream(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> Result<Json<UpstreamState>, StatusCode> {
    state
        .proxy_state()
        .await?
        .upstreams
        .into_iter()
        .find(|upstream| upstream.name == name)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
