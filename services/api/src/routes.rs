use crate::infra::AppState;
use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;
use serde_json::json;
use tobacco_retail::error::AppError;
use tobacco_retail::location::Coordinate;
use tracing::info;

#[derive(Debug, Serialize)]
pub(crate) struct LocationCheckResponse {
    pub(crate) status: &'static str,
    pub(crate) message: &'static str,
    pub(crate) location: Coordinate,
}

#[derive(Debug, Serialize)]
pub(crate) struct RestrictedZonesResponse {
    pub(crate) status: &'static str,
    /// GeoJSON polygons; none are registered yet.
    pub(crate) zones: Vec<serde_json::Value>,
}

pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route(
            "/check-location/:latitude/:longitude",
            get(check_location_endpoint),
        )
        .route("/restricted-zones", get(restricted_zones_endpoint))
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(state))
}

pub(crate) async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to Tobacco Retailer Location API!" }))
}

pub(crate) async fn check_location_endpoint(
    Path((latitude, longitude)): Path<(f64, f64)>,
) -> Result<Json<LocationCheckResponse>, AppError> {
    let location = Coordinate::new(latitude, longitude)?;
    info!(latitude, longitude, "checking location eligibility");

    // No restricted zones are registered, so every valid point is eligible.
    Ok(Json(LocationCheckResponse {
        status: "Access",
        message: "This location is eligible for a tobacco retail business.",
        location,
    }))
}

pub(crate) async fn restricted_zones_endpoint() -> Json<RestrictedZonesResponse> {
    Json(RestrictedZonesResponse {
        status: "success",
        zones: Vec::new(),
    })
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `serve` marks the state ready before accepting connections; 503 is only
/// observable when the router is served before that.
pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = json!({
        "status": if ready { "ready" } else { "initializing" },
        "address_table": state.address_table,
    });

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
