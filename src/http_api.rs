//! HTTP/JSON surface over the bridge facade
//!
//! Pure translation: each route extracts its parameters, calls one
//! [`BridgeService`] operation, and serializes the snapshot. Validation
//! failures from the sender map to 400 with `{"error": reason}`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::{BridgeService, SetActuatorRequest};

/// Build the bridge router.
pub fn router(service: Arc<BridgeService>) -> Router {
    Router::new()
        .route("/sensors", get(get_sensors))
        .route("/actuators", get(get_actuators))
        .route("/weather", get(get_weather))
        .route("/nodes", get(list_nodes))
        .route("/health", get(health))
        .route("/actuator", post(set_actuator))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

#[derive(Debug, Deserialize)]
struct HouseQuery {
    #[serde(default = "default_house")]
    house: String,
}

fn default_house() -> String {
    "h1".to_string()
}

#[derive(Debug, Deserialize)]
struct NodesQuery {
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

async fn get_sensors(
    State(service): State<Arc<BridgeService>>,
    Query(query): Query<HouseQuery>,
) -> Response {
    Json(service.get_sensors(&query.house).await).into_response()
}

async fn get_actuators(
    State(service): State<Arc<BridgeService>>,
    Query(query): Query<HouseQuery>,
) -> Response {
    Json(service.get_actuators(&query.house).await).into_response()
}

async fn get_weather(
    State(service): State<Arc<BridgeService>>,
    Query(query): Query<HouseQuery>,
) -> Response {
    Json(service.get_weather(&query.house).await).into_response()
}

async fn list_nodes(
    State(service): State<Arc<BridgeService>>,
    Query(query): Query<NodesQuery>,
) -> Response {
    Json(service.list_nodes(query.active).await).into_response()
}

async fn health(State(service): State<Arc<BridgeService>>) -> Response {
    Json(service.health().await).into_response()
}

async fn set_actuator(
    State(service): State<Arc<BridgeService>>,
    Json(request): Json<SetActuatorRequest>,
) -> Response {
    match service.set_actuator(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) if e.is_validation() => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}
