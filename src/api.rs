use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::aggregate::{AggregatedResult, Aggregator};
use crate::error::{AggregationFailurePayload, AggregatorError};
use crate::extract::PathVariables;

#[derive(Clone)]
pub struct AppState {
    pub aggregator: Arc<Aggregator>,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>) -> Self {
        Self { aggregator }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/aggregate/{group}", get(aggregate_group))
        .route("/aggregate/{group}/{id}", get(aggregate_group_with_id))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn aggregate_group(
    State(state): State<AppState>,
    Path(group): Path<String>,
    Query(vars): Query<HashMap<String, String>>,
) -> Result<Json<AggregatedResult>, AggregatorError> {
    run(&state, &group, vars).await
}

async fn aggregate_group_with_id(
    State(state): State<AppState>,
    Path((group, id)): Path<(String, String)>,
    Query(mut vars): Query<HashMap<String, String>>,
) -> Result<Json<AggregatedResult>, AggregatorError> {
    vars.insert("id".to_string(), id);
    run(&state, &group, vars).await
}

async fn run(
    state: &AppState,
    group: &str,
    vars: PathVariables,
) -> Result<Json<AggregatedResult>, AggregatorError> {
    state.aggregator.aggregate(group, &vars).await.map(Json)
}

impl IntoResponse for AggregatorError {
    fn into_response(self) -> Response {
        match &self {
            AggregatorError::AggregationFailed(failures) => (
                StatusCode::BAD_GATEWAY,
                Json(AggregationFailurePayload::from_failures(failures)),
            )
                .into_response(),
            AggregatorError::UnknownGroup(_) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "message": self.to_string() })),
            )
                .into_response(),
            other => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": other.to_string() })),
            )
                .into_response(),
        }
    }
}
