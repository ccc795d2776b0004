use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

pub async fn status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "debinfo-site",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": state.start_time.elapsed().as_secs(),
        "pages": state.catalog.len(),
        "indexed": state.search.len(),
    }))
}

pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, StatusCode> {
    let hits = state.search.search(&query.q).map_err(|e| {
        tracing::error!("search for {:?} failed: {}", query.q, e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(json!({
        "query": query.q,
        "total": hits.len(),
        "results": hits,
    })))
}

pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
