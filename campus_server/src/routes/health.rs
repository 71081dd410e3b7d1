use axum::{extract::State, routing::get, Router};
use serde_json::{json, Value};

use crate::{
    error::{ok, ApiError, ApiResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> ApiResult<Value> {
    state.core.db.ping().await.map_err(ApiError::from)?;
    ok(json!({ "status": "ok" }))
}
