use axum::{
    extract::{Path, Query, State},
    routing::{get, patch},
    Json, Router,
};
use campus_core::{
    entity::prelude::ActivityModel,
    ids::ActivityId,
    service::activities::{ActivityFilter, ActivityReview, ActivityUpdate, NewActivity},
};
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    error::{created, ok, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activity", get(list).post(create))
        .route(
            "/activity/{id}",
            get(get_activity).patch(update).delete(remove),
        )
        .route("/activity/{id}/review", patch(review))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(new): Json<NewActivity>,
) -> Created<ActivityModel> {
    created(state.core.activities.create_activity(&identity, new).await?)
}

async fn list(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(filter): Query<ActivityFilter>,
) -> ApiResult<Vec<ActivityModel>> {
    ok(state.core.activities.list_activities(&identity, filter).await?)
}

async fn get_activity(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ActivityId>,
) -> ApiResult<ActivityModel> {
    ok(state.core.activities.get_activity(&identity, id).await?)
}

async fn update(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ActivityId>,
    Json(update): Json<ActivityUpdate>,
) -> ApiResult<ActivityModel> {
    ok(state
        .core
        .activities
        .update_activity(&identity, id, update)
        .await?)
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ActivityId>,
) -> ApiResult<Value> {
    state.core.activities.delete_activity(&identity, id).await?;
    ok(json!({ "deleted": id }))
}

async fn review(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ActivityId>,
    Json(review): Json<ActivityReview>,
) -> ApiResult<ActivityModel> {
    ok(state
        .core
        .activities
        .review_activity(&identity, id, review)
        .await?)
}
