use axum::{
    extract::{Path, State},
    routing::{get, patch},
    Json, Router,
};
use campus_core::{
    entity::prelude::{ActivityTypeAssignmentModel, ActivityTypeModel},
    ids::ActivityTypeId,
    service::activity_types::{ActivityTypeUpdate, NewActivityType},
};
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    error::{created, ok, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/activity-types", get(list).post(create))
        .route("/activity-types/status", get(statuses))
        .route(
            "/activity-types/{id}",
            get(get_type).patch(update).delete(remove),
        )
        .route("/activity-types/{id}/approve", patch(approve))
        .route("/activity-types/{id}/reject", patch(reject))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(new): Json<NewActivityType>,
) -> Created<ActivityTypeModel> {
    created(
        state
            .core
            .activity_types
            .create_activity_type(&identity, new)
            .await?,
    )
}

async fn list(State(state): State<AppState>, AuthUser(identity): AuthUser) -> ApiResult<Vec<ActivityTypeModel>> {
    ok(state.core.activity_types.list_activity_types(&identity).await?)
}

/// Per-institute review state of every type the caller's institute has seen.
async fn statuses(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<ActivityTypeAssignmentModel>> {
    let (institute, _) = user.admin_scope()?;
    ok(state.core.activity_types.list_type_statuses(institute).await?)
}

async fn get_type(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ActivityTypeId>,
) -> ApiResult<ActivityTypeModel> {
    ok(state.core.activity_types.get_activity_type(&identity, id).await?)
}

async fn update(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ActivityTypeId>,
    Json(update): Json<ActivityTypeUpdate>,
) -> ApiResult<ActivityTypeModel> {
    ok(state
        .core
        .activity_types
        .update_activity_type(&identity, id, update)
        .await?)
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ActivityTypeId>,
) -> ApiResult<Value> {
    state
        .core
        .activity_types
        .delete_activity_type(&identity, id)
        .await?;
    ok(json!({ "deleted": id }))
}

async fn approve(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ActivityTypeId>,
) -> ApiResult<ActivityTypeModel> {
    ok(state
        .core
        .activity_types
        .approve_activity_type(&identity, id)
        .await?)
}

async fn reject(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ActivityTypeId>,
) -> ApiResult<ActivityTypeModel> {
    ok(state
        .core
        .activity_types
        .reject_activity_type(&identity, id)
        .await?)
}
