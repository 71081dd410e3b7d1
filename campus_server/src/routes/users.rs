use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use campus_core::{entity::prelude::UserModel, ids::UserId, service::users::UserUpdate};
use serde::Deserialize;

use crate::{
    auth::AuthUser,
    error::{ok, ApiError, ApiResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user", get(search_users))
        .route("/user/{id}", get(get_user).put(update_user))
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    search: Option<String>,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    20
}

async fn search_users(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(q): Query<SearchQuery>,
) -> ApiResult<Vec<UserModel>> {
    ok(state
        .core
        .users
        .search_users(q.search.as_deref(), q.limit.min(100))
        .await?)
}

async fn get_user(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<UserId>,
) -> ApiResult<UserModel> {
    ok(state.core.users.get_user(id).await?)
}

async fn update_user(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<UserId>,
    Json(update): Json<UserUpdate>,
) -> ApiResult<UserModel> {
    if identity.user_id != id {
        return Err(ApiError::forbidden("cannot update another user"));
    }
    ok(state.core.users.update_user(id, update).await?)
}
