use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use campus_core::{
    entity::prelude::FriendshipModel,
    ids::FriendshipId,
    service::friendships::{FriendRequest, FriendView, FriendshipChange},
};
use serde_json::{json, Value};

use super::notifications::push;
use crate::{
    auth::AuthUser,
    error::{created, ok, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/friendship", get(list_friends))
        .route("/friendship/request", post(request))
        .route("/friendship/requests/sent", get(sent))
        .route("/friendship/requests/received", get(received))
        .route("/friendship/{id}/accept", put(accept))
        .route("/friendship/{id}/reject", put(reject))
        .route("/friendship/{id}", delete(remove))
}

async fn list_friends(State(state): State<AppState>, AuthUser(identity): AuthUser) -> ApiResult<Vec<FriendView>> {
    ok(state.core.friendships.list_friends(identity.user_id).await?)
}

async fn request(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(req): Json<FriendRequest>,
) -> Created<FriendshipChange> {
    let change = state.core.friendships.request(identity.user_id, req).await?;
    push(&state, &change.notification).await;
    created(change)
}

async fn accept(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<FriendshipId>,
) -> ApiResult<FriendshipChange> {
    let change = state.core.friendships.accept(identity.user_id, id).await?;
    push(&state, &change.notification).await;
    ok(change)
}

async fn reject(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<FriendshipId>,
) -> ApiResult<FriendshipModel> {
    ok(state.core.friendships.reject(identity.user_id, id).await?)
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<FriendshipId>,
) -> ApiResult<Value> {
    state.core.friendships.remove(identity.user_id, id).await?;
    ok(json!({ "deleted": id }))
}

async fn sent(State(state): State<AppState>, AuthUser(identity): AuthUser) -> ApiResult<Vec<FriendView>> {
    ok(state.core.friendships.sent_requests(identity.user_id).await?)
}

async fn received(State(state): State<AppState>, AuthUser(identity): AuthUser) -> ApiResult<Vec<FriendView>> {
    ok(state.core.friendships.received_requests(identity.user_id).await?)
}
