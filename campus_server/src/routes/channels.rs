use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use campus_core::{
    entity::prelude::ChannelModel,
    ids::{ChannelId, UserId},
    service::channels::{AddMember, ChannelMemberView, ChannelUpdate, NewChannel},
};
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    error::{created, ok, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/channels", get(list).post(create))
        .route(
            "/channels/{id}",
            get(get_channel).patch(update).delete(remove),
        )
        .route("/channels/{id}/members", get(members).post(add_member))
        .route("/channels/{id}/members/{user_id}", delete(remove_member))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(new): Json<NewChannel>,
) -> Created<ChannelModel> {
    created(state.core.channels.create_channel(identity.user_id, new).await?)
}

async fn list(State(state): State<AppState>, AuthUser(identity): AuthUser) -> ApiResult<Vec<ChannelModel>> {
    ok(state.core.channels.list_for_user(identity.user_id).await?)
}

async fn get_channel(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ChannelId>,
) -> ApiResult<ChannelModel> {
    ok(state.core.channels.get_channel(identity.user_id, id).await?)
}

async fn update(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ChannelId>,
    Json(update): Json<ChannelUpdate>,
) -> ApiResult<ChannelModel> {
    ok(state
        .core
        .channels
        .update_channel(identity.user_id, id, update)
        .await?)
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ChannelId>,
) -> ApiResult<Value> {
    state.core.channels.delete_channel(identity.user_id, id).await?;
    ok(json!({ "deleted": id }))
}

async fn members(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ChannelId>,
) -> ApiResult<Vec<ChannelMemberView>> {
    ok(state.core.channels.members(identity.user_id, id).await?)
}

async fn add_member(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<ChannelId>,
    Json(add): Json<AddMember>,
) -> Created<Value> {
    let user_id = add.user_id;
    state.core.channels.add_member(identity.user_id, id, add).await?;
    created(json!({ "channel_id": id, "user_id": user_id }))
}

async fn remove_member(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path((id, member)): Path<(ChannelId, UserId)>,
) -> ApiResult<Value> {
    state
        .core
        .channels
        .remove_member(identity.user_id, id, member)
        .await?;
    ok(json!({ "channel_id": id, "removed": member }))
}
