use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use campus_core::{
    entity::prelude::{AttachmentModel, MessageModel},
    ids::{ChannelId, MessageId, UserId},
    service::{
        messages::{ConversationQuery, MessageView, NewDirectMessage, SortOrder},
        Page,
    },
};
use serde::Deserialize;
use tracing::warn;

use crate::{
    auth::AuthUser,
    chat::handlers::{announce_delete, announce_reads, deliver_direct},
    error::{created, ok, ApiError, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", post(send_message))
        .route("/messages/{id}", get(conversation).delete(delete_message))
        .route("/messages/{id}/read", put(mark_read))
        .route("/messages/{id}/attachments", get(message_attachments))
        .route("/channels/{id}/messages", get(channel_messages))
}

#[derive(Debug, Default, Deserialize)]
struct MessagesQuery {
    #[serde(alias = "withUser")]
    with_user: Option<UserId>,
    page: Option<u64>,
    limit: Option<u64>,
    #[serde(default)]
    sort: SortOrder,
}

impl MessagesQuery {
    fn paging(&self) -> ConversationQuery {
        ConversationQuery {
            page: self.page,
            limit: self.limit,
            sort: self.sort,
        }
    }
}

/// With `with_user` the path names one side of the conversation; without it
/// the path names the caller's counterpart.
async fn conversation(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(user_id): Path<UserId>,
    Query(q): Query<MessagesQuery>,
) -> ApiResult<Page<MessageView>> {
    let (a, b) = match q.with_user {
        Some(other) => (user_id, other),
        None => (identity.user_id, user_id),
    };
    if identity.user_id != a && identity.user_id != b {
        return Err(ApiError::forbidden("not part of this conversation"));
    }
    ok(state.core.messages.conversation(a, b, q.paging()).await?)
}

async fn channel_messages(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(channel_id): Path<ChannelId>,
    Query(q): Query<MessagesQuery>,
) -> ApiResult<Page<MessageView>> {
    ok(state
        .core
        .messages
        .channel_messages(identity.user_id, channel_id, q.paging())
        .await?)
}

async fn send_message(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(new): Json<NewDirectMessage>,
) -> Created<MessageView> {
    let core = &state.core;
    core.attachments
        .check_owned(identity.user_id, &new.attachments)
        .await?;
    let view = core.messages.send_direct(identity.user_id, new).await?;
    if let Err(err) = deliver_direct(&state, &identity, &view).await {
        warn!(message = %view.message.id, error = %err, "message stored but not delivered");
    }
    created(view)
}

async fn mark_read(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<MessageId>,
) -> ApiResult<MessageModel> {
    let message = state.core.messages.mark_one_read(identity.user_id, id).await?;
    state
        .core
        .notifications
        .mark_read_for_messages(identity.user_id, &[id])
        .await?;
    announce_reads(&state, &identity, std::slice::from_ref(&message)).await;
    ok(message)
}

async fn delete_message(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<MessageId>,
) -> ApiResult<MessageModel> {
    let message = state.core.messages.delete_message(identity.user_id, id).await?;
    announce_delete(&state, identity.user_id, &message).await?;
    ok(message)
}

async fn message_attachments(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<MessageId>,
) -> ApiResult<Vec<AttachmentModel>> {
    let view = state.core.messages.get_message(id).await?;
    let message = &view.message;
    let visible = message.sender_id == identity.user_id
        || message.recipient_id == Some(identity.user_id)
        || match message.channel_id {
            Some(channel) => state.core.channels.is_member(channel, identity.user_id).await?,
            None => false,
        };
    if !visible {
        return Err(ApiError::not_found("message not found"));
    }
    ok(view.attachments)
}
