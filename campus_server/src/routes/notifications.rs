use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use campus_core::{
    entity::prelude::{NotificationKind, NotificationModel},
    ids::{NotificationId, UserId},
    service::{
        notifications::{NewNotification, NotificationQuery},
        Page,
    },
};
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    chat::events::ServerEvent,
    error::{created, ok, ApiError, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", post(create))
        .route("/notifications/bulk", post(bulk_create))
        .route(
            "/notifications/user/{user_id}",
            get(list_for_user).delete(delete_all),
        )
        .route("/notifications/user/{user_id}/read-all", put(mark_all_read))
        .route("/notifications/user/{user_id}/unread-count", get(unread_count))
        .route("/notifications/user/{user_id}/type/{kind}", get(list_by_kind))
        .route("/notifications/{id}/read", put(mark_read))
        .route("/notifications/{id}", get(get_one).delete(remove))
}

fn only_self(identity: &AuthUser, user_id: UserId) -> Result<(), ApiError> {
    if identity.0.user_id != user_id {
        return Err(ApiError::forbidden("cannot access another user's notifications"));
    }
    Ok(())
}

/// Pushes a stored notification to its owner's open connections.
pub async fn push(state: &AppState, notification: &NotificationModel) {
    state
        .hub
        .send_to_user(
            notification.user_id,
            ServerEvent::new("notification", notification),
        )
        .await;
}

async fn create(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(new): Json<NewNotification>,
) -> Created<NotificationModel> {
    let notification = state.core.notifications.create_notification(new).await?;
    push(&state, &notification).await;
    created(notification)
}

async fn bulk_create(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(batch): Json<Vec<NewNotification>>,
) -> Created<Vec<NotificationModel>> {
    let notifications = state.core.notifications.bulk_create(batch).await?;
    for notification in &notifications {
        push(&state, notification).await;
    }
    created(notifications)
}

async fn list_for_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<UserId>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Page<NotificationModel>> {
    only_self(&user, user_id)?;
    ok(state.core.notifications.list_for_user(user_id, query).await?)
}

async fn delete_all(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<UserId>,
) -> ApiResult<Value> {
    only_self(&user, user_id)?;
    let deleted = state.core.notifications.delete_all_for_user(user_id).await?;
    ok(json!({ "deleted": deleted }))
}

async fn mark_all_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<UserId>,
) -> ApiResult<Value> {
    only_self(&user, user_id)?;
    let updated = state.core.notifications.mark_all_read(user_id).await?;
    ok(json!({ "updated": updated }))
}

async fn unread_count(
    State(state): State<AppState>,
    user: AuthUser,
    Path(user_id): Path<UserId>,
) -> ApiResult<Value> {
    only_self(&user, user_id)?;
    let count = state.core.notifications.unread_count(user_id).await?;
    ok(json!({ "count": count }))
}

async fn list_by_kind(
    State(state): State<AppState>,
    user: AuthUser,
    Path((user_id, kind)): Path<(UserId, NotificationKind)>,
) -> ApiResult<Vec<NotificationModel>> {
    only_self(&user, user_id)?;
    ok(state.core.notifications.list_by_kind(user_id, kind).await?)
}

async fn mark_read(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<NotificationId>,
) -> ApiResult<NotificationModel> {
    ok(state.core.notifications.mark_read(identity.user_id, id).await?)
}

async fn get_one(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<NotificationId>,
) -> ApiResult<NotificationModel> {
    let notification = state.core.notifications.get_notification(id).await?;
    if notification.user_id != identity.user_id {
        return Err(ApiError::not_found("notification not found"));
    }
    ok(notification)
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<NotificationId>,
) -> ApiResult<Value> {
    state
        .core
        .notifications
        .delete_notification(identity.user_id, id)
        .await?;
    ok(json!({ "deleted": id }))
}
