use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use campus_core::{
    entity::prelude::AttachmentModel,
    ids::AttachmentId,
    media::{self, UploadCredentials},
    service::attachments::{AttachmentRename, HostedUpload, NewAttachment},
};
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    error::{created, ok, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/attachments/upload-cred", get(upload_cred))
        .route("/attachments/upload-cred/{folder}", get(upload_cred_in))
        .route("/attachments/upload", post(upload))
        .route("/attachments/cloudinary", post(hosted_upload))
        .route(
            "/attachments/{id}",
            get(get_attachment).put(rename).delete(remove),
        )
}

async fn upload_cred(State(state): State<AppState>, _user: AuthUser) -> ApiResult<UploadCredentials> {
    ok(media::upload_credentials(&state.core.config.media, None))
}

async fn upload_cred_in(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(folder): Path<String>,
) -> ApiResult<UploadCredentials> {
    ok(media::upload_credentials(&state.core.config.media, Some(&folder)))
}

async fn upload(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(new): Json<NewAttachment>,
) -> Created<AttachmentModel> {
    created(
        state
            .core
            .attachments
            .create_attachment(identity.user_id, new)
            .await?,
    )
}

async fn hosted_upload(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(upload): Json<HostedUpload>,
) -> Created<AttachmentModel> {
    created(
        state
            .core
            .attachments
            .record_hosted_upload(identity.user_id, upload)
            .await?,
    )
}

async fn get_attachment(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<AttachmentId>,
) -> ApiResult<AttachmentModel> {
    ok(state.core.attachments.get_attachment(id).await?)
}

async fn rename(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<AttachmentId>,
    Json(rename): Json<AttachmentRename>,
) -> ApiResult<AttachmentModel> {
    ok(state
        .core
        .attachments
        .rename_attachment(identity.user_id, id, rename)
        .await?)
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<AttachmentId>,
) -> ApiResult<Value> {
    state
        .core
        .attachments
        .delete_attachment(identity.user_id, id)
        .await?;
    ok(json!({ "deleted": id }))
}
