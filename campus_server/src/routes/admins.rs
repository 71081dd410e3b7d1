use axum::{
    extract::{Path, State},
    routing::get,
    Router,
};
use campus_core::{ids::AdminId, service::admins::AdminProfile};
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    error::{ok, ApiError, ApiResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(list))
        .route("/admin/{id}", get(get_admin).delete(remove))
}

async fn list(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<AdminProfile>> {
    let (institute, _) = user.admin_scope()?;
    ok(state.core.admins.list_admins(institute).await?)
}

async fn get_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<AdminId>,
) -> ApiResult<AdminProfile> {
    let (institute, _) = user.admin_scope()?;
    let profile = state.core.admins.get_admin(id).await?;
    if profile.admin.institute_id != institute {
        return Err(ApiError::not_found("admin not found"));
    }
    ok(profile)
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<AdminId>,
) -> ApiResult<Value> {
    let (institute, acting) = user.admin_scope()?;
    state.core.admins.delete_admin(id, acting, institute).await?;
    ok(json!({ "deleted": id }))
}
