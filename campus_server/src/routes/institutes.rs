use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use campus_core::{
    entity::prelude::InstituteModel,
    ids::InstituteId,
    service::institutes::{InstituteUpdate, NewInstitute},
};

use crate::{
    auth::AuthUser,
    error::{created, ok, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/institute", get(list).post(create))
        .route("/institute/{id}", get(get_institute).patch(update))
}

async fn create(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(new): Json<NewInstitute>,
) -> Created<InstituteModel> {
    created(state.core.institutes.create_institute(new).await?)
}

async fn list(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Vec<InstituteModel>> {
    ok(state.core.institutes.list_institutes().await?)
}

async fn get_institute(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<InstituteId>,
) -> ApiResult<InstituteModel> {
    ok(state.core.institutes.get_institute(id).await?)
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<InstituteId>,
    Json(update): Json<InstituteUpdate>,
) -> ApiResult<InstituteModel> {
    let acting = user.admin_scope().ok().map(|(institute, _)| institute);
    ok(state.core.institutes.update_institute(id, acting, update).await?)
}
