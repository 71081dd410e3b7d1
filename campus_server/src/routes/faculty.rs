use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use campus_core::{
    entity::prelude::FacultyModel,
    ids::FacultyId,
    service::{
        faculty::{FacultyFilter, FacultyProfile, FacultyUpdate, NewFaculty},
        BulkReport,
    },
};
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    error::{created, ok, ApiError, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/faculty", get(list).post(create))
        .route("/faculty/bulk", post(bulk_create))
        .route(
            "/faculty/{id}",
            get(get_faculty).patch(update).delete(remove),
        )
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(new): Json<NewFaculty>,
) -> Created<FacultyProfile> {
    let (institute, _) = user.admin_scope()?;
    created(state.core.faculty.create_faculty(institute, new).await?)
}

async fn bulk_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(rows): Json<Vec<NewFaculty>>,
) -> Created<BulkReport<FacultyProfile>> {
    let (institute, _) = user.admin_scope()?;
    created(state.core.faculty.bulk_create_faculty(institute, rows).await?)
}

/// Institute accounts only ever see their own faculty.
async fn list(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(mut filter): Query<FacultyFilter>,
) -> ApiResult<Vec<FacultyProfile>> {
    if let Some(institute) = identity.institute_id {
        filter.institute_id = Some(institute);
    }
    ok(state.core.faculty.list_faculty(filter).await?)
}

async fn get_faculty(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<FacultyId>,
) -> ApiResult<FacultyProfile> {
    let profile = state.core.faculty.get_faculty(id).await?;
    if identity
        .institute_id
        .is_some_and(|institute| institute != profile.faculty.institute_id)
    {
        return Err(ApiError::not_found("faculty not found"));
    }
    ok(profile)
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<FacultyId>,
    Json(update): Json<FacultyUpdate>,
) -> ApiResult<FacultyModel> {
    let (institute, _) = user.admin_scope()?;
    ok(state.core.faculty.update_faculty(id, institute, update).await?)
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<FacultyId>,
) -> ApiResult<Value> {
    let (institute, _) = user.admin_scope()?;
    state.core.faculty.delete_faculty(id, institute).await?;
    ok(json!({ "deleted": id }))
}
