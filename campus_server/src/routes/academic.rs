use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use campus_core::{
    auth::Identity,
    entity::prelude::AcademicRecordModel,
    ids::{InstituteId, StudentId},
    service::academic::{AcademicUpdate, NewAcademicRecord},
};

use crate::{
    auth::AuthUser,
    error::{created, ok, ApiError, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/academic", post(create))
        .route("/academic/{student_id}", get(get_record).patch(update))
}

/// Institute admins manage any of their students; a student manages their own record.
fn write_scope(identity: &Identity, student_id: StudentId) -> Result<InstituteId, ApiError> {
    let institute = identity
        .institute_id
        .ok_or_else(|| ApiError::forbidden("institute account required"))?;
    if identity.admin_id.is_some() || identity.student_id == Some(student_id) {
        Ok(institute)
    } else {
        Err(ApiError::forbidden("not allowed to edit this academic record"))
    }
}

async fn create(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(new): Json<NewAcademicRecord>,
) -> Created<AcademicRecordModel> {
    let scope = write_scope(&identity, new.student_id)?;
    created(state.core.academic.create_record(scope, new).await?)
}

async fn get_record(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(student_id): Path<StudentId>,
) -> ApiResult<AcademicRecordModel> {
    let scope = identity
        .institute_id
        .ok_or_else(|| ApiError::forbidden("institute account required"))?;
    ok(state.core.academic.get_for_student(student_id, scope).await?)
}

async fn update(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(student_id): Path<StudentId>,
    Json(update): Json<AcademicUpdate>,
) -> ApiResult<AcademicRecordModel> {
    let scope = write_scope(&identity, student_id)?;
    ok(state
        .core
        .academic
        .update_for_student(student_id, scope, update)
        .await?)
}
