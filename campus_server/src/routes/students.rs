use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use campus_core::{
    entity::prelude::StudentModel,
    ids::StudentId,
    service::{
        students::{NewStudent, StudentFilter, StudentProfile, StudentUpdate},
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
        .route("/student", get(list).post(create))
        .route("/student/bulk", post(bulk_create))
        .route(
            "/student/{id}",
            get(get_student).patch(update).delete(remove),
        )
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(new): Json<NewStudent>,
) -> Created<StudentProfile> {
    let (institute, _) = user.admin_scope()?;
    created(state.core.students.create_student(institute, new).await?)
}

async fn bulk_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(rows): Json<Vec<NewStudent>>,
) -> Created<BulkReport<StudentProfile>> {
    let (institute, _) = user.admin_scope()?;
    created(state.core.students.bulk_create_students(institute, rows).await?)
}

/// Institute accounts only ever see their own students.
async fn list(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(mut filter): Query<StudentFilter>,
) -> ApiResult<Vec<StudentProfile>> {
    if let Some(institute) = identity.institute_id {
        filter.institute_id = Some(institute);
    }
    ok(state.core.students.list_students(filter).await?)
}

async fn get_student(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<StudentId>,
) -> ApiResult<StudentProfile> {
    let profile = state.core.students.get_student(id).await?;
    if identity
        .institute_id
        .is_some_and(|institute| institute != profile.student.institute_id)
    {
        return Err(ApiError::not_found("student not found"));
    }
    ok(profile)
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<StudentId>,
    Json(update): Json<StudentUpdate>,
) -> ApiResult<StudentModel> {
    let (institute, _) = user.admin_scope()?;
    ok(state.core.students.update_student(id, institute, update).await?)
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<StudentId>,
) -> ApiResult<Value> {
    let (institute, _) = user.admin_scope()?;
    state.core.students.delete_student(id, institute).await?;
    ok(json!({ "deleted": id }))
}
