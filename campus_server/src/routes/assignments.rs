use axum::{
    extract::{Path, Query, State},
    routing::{get, patch, post},
    Json, Router,
};
use campus_core::{
    entity::prelude::AssignmentModel,
    ids::{ActivityId, FacultyId, InstituteId},
    service::assignments::{
        AssignedActivity, AssignmentFilter, BulkAssign, BulkAssignReport,
        FacultyAssignmentCount, NewAssignment, Reassign,
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
        .route("/admin/assignment", get(list).post(assign))
        .route("/admin/assignment/bulk", post(bulk_assign))
        .route("/admin/assignment/reassign", patch(reassign))
        .route(
            "/admin/assignment/activity/{id}",
            get(for_activity).delete(unassign),
        )
        .route(
            "/admin/assignment/faculty-counts/{institute_id}",
            get(faculty_counts),
        )
        .route("/admin/assignment/faculty/{faculty_id}", get(for_faculty))
}

async fn assign(
    State(state): State<AppState>,
    user: AuthUser,
    Json(new): Json<NewAssignment>,
) -> Created<AssignmentModel> {
    let (institute, _) = user.admin_scope()?;
    created(state.core.assignments.assign(institute, new).await?)
}

async fn bulk_assign(
    State(state): State<AppState>,
    user: AuthUser,
    Json(bulk): Json<BulkAssign>,
) -> ApiResult<BulkAssignReport> {
    let (institute, _) = user.admin_scope()?;
    ok(state.core.assignments.bulk_assign(institute, bulk).await?)
}

async fn reassign(
    State(state): State<AppState>,
    user: AuthUser,
    Json(reassign): Json<Reassign>,
) -> ApiResult<AssignmentModel> {
    let (institute, _) = user.admin_scope()?;
    ok(state.core.assignments.reassign(institute, reassign).await?)
}

async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(filter): Query<AssignmentFilter>,
) -> ApiResult<Vec<AssignedActivity>> {
    let (institute, _) = user.admin_scope()?;
    ok(state.core.assignments.list_assignments(institute, filter).await?)
}

async fn for_activity(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<ActivityId>,
) -> ApiResult<AssignmentModel> {
    let (institute, _) = user.admin_scope()?;
    ok(state.core.assignments.get_for_activity(institute, id).await?)
}

async fn unassign(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<ActivityId>,
) -> ApiResult<Value> {
    let (institute, _) = user.admin_scope()?;
    state.core.assignments.unassign(institute, id).await?;
    ok(json!({ "activity_id": id, "unassigned": true }))
}

async fn faculty_counts(
    State(state): State<AppState>,
    user: AuthUser,
    Path(institute_id): Path<InstituteId>,
) -> ApiResult<Vec<FacultyAssignmentCount>> {
    let (institute, _) = user.admin_scope()?;
    if institute != institute_id {
        return Err(ApiError::forbidden("institute mismatch"));
    }
    ok(state.core.assignments.faculty_counts(institute).await?)
}

/// A faculty member may list their own queue; admins any faculty's in their institute.
async fn for_faculty(
    State(state): State<AppState>,
    user: AuthUser,
    Path(faculty_id): Path<FacultyId>,
) -> ApiResult<Vec<AssignedActivity>> {
    let scope = if user.0.faculty_id == Some(faculty_id) {
        user.0.institute_id
    } else {
        Some(user.admin_scope()?.0)
    };
    ok(state
        .core
        .assignments
        .list_for_faculty(faculty_id, scope)
        .await?)
}
