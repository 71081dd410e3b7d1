use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use campus_core::{
    entity::prelude::{ProgramLevel, ProgramModel},
    ids::{InstituteId, ProgramId},
    service::{
        programs::{NewProgram, ProgramUpdate},
        BulkReport,
    },
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    auth::AuthUser,
    error::{created, ok, ApiResult, Created},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/program", get(list))
        .route("/program/create", post(create))
        .route("/program/bulk", post(bulk_create))
        .route("/program/institute/{id}", get(by_institute))
        .route("/program/level/{level}", get(by_level))
        .route("/program/degree/{degree}", get(by_degree))
        .route(
            "/program/{id}",
            get(get_program).patch(update).delete(remove),
        )
        .route("/program/{id}/intake", patch(update_intake))
}

#[derive(Debug, Deserialize)]
struct IntakeUpdate {
    intake: i32,
}

async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(new): Json<NewProgram>,
) -> Created<ProgramModel> {
    let (institute, _) = user.admin_scope()?;
    created(state.core.programs.create_program(institute, new).await?)
}

async fn bulk_create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(rows): Json<Vec<NewProgram>>,
) -> Created<BulkReport<ProgramModel>> {
    let (institute, _) = user.admin_scope()?;
    created(state.core.programs.bulk_create_programs(institute, rows).await?)
}

async fn list(State(state): State<AppState>, _user: AuthUser) -> ApiResult<Vec<ProgramModel>> {
    ok(state.core.programs.list_programs().await?)
}

async fn by_institute(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<InstituteId>,
) -> ApiResult<Vec<ProgramModel>> {
    ok(state.core.programs.list_by_institute(id).await?)
}

async fn by_level(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(level): Path<ProgramLevel>,
) -> ApiResult<Vec<ProgramModel>> {
    ok(state.core.programs.list_by_level(level).await?)
}

async fn by_degree(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(degree): Path<String>,
) -> ApiResult<Vec<ProgramModel>> {
    ok(state.core.programs.list_by_degree(&degree).await?)
}

async fn get_program(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<ProgramId>,
) -> ApiResult<ProgramModel> {
    ok(state.core.programs.get_program(id).await?)
}

async fn update(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<ProgramId>,
    Json(update): Json<ProgramUpdate>,
) -> ApiResult<ProgramModel> {
    let (institute, _) = user.admin_scope()?;
    ok(state.core.programs.update_program(id, institute, update).await?)
}

async fn update_intake(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<ProgramId>,
    Json(body): Json<IntakeUpdate>,
) -> ApiResult<ProgramModel> {
    let (institute, _) = user.admin_scope()?;
    ok(state
        .core
        .programs
        .update_intake(id, institute, body.intake)
        .await?)
}

async fn remove(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<ProgramId>,
) -> ApiResult<Value> {
    let (institute, _) = user.admin_scope()?;
    state.core.programs.delete_program(id, institute).await?;
    ok(json!({ "deleted": id }))
}
