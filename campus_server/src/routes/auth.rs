use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use campus_core::{
    auth::Identity,
    ids::InstituteId,
    service::{
        accounts::{
            FacultyRegistered, InstituteRegistered, InstituteRegistration, Login, Session, Signup,
            StudentRegistered,
        },
        faculty::NewFaculty,
        students::NewStudent,
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::{
    auth::{removal_cookie, session_cookie, AuthUser},
    error::{ok, ApiError, ApiResult, Envelope},
    state::AppState,
};

type WithCookie<T> = Result<(CookieJar, Json<Envelope<T>>), ApiError>;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/user/login", post(login))
        .route("/auth/institute/register", post(register_institute))
        .route("/auth/student/register", post(register_student))
        .route("/auth/faculty/register", post(register_faculty))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
}

#[derive(Debug, Deserialize)]
struct InstituteQuery {
    #[serde(rename = "instituteId", alias = "institute_id")]
    institute_id: InstituteId,
}

fn with_session<T>(state: &AppState, jar: CookieJar, token: String, data: T) -> WithCookie<T> {
    let jar = jar.add(session_cookie(token, state.core.config.production));
    Ok((jar, Json(Envelope::data(data))))
}

async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<Signup>,
) -> WithCookie<Session> {
    let session = state.core.accounts.signup(req).await?;
    info!(user = %session.user.id, "signed up");
    let token = session.token.clone();
    with_session(&state, jar, token, session)
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<Login>,
) -> WithCookie<Session> {
    let session = state.core.accounts.login(req).await?;
    let token = session.token.clone();
    with_session(&state, jar, token, session)
}

async fn register_institute(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<InstituteRegistration>,
) -> WithCookie<InstituteRegistered> {
    let registered = state.core.accounts.register_institute(req).await?;
    info!(institute = %registered.institute.id, "institute registered");
    let token = registered.session.token.clone();
    with_session(&state, jar, token, registered)
}

async fn register_student(
    State(state): State<AppState>,
    Query(q): Query<InstituteQuery>,
    jar: CookieJar,
    Json(req): Json<NewStudent>,
) -> WithCookie<StudentRegistered> {
    let registered = state.core.accounts.register_student(q.institute_id, req).await?;
    let token = registered.session.token.clone();
    with_session(&state, jar, token, registered)
}

async fn register_faculty(
    State(state): State<AppState>,
    Query(q): Query<InstituteQuery>,
    jar: CookieJar,
    Json(req): Json<NewFaculty>,
) -> WithCookie<FacultyRegistered> {
    let registered = state.core.accounts.register_faculty(q.institute_id, req).await?;
    let token = registered.session.token.clone();
    with_session(&state, jar, token, registered)
}

async fn me(State(state): State<AppState>, AuthUser(identity): AuthUser) -> ApiResult<Identity> {
    ok(state.core.accounts.me(identity.user_id).await?)
}

async fn logout(_user: AuthUser, jar: CookieJar) -> (CookieJar, Json<Envelope<Value>>) {
    (
        jar.remove(removal_cookie()),
        Json(Envelope::data(json!({ "logged_out": true }))),
    )
}
