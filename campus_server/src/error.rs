use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use campus_core::{
    auth::AuthError,
    entity::prelude::DbErr,
    service::{
        academic::AcademicServiceError, accounts::AccountsServiceError, activities::ActivitiesServiceError,
        activity_types::ActivityTypesServiceError, admins::AdminsServiceError,
        assignments::AssignmentsServiceError, attachments::AttachmentsServiceError,
        channels::ChannelsServiceError, faculty::FacultyServiceError,
        friendships::FriendshipsServiceError, institutes::InstitutesServiceError,
        messages::MessagesServiceError, notifications::NotificationsServiceError,
        programs::ProgramsServiceError, students::StudentsServiceError,
        users::UsersServiceError, validate,
    },
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

/// Body of every response: exactly one of `data` and `error` is set.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub name: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl<T> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
        }
    }
}

pub type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;
pub type Created<T> = Result<(StatusCode, Json<Envelope<T>>), ApiError>;

pub fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope::data(data)))
}

pub fn created<T: Serialize>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(Envelope::data(data))))
}

#[derive(Debug, Clone, Error)]
#[error("{status} {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Logs the cause; the client only sees a generic message.
    pub fn internal(cause: &dyn std::fmt::Display) -> Self {
        error!(error = %cause, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }

    fn name(&self) -> &'static str {
        match self.status {
            StatusCode::BAD_REQUEST => "ValidationError",
            StatusCode::UNAUTHORIZED => "UnauthorizedError",
            StatusCode::FORBIDDEN => "ForbiddenError",
            StatusCode::NOT_FOUND => "NotFoundError",
            StatusCode::CONFLICT => "ConflictError",
            _ => "InternalServerError",
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            status: self.status.as_u16(),
            name: self.name(),
            message: self.message.clone(),
            details: self.details.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body: Envelope<()> = Envelope {
            data: None,
            error: Some(self.body()),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<DbErr> for ApiError {
    fn from(e: DbErr) -> Self {
        ApiError::internal(&e)
    }
}

impl From<validate::Invalid> for ApiError {
    fn from(e: validate::Invalid) -> Self {
        ApiError::bad_request(e.0)
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken(_) => ApiError::unauthorized("invalid or expired token"),
            AuthError::Hashing => ApiError::internal(&e),
        }
    }
}

impl From<UsersServiceError> for ApiError {
    fn from(e: UsersServiceError) -> Self {
        use UsersServiceError::*;
        match e {
            DbError(e) => e.into(),
            UserNotFound => ApiError::not_found(e.to_string()),
            EmailTaken => ApiError::conflict(e.to_string()),
            InvalidCredentials => ApiError::unauthorized(e.to_string()),
            Invalid(e) => e.into(),
            Auth(e) => e.into(),
        }
    }
}

impl From<InstitutesServiceError> for ApiError {
    fn from(e: InstitutesServiceError) -> Self {
        use InstitutesServiceError::*;
        match e {
            DbError(e) => e.into(),
            InstituteNotFound => ApiError::not_found(e.to_string()),
            EmailTaken => ApiError::conflict(e.to_string()),
            Forbidden => ApiError::forbidden(e.to_string()),
            Invalid(e) => e.into(),
        }
    }
}

impl From<AdminsServiceError> for ApiError {
    fn from(e: AdminsServiceError) -> Self {
        use AdminsServiceError::*;
        match e {
            DbError(e) => e.into(),
            AdminNotFound => ApiError::not_found(e.to_string()),
            Forbidden => ApiError::forbidden(e.to_string()),
            SelfRemoval => ApiError::bad_request(e.to_string()),
        }
    }
}

impl From<AcademicServiceError> for ApiError {
    fn from(e: AcademicServiceError) -> Self {
        use AcademicServiceError::*;
        match e {
            DbError(e) => e.into(),
            StudentNotFound | RecordNotFound => ApiError::not_found(e.to_string()),
            RecordExists => ApiError::conflict(e.to_string()),
            Invalid(e) => e.into(),
        }
    }
}

impl From<StudentsServiceError> for ApiError {
    fn from(e: StudentsServiceError) -> Self {
        use StudentsServiceError::*;
        match e {
            DbError(e) => e.into(),
            StudentNotFound | InstituteNotFound | ProgramNotFound => {
                ApiError::not_found(e.to_string())
            }
            RollNumberTaken => ApiError::conflict(e.to_string()),
            Forbidden => ApiError::forbidden(e.to_string()),
            User(e) => e.into(),
            Invalid(e) => e.into(),
        }
    }
}

impl From<FacultyServiceError> for ApiError {
    fn from(e: FacultyServiceError) -> Self {
        use FacultyServiceError::*;
        match e {
            DbError(e) => e.into(),
            FacultyNotFound | InstituteNotFound => ApiError::not_found(e.to_string()),
            EmployeeCodeTaken => ApiError::conflict(e.to_string()),
            Forbidden => ApiError::forbidden(e.to_string()),
            User(e) => e.into(),
            Invalid(e) => e.into(),
        }
    }
}

impl From<AccountsServiceError> for ApiError {
    fn from(e: AccountsServiceError) -> Self {
        use AccountsServiceError::*;
        match e {
            DbError(e) => e.into(),
            User(e) => e.into(),
            Institute(e) => e.into(),
            Student(e) => e.into(),
            Faculty(e) => e.into(),
            Auth(e) => e.into(),
        }
    }
}

impl From<ProgramsServiceError> for ApiError {
    fn from(e: ProgramsServiceError) -> Self {
        use ProgramsServiceError::*;
        match e {
            DbError(e) => e.into(),
            ProgramNotFound | InstituteNotFound => ApiError::not_found(e.to_string()),
            DuplicateProgram => ApiError::conflict(e.to_string()),
            Forbidden => ApiError::forbidden(e.to_string()),
            Invalid(e) => e.into(),
        }
    }
}

impl From<ActivityTypesServiceError> for ApiError {
    fn from(e: ActivityTypesServiceError) -> Self {
        use ActivityTypesServiceError::*;
        match e {
            DbError(e) => e.into(),
            ActivityTypeNotFound => ApiError::not_found(e.to_string()),
            DuplicateName => ApiError::conflict(e.to_string()),
            PrimitiveLocked | Forbidden => ApiError::forbidden(e.to_string()),
            Invalid(e) => e.into(),
        }
    }
}

impl From<ActivitiesServiceError> for ApiError {
    fn from(e: ActivitiesServiceError) -> Self {
        use ActivitiesServiceError::*;
        match e {
            DbError(e) => e.into(),
            ActivityNotFound | ActivityTypeNotFound => ApiError::not_found(e.to_string()),
            ActivityTypeNotApproved => ApiError::bad_request(e.to_string()),
            Locked => ApiError::conflict(e.to_string()),
            Forbidden => ApiError::forbidden(e.to_string()),
            Invalid(e) => e.into(),
        }
    }
}

impl From<AssignmentsServiceError> for ApiError {
    fn from(e: AssignmentsServiceError) -> Self {
        use AssignmentsServiceError::*;
        match e {
            DbError(e) => e.into(),
            ActivityNotFound | FacultyNotFound | AssignmentNotFound => {
                ApiError::not_found(e.to_string())
            }
            AlreadyAssigned(faculty_id) => ApiError::conflict(e.to_string())
                .with_details(serde_json::json!({ "current_faculty_id": faculty_id })),
            Forbidden => ApiError::forbidden(e.to_string()),
        }
    }
}

impl From<AttachmentsServiceError> for ApiError {
    fn from(e: AttachmentsServiceError) -> Self {
        use AttachmentsServiceError::*;
        match e {
            DbError(e) => e.into(),
            AttachmentNotFound => ApiError::not_found(e.to_string()),
            Forbidden => ApiError::forbidden(e.to_string()),
            Invalid(e) => e.into(),
        }
    }
}

impl From<NotificationsServiceError> for ApiError {
    fn from(e: NotificationsServiceError) -> Self {
        use NotificationsServiceError::*;
        match e {
            DbError(e) => e.into(),
            NotificationNotFound | UserNotFound => ApiError::not_found(e.to_string()),
            Invalid(e) => e.into(),
        }
    }
}

impl From<MessagesServiceError> for ApiError {
    fn from(e: MessagesServiceError) -> Self {
        use MessagesServiceError::*;
        match e {
            DbError(e) => e.into(),
            MessageNotFound | RecipientNotFound | AttachmentNotFound | ChannelNotFound => {
                ApiError::not_found(e.to_string())
            }
            NotChannelMember | NotSender | NotRecipient => ApiError::forbidden(e.to_string()),
            Invalid(e) => e.into(),
        }
    }
}

impl From<FriendshipsServiceError> for ApiError {
    fn from(e: FriendshipsServiceError) -> Self {
        use FriendshipsServiceError::*;
        match e {
            DbError(e) => e.into(),
            FriendshipNotFound | RecipientNotFound => ApiError::not_found(e.to_string()),
            SelfRequest => ApiError::bad_request(e.to_string()),
            AlreadyRequested | NotPending => ApiError::conflict(e.to_string()),
            Forbidden => ApiError::forbidden(e.to_string()),
        }
    }
}

impl From<ChannelsServiceError> for ApiError {
    fn from(e: ChannelsServiceError) -> Self {
        use ChannelsServiceError::*;
        match e {
            DbError(e) => e.into(),
            ChannelNotFound | UserNotFound | NotMember => ApiError::not_found(e.to_string()),
            AlreadyMember => ApiError::conflict(e.to_string()),
            NotOwner | OwnerRemoval => ApiError::forbidden(e.to_string()),
            Invalid(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_errors_are_masked() {
        let err: ApiError = UsersServiceError::DbError(DbErr::Custom("disk I/O".into())).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("disk"));
    }

    #[test]
    fn test_nested_errors_keep_their_status() {
        let err: ApiError =
            AccountsServiceError::Student(StudentsServiceError::RollNumberTaken).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.body().name, "ConflictError");
    }

    #[test]
    fn test_validation_is_bad_request() {
        let err: ApiError = ChannelsServiceError::Invalid(validate::Invalid::new("name too short")).into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "name too short");
    }
}
