use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    auth::{AuthError, Identity, TokenSigner},
    entity::prelude::*,
    ids::{InstituteId, UserId},
    service::{
        admins,
        faculty::{FacultyProfile, FacultyService, FacultyServiceError, NewFaculty},
        institutes::{self, InstitutesServiceError, NewInstitute},
        students::{NewStudent, StudentProfile, StudentsService, StudentsServiceError},
        users::{self, NewUser, UsersService, UsersServiceError},
    },
};

#[derive(Debug, Error)]
pub enum AccountsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error(transparent)]
    User(#[from] UsersServiceError),

    #[error(transparent)]
    Institute(#[from] InstitutesServiceError),

    #[error(transparent)]
    Student(#[from] StudentsServiceError),

    #[error(transparent)]
    Faculty(#[from] FacultyServiceError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Signup {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub gender: Option<Gender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
}

/// Institute fields plus the first admin's account.
#[derive(Debug, Clone, Deserialize)]
pub struct InstituteRegistration {
    #[serde(flatten)]
    pub institute: NewInstitute,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
    #[serde(default)]
    pub admin_gender: Option<Gender>,
    #[serde(default)]
    pub admin_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: UserModel,
    pub identity: Identity,
    pub token: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstituteRegistered {
    pub institute: InstituteModel,
    pub admin: AdminModel,
    #[serde(flatten)]
    pub session: Session,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentRegistered {
    pub student: StudentModel,
    #[serde(flatten)]
    pub session: Session,
}

#[derive(Debug, Clone, Serialize)]
pub struct FacultyRegistered {
    pub faculty: FacultyModel,
    #[serde(flatten)]
    pub session: Session,
}

#[derive(Clone)]
pub struct AccountsService {
    db: DatabaseConnection,
    signer: TokenSigner,
    users: UsersService,
    students: StudentsService,
    faculty: FacultyService,
}

impl AccountsService {
    pub fn new(db: DatabaseConnection, signer: TokenSigner) -> Self {
        Self {
            users: UsersService::new(db.clone()),
            students: StudentsService::new(db.clone()),
            faculty: FacultyService::new(db.clone()),
            db,
            signer,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    fn session(&self, user: UserModel, identity: Identity) -> Result<Session, AccountsServiceError> {
        let token = self.signer.issue(&identity)?;
        Ok(Session {
            user,
            identity,
            token,
            expires_in: self.signer.ttl().num_seconds(),
        })
    }

    /// Self-service chat account.
    pub async fn signup(&self, signup: Signup) -> Result<Session, AccountsServiceError> {
        let user = users::insert_user(
            &self.db,
            NewUser {
                name: signup.name,
                email: signup.email,
                password: signup.password,
                role: Role::Member,
                gender: signup.gender,
                phone: None,
            },
        )
        .await?;
        info!(user_id = %user.id, "member signed up");

        let identity = users::resolve_identity(&self.db, &user).await?;
        self.session(user, identity)
    }

    pub async fn login(&self, login: Login) -> Result<Session, AccountsServiceError> {
        let (user, identity) = self
            .users
            .authenticate(&login.email, &login.password)
            .await?;
        info!(user_id = %user.id, role = ?user.role, "user logged in");
        self.session(user, identity)
    }

    /// Creates the institute, its first admin account and the admin profile atomically.
    pub async fn register_institute(
        &self,
        registration: InstituteRegistration,
    ) -> Result<InstituteRegistered, AccountsServiceError> {
        let txn = self.db.begin().await?;

        let institute = institutes::insert_institute(&txn, registration.institute).await?;
        let user = users::insert_user(
            &txn,
            NewUser {
                name: registration.admin_name,
                email: registration.admin_email,
                password: registration.admin_password,
                role: Role::Admin,
                gender: registration.admin_gender,
                phone: registration.admin_phone,
            },
        )
        .await?;
        let admin = admins::insert_admin(&txn, user.id, institute.id).await?;

        txn.commit().await?;
        info!(institute_id = %institute.id, admin_id = %admin.id, "institute registered");

        let identity = users::resolve_identity(&self.db, &user).await?;
        let session = self.session(user, identity)?;
        Ok(InstituteRegistered {
            institute,
            admin,
            session,
        })
    }

    pub async fn register_student(
        &self,
        institute_id: InstituteId,
        new: NewStudent,
    ) -> Result<StudentRegistered, AccountsServiceError> {
        let StudentProfile { student, user } =
            self.students.create_student(institute_id, new).await?;
        let identity = users::resolve_identity(&self.db, &user).await?;
        let session = self.session(user, identity)?;
        Ok(StudentRegistered { student, session })
    }

    pub async fn register_faculty(
        &self,
        institute_id: InstituteId,
        new: NewFaculty,
    ) -> Result<FacultyRegistered, AccountsServiceError> {
        let FacultyProfile { faculty, user } =
            self.faculty.create_faculty(institute_id, new).await?;
        let identity = users::resolve_identity(&self.db, &user).await?;
        let session = self.session(user, identity)?;
        Ok(FacultyRegistered { faculty, session })
    }

    /// Identity rebuilt from the database, so profile ids added after login show up.
    pub async fn me(&self, user_id: UserId) -> Result<Identity, AccountsServiceError> {
        Ok(self.users.identity(user_id).await?)
    }
}
