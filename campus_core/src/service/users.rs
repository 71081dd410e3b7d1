use chrono::Utc;
use sea_orm::{sea_query::Expr, ConnectionTrait, DatabaseConnection};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::{
    auth::{self, AuthError, Identity},
    entity::prelude::*,
    ids::UserId,
    service::validate::{self, Invalid},
};

#[derive(Debug, Error)]
pub enum UsersServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("user not found")]
    UserNotFound,

    #[error("email already registered")]
    EmailTaken,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error(transparent)]
    Invalid(#[from] Invalid),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Fields needed to create any account.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub gender: Option<Gender>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
}

/// Inserts a user row on any connection, so registrations can run it inside
/// their own transaction.
pub async fn insert_user<C: ConnectionTrait>(
    conn: &C,
    new: NewUser,
) -> Result<UserModel, UsersServiceError> {
    let name = validate::name(&new.name)?;
    let email = validate::email(&new.email)?;
    validate::password(&new.password)?;

    let taken = User::find()
        .filter(UserColumn::Email.eq(email.as_str()))
        .one(conn)
        .await?
        .is_some();
    if taken {
        return Err(UsersServiceError::EmailTaken);
    }

    let now = Utc::now();
    let user = UserActiveModel {
        id: Set(UserId::new()),
        name: Set(name),
        email: Set(email),
        password_hash: Set(auth::hash_password(&new.password)?),
        role: Set(new.role),
        gender: Set(new.gender),
        phone: Set(validate::optional(new.phone)),
        profile_picture: Set(None),
        presence: Set(Presence::Offline),
        created_at: Set(now),
        updated_at: Set(now),
    };

    Ok(User::insert(user).exec_with_returning(conn).await?)
}

/// Builds the session identity for a user by looking up its role profile.
pub async fn resolve_identity<C: ConnectionTrait>(
    conn: &C,
    user: &UserModel,
) -> Result<Identity, DbErr> {
    let mut identity = Identity {
        user_id: user.id,
        email: user.email.clone(),
        name: user.name.clone(),
        role: user.role,
        institute_id: None,
        admin_id: None,
        student_id: None,
        faculty_id: None,
    };

    match user.role {
        Role::Admin => {
            if let Some(admin) = Admin::find()
                .filter(AdminColumn::UserId.eq(user.id))
                .one(conn)
                .await?
            {
                identity.admin_id = Some(admin.id);
                identity.institute_id = Some(admin.institute_id);
            }
        }
        Role::Student => {
            if let Some(student) = Student::find()
                .filter(StudentColumn::UserId.eq(user.id))
                .one(conn)
                .await?
            {
                identity.student_id = Some(student.id);
                identity.institute_id = Some(student.institute_id);
            }
        }
        Role::Faculty => {
            if let Some(faculty) = Faculty::find()
                .filter(FacultyColumn::UserId.eq(user.id))
                .one(conn)
                .await?
            {
                identity.faculty_id = Some(faculty.id);
                identity.institute_id = Some(faculty.institute_id);
            }
        }
        Role::Member => {}
    }

    Ok(identity)
}

#[derive(Clone)]
pub struct UsersService {
    db: DatabaseConnection,
}

impl UsersService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<UserModel, UsersServiceError> {
        User::find_by_id(user_id)
            .one(&self.db)
            .await?
            .ok_or(UsersServiceError::UserNotFound)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<UserModel>, UsersServiceError> {
        let email = email.trim().to_lowercase();
        Ok(User::find()
            .filter(UserColumn::Email.eq(email))
            .one(&self.db)
            .await?)
    }

    /// Lists users whose name or email contains `search`, for the chat directory.
    pub async fn search_users(
        &self,
        search: Option<&str>,
        limit: u64,
    ) -> Result<Vec<UserModel>, UsersServiceError> {
        let mut query = User::find();
        if let Some(term) = search.map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(UserColumn::Name.contains(term))
                    .add(UserColumn::Email.contains(term.to_lowercase())),
            );
        }
        Ok(query
            .order_by_asc(UserColumn::Name)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    pub async fn update_user(
        &self,
        user_id: UserId,
        update: UserUpdate,
    ) -> Result<UserModel, UsersServiceError> {
        let user = self.get_user(user_id).await?;
        let mut active: UserActiveModel = user.into();

        if let Some(name) = update.name {
            active.name = Set(validate::name(&name)?);
        }
        if let Some(gender) = update.gender {
            active.gender = Set(Some(gender));
        }
        if update.phone.is_some() {
            active.phone = Set(validate::optional(update.phone));
        }
        if update.profile_picture.is_some() {
            active.profile_picture = Set(validate::optional(update.profile_picture));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    pub async fn set_presence(
        &self,
        user_id: UserId,
        presence: Presence,
    ) -> Result<(), UsersServiceError> {
        debug!(%user_id, ?presence, "persisting presence");
        let result = User::update_many()
            .col_expr(UserColumn::Presence, Expr::value(presence))
            .filter(UserColumn::Id.eq(user_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(UsersServiceError::UserNotFound);
        }
        Ok(())
    }

    /// Checks credentials and returns the user with its session identity.
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(UserModel, Identity), UsersServiceError> {
        let user = self
            .find_by_email(email)
            .await?
            .ok_or(UsersServiceError::InvalidCredentials)?;

        if !auth::verify_password(password, &user.password_hash) {
            return Err(UsersServiceError::InvalidCredentials);
        }

        let identity = resolve_identity(&self.db, &user).await?;
        Ok((user, identity))
    }

    pub async fn identity(&self, user_id: UserId) -> Result<Identity, UsersServiceError> {
        let user = self.get_user(user_id).await?;
        Ok(resolve_identity(&self.db, &user).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    async fn setup_test_service() -> UsersService {
        UsersService::new(test_utils::setup_db().await)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Asha Rao".to_string(),
            email: email.to_string(),
            password: "secret123".to_string(),
            role: Role::Member,
            gender: None,
            phone: None,
        }
    }

    #[tokio::test]
    async fn test_insert_user_normalizes_email() {
        let service = setup_test_service().await;
        let user = insert_user(&service.db, new_user("Asha@Example.com"))
            .await
            .unwrap();
        assert_eq!(user.email, "asha@example.com");
        assert_eq!(user.presence, Presence::Offline);
        assert_ne!(user.password_hash, "secret123");
    }

    #[tokio::test]
    async fn test_duplicate_email_is_rejected_case_insensitively() {
        let service = setup_test_service().await;
        insert_user(&service.db, new_user("asha@example.com"))
            .await
            .unwrap();

        let result = insert_user(&service.db, new_user("ASHA@example.com")).await;
        assert!(matches!(result, Err(UsersServiceError::EmailTaken)));
    }

    #[tokio::test]
    async fn test_short_password_is_rejected() {
        let service = setup_test_service().await;
        let mut user = new_user("asha@example.com");
        user.password = "abc".to_string();
        let result = insert_user(&service.db, user).await;
        assert!(matches!(result, Err(UsersServiceError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let service = setup_test_service().await;
        let created = insert_user(&service.db, new_user("asha@example.com"))
            .await
            .unwrap();

        let (user, identity) = service
            .authenticate("ASHA@example.com", "secret123")
            .await
            .unwrap();
        assert_eq!(user.id, created.id);
        assert_eq!(identity.role, Role::Member);
        assert_eq!(identity.institute_id, None);

        let wrong = service.authenticate("asha@example.com", "nope123").await;
        assert!(matches!(wrong, Err(UsersServiceError::InvalidCredentials)));

        let unknown = service.authenticate("ghost@example.com", "secret123").await;
        assert!(matches!(unknown, Err(UsersServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_update_user() {
        let service = setup_test_service().await;
        let user = insert_user(&service.db, new_user("asha@example.com"))
            .await
            .unwrap();

        let updated = service
            .update_user(
                user.id,
                UserUpdate {
                    name: Some("Asha R".to_string()),
                    phone: Some("9999999999".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Asha R");
        assert_eq!(updated.phone.as_deref(), Some("9999999999"));
        assert_eq!(updated.email, user.email);
    }

    #[tokio::test]
    async fn test_set_presence() {
        let service = setup_test_service().await;
        let user = insert_user(&service.db, new_user("asha@example.com"))
            .await
            .unwrap();

        service.set_presence(user.id, Presence::Active).await.unwrap();
        assert_eq!(service.get_user(user.id).await.unwrap().presence, Presence::Active);

        let missing = service.set_presence(UserId::new(), Presence::Active).await;
        assert!(matches!(missing, Err(UsersServiceError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_search_users() {
        let service = setup_test_service().await;
        insert_user(&service.db, new_user("asha@example.com"))
            .await
            .unwrap();
        let mut other = new_user("ravi@example.com");
        other.name = "Ravi Kumar".to_string();
        insert_user(&service.db, other).await.unwrap();

        let found = service.search_users(Some("ravi"), 10).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].email, "ravi@example.com");

        let all = service.search_users(None, 10).await.unwrap();
        assert_eq!(all.len(), 2);
    }
}
