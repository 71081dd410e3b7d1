use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::{
    entity::prelude::*,
    ids::{AdminId, InstituteId, UserId},
};

#[derive(Debug, Error)]
pub enum AdminsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("admin not found")]
    AdminNotFound,

    #[error("admin belongs to another institute")]
    Forbidden,

    #[error("an admin cannot remove their own profile")]
    SelfRemoval,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminProfile {
    pub admin: AdminModel,
    pub user: UserModel,
}

pub async fn insert_admin<C: ConnectionTrait>(
    conn: &C,
    user_id: UserId,
    institute_id: InstituteId,
) -> Result<AdminModel, DbErr> {
    let admin = AdminActiveModel {
        id: Set(AdminId::new()),
        user_id: Set(user_id),
        institute_id: Set(institute_id),
        created_at: Set(Utc::now()),
    };
    Admin::insert(admin).exec_with_returning(conn).await
}

#[derive(Clone)]
pub struct AdminsService {
    db: DatabaseConnection,
}

impl AdminsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_admin(&self, admin_id: AdminId) -> Result<AdminProfile, AdminsServiceError> {
        let (admin, user) = Admin::find_by_id(admin_id)
            .find_also_related(User)
            .one(&self.db)
            .await?
            .ok_or(AdminsServiceError::AdminNotFound)?;
        let user = user.ok_or(AdminsServiceError::AdminNotFound)?;
        Ok(AdminProfile { admin, user })
    }

    pub async fn list_admins(
        &self,
        institute_id: InstituteId,
    ) -> Result<Vec<AdminProfile>, AdminsServiceError> {
        let rows = Admin::find()
            .find_also_related(User)
            .filter(AdminColumn::InstituteId.eq(institute_id))
            .order_by_asc(AdminColumn::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(admin, user)| user.map(|user| AdminProfile { admin, user }))
            .collect())
    }

    /// Removes another admin of the same institute along with their account.
    pub async fn delete_admin(
        &self,
        admin_id: AdminId,
        acting: AdminId,
        scope: InstituteId,
    ) -> Result<(), AdminsServiceError> {
        if admin_id == acting {
            return Err(AdminsServiceError::SelfRemoval);
        }

        let txn = self.db.begin().await?;
        let admin = Admin::find_by_id(admin_id)
            .one(&txn)
            .await?
            .ok_or(AdminsServiceError::AdminNotFound)?;
        if admin.institute_id != scope {
            return Err(AdminsServiceError::Forbidden);
        }

        Admin::delete_by_id(admin.id).exec(&txn).await?;
        User::delete_by_id(admin.user_id).exec(&txn).await?;
        txn.commit().await?;

        info!(%admin_id, "admin removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    #[tokio::test]
    async fn test_admin_lifecycle() {
        let db = test_utils::setup_db().await;
        let institute = test_utils::create_test_institute(&db).await;
        let first = test_utils::create_test_user(&db, "First Admin", Role::Admin).await;
        let second = test_utils::create_test_user(&db, "Second Admin", Role::Admin).await;

        let a = insert_admin(&db, first.id, institute.id).await.unwrap();
        let b = insert_admin(&db, second.id, institute.id).await.unwrap();

        let service = AdminsService::new(db.clone());
        assert_eq!(service.list_admins(institute.id).await.unwrap().len(), 2);
        assert_eq!(service.get_admin(a.id).await.unwrap().user.id, first.id);

        assert!(matches!(
            service.delete_admin(a.id, a.id, institute.id).await,
            Err(AdminsServiceError::SelfRemoval)
        ));
        assert!(matches!(
            service.delete_admin(b.id, a.id, InstituteId::new()).await,
            Err(AdminsServiceError::Forbidden)
        ));

        service.delete_admin(b.id, a.id, institute.id).await.unwrap();
        assert_eq!(service.list_admins(institute.id).await.unwrap().len(), 1);
        assert!(User::find_by_id(second.id).one(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_admin_user_is_unique() {
        let db = test_utils::setup_db().await;
        let institute = test_utils::create_test_institute(&db).await;
        let user = test_utils::create_test_user(&db, "Only Admin", Role::Admin).await;

        insert_admin(&db, user.id, institute.id).await.unwrap();
        assert!(insert_admin(&db, user.id, institute.id).await.is_err());
    }
}
