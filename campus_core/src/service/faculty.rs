use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    entity::prelude::*,
    ids::{FacultyId, InstituteId},
    service::{
        users::{self, NewUser, UsersServiceError},
        validate::{self, Invalid},
        BulkFailure, BulkReport,
    },
};

#[derive(Debug, Error)]
pub enum FacultyServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("faculty not found")]
    FacultyNotFound,

    #[error("institute not found")]
    InstituteNotFound,

    #[error("employee code already used in this institute")]
    EmployeeCodeTaken,

    #[error("faculty belongs to another institute")]
    Forbidden,

    #[error(transparent)]
    User(#[from] UsersServiceError),

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewFaculty {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub phone: Option<String>,
    pub employee_code: String,
    pub department: String,
    pub designation: String,
    #[serde(default)]
    pub subject_area: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacultyUpdate {
    pub employee_code: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub subject_area: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FacultyFilter {
    pub institute_id: Option<InstituteId>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FacultyProfile {
    pub faculty: FacultyModel,
    pub user: UserModel,
}

#[derive(Clone)]
pub struct FacultyService {
    db: DatabaseConnection,
}

impl FacultyService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates the account and the faculty profile in one transaction.
    pub async fn create_faculty(
        &self,
        institute_id: InstituteId,
        new: NewFaculty,
    ) -> Result<FacultyProfile, FacultyServiceError> {
        let employee_code = validate::required("employee_code", &new.employee_code)?;
        let department = validate::required("department", &new.department)?;
        let designation = validate::required("designation", &new.designation)?;

        let txn = self.db.begin().await?;

        if Institute::find_by_id(institute_id).one(&txn).await?.is_none() {
            return Err(FacultyServiceError::InstituteNotFound);
        }

        let code_taken = Faculty::find()
            .filter(FacultyColumn::InstituteId.eq(institute_id))
            .filter(FacultyColumn::EmployeeCode.eq(employee_code.as_str()))
            .one(&txn)
            .await?
            .is_some();
        if code_taken {
            return Err(FacultyServiceError::EmployeeCodeTaken);
        }

        let user = users::insert_user(
            &txn,
            NewUser {
                name: new.name,
                email: new.email,
                password: new.password,
                role: Role::Faculty,
                gender: new.gender,
                phone: new.phone,
            },
        )
        .await?;

        let now = Utc::now();
        let faculty = FacultyActiveModel {
            id: Set(FacultyId::new()),
            user_id: Set(user.id),
            institute_id: Set(institute_id),
            employee_code: Set(employee_code),
            department: Set(department),
            designation: Set(designation),
            subject_area: Set(validate::optional(new.subject_area)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let faculty = Faculty::insert(faculty).exec_with_returning(&txn).await?;

        txn.commit().await?;
        info!(faculty_id = %faculty.id, %institute_id, "faculty created");
        Ok(FacultyProfile { faculty, user })
    }

    pub async fn bulk_create_faculty(
        &self,
        institute_id: InstituteId,
        rows: Vec<NewFaculty>,
    ) -> Result<BulkReport<FacultyProfile>, FacultyServiceError> {
        let mut report = BulkReport::default();
        for (index, row) in rows.into_iter().enumerate() {
            let key = row.email.clone();
            match self.create_faculty(institute_id, row).await {
                Ok(profile) => report.created.push(profile),
                Err(FacultyServiceError::DbError(err)) => return Err(err.into()),
                Err(err) => {
                    warn!(index, %key, "bulk faculty row rejected: {err}");
                    report.failed.push(BulkFailure {
                        index,
                        key,
                        reason: err.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    pub async fn get_faculty(
        &self,
        faculty_id: FacultyId,
    ) -> Result<FacultyProfile, FacultyServiceError> {
        let (faculty, user) = Faculty::find_by_id(faculty_id)
            .find_also_related(User)
            .one(&self.db)
            .await?
            .ok_or(FacultyServiceError::FacultyNotFound)?;
        let user = user.ok_or(FacultyServiceError::FacultyNotFound)?;
        Ok(FacultyProfile { faculty, user })
    }

    pub async fn list_faculty(
        &self,
        filter: FacultyFilter,
    ) -> Result<Vec<FacultyProfile>, FacultyServiceError> {
        let mut query = Faculty::find().find_also_related(User);

        if let Some(institute_id) = filter.institute_id {
            query = query.filter(FacultyColumn::InstituteId.eq(institute_id));
        }
        if let Some(department) = validate::optional(filter.department) {
            query = query.filter(FacultyColumn::Department.eq(department));
        }
        if let Some(designation) = validate::optional(filter.designation) {
            query = query.filter(FacultyColumn::Designation.eq(designation));
        }
        if let Some(term) = validate::optional(filter.search) {
            query = query.filter(
                Condition::any()
                    .add(FacultyColumn::EmployeeCode.contains(term.as_str()))
                    .add(UserColumn::Name.contains(term.as_str()))
                    .add(UserColumn::Email.contains(term.to_lowercase())),
            );
        }

        let rows = query
            .order_by_asc(FacultyColumn::EmployeeCode)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(faculty, user)| user.map(|user| FacultyProfile { faculty, user }))
            .collect())
    }

    pub async fn update_faculty(
        &self,
        faculty_id: FacultyId,
        scope: InstituteId,
        update: FacultyUpdate,
    ) -> Result<FacultyModel, FacultyServiceError> {
        let faculty = Faculty::find_by_id(faculty_id)
            .one(&self.db)
            .await?
            .ok_or(FacultyServiceError::FacultyNotFound)?;
        if faculty.institute_id != scope {
            return Err(FacultyServiceError::Forbidden);
        }

        let mut active: FacultyActiveModel = faculty.clone().into();
        if let Some(code) = update.employee_code {
            let code = validate::required("employee_code", &code)?;
            if code != faculty.employee_code {
                let taken = Faculty::find()
                    .filter(FacultyColumn::InstituteId.eq(scope))
                    .filter(FacultyColumn::EmployeeCode.eq(code.as_str()))
                    .one(&self.db)
                    .await?
                    .is_some();
                if taken {
                    return Err(FacultyServiceError::EmployeeCodeTaken);
                }
            }
            active.employee_code = Set(code);
        }
        if let Some(department) = update.department {
            active.department = Set(validate::required("department", &department)?);
        }
        if let Some(designation) = update.designation {
            active.designation = Set(validate::required("designation", &designation)?);
        }
        if update.subject_area.is_some() {
            active.subject_area = Set(validate::optional(update.subject_area));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    /// Removes the profile and its account together.
    pub async fn delete_faculty(
        &self,
        faculty_id: FacultyId,
        scope: InstituteId,
    ) -> Result<(), FacultyServiceError> {
        let txn = self.db.begin().await?;

        let faculty = Faculty::find_by_id(faculty_id)
            .one(&txn)
            .await?
            .ok_or(FacultyServiceError::FacultyNotFound)?;
        if faculty.institute_id != scope {
            return Err(FacultyServiceError::Forbidden);
        }

        Faculty::delete_by_id(faculty.id).exec(&txn).await?;
        User::delete_by_id(faculty.user_id).exec(&txn).await?;

        txn.commit().await?;
        info!(%faculty_id, "faculty deleted");
        Ok(())
    }
}
