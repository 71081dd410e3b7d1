use chrono::Utc;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    entity::prelude::*,
    ids::{InstituteId, ProgramId, StudentId},
    service::{
        users::{self, NewUser, UsersServiceError},
        validate::{self, Invalid},
        BulkFailure, BulkReport,
    },
};

#[derive(Debug, Error)]
pub enum StudentsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("student not found")]
    StudentNotFound,

    #[error("institute not found")]
    InstituteNotFound,

    #[error("program not found in this institute")]
    ProgramNotFound,

    #[error("roll number already used in this institute")]
    RollNumberTaken,

    #[error("student belongs to another institute")]
    Forbidden,

    #[error(transparent)]
    User(#[from] UsersServiceError),

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub phone: Option<String>,
    pub roll_number: String,
    #[serde(default)]
    pub program_id: Option<ProgramId>,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub semester: Option<i32>,
    #[serde(default)]
    pub section: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentUpdate {
    pub roll_number: Option<String>,
    pub program_id: Option<ProgramId>,
    pub year: Option<i32>,
    pub semester: Option<i32>,
    pub section: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StudentFilter {
    pub institute_id: Option<InstituteId>,
    pub program_id: Option<ProgramId>,
    pub year: Option<i32>,
    pub semester: Option<i32>,
    pub section: Option<String>,
    pub search: Option<String>,
}

/// A student row joined with its account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentProfile {
    pub student: StudentModel,
    pub user: UserModel,
}

#[derive(Clone)]
pub struct StudentsService {
    db: DatabaseConnection,
}

impl StudentsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn check_program(
        &self,
        conn: &impl sea_orm::ConnectionTrait,
        institute_id: InstituteId,
        program_id: ProgramId,
    ) -> Result<(), StudentsServiceError> {
        let program = Program::find_by_id(program_id).one(conn).await?;
        match program {
            Some(program) if program.institute_id == institute_id => Ok(()),
            _ => Err(StudentsServiceError::ProgramNotFound),
        }
    }

    /// Creates the account and the student profile in one transaction.
    pub async fn create_student(
        &self,
        institute_id: InstituteId,
        new: NewStudent,
    ) -> Result<StudentProfile, StudentsServiceError> {
        let roll_number = validate::required("roll_number", &new.roll_number)?;

        let txn = self.db.begin().await?;

        if Institute::find_by_id(institute_id).one(&txn).await?.is_none() {
            return Err(StudentsServiceError::InstituteNotFound);
        }
        if let Some(program_id) = new.program_id {
            self.check_program(&txn, institute_id, program_id).await?;
        }

        let roll_taken = Student::find()
            .filter(StudentColumn::InstituteId.eq(institute_id))
            .filter(StudentColumn::RollNumber.eq(roll_number.as_str()))
            .one(&txn)
            .await?
            .is_some();
        if roll_taken {
            return Err(StudentsServiceError::RollNumberTaken);
        }

        let user = users::insert_user(
            &txn,
            NewUser {
                name: new.name,
                email: new.email,
                password: new.password,
                role: Role::Student,
                gender: new.gender,
                phone: new.phone,
            },
        )
        .await?;

        let now = Utc::now();
        let student = StudentActiveModel {
            id: Set(StudentId::new()),
            user_id: Set(user.id),
            institute_id: Set(institute_id),
            program_id: Set(new.program_id),
            roll_number: Set(roll_number),
            year: Set(new.year),
            semester: Set(new.semester),
            section: Set(validate::optional(new.section)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let student = Student::insert(student).exec_with_returning(&txn).await?;

        txn.commit().await?;
        info!(student_id = %student.id, %institute_id, "student created");
        Ok(StudentProfile { student, user })
    }

    /// Creates each row independently; one bad row does not stop the rest.
    pub async fn bulk_create_students(
        &self,
        institute_id: InstituteId,
        rows: Vec<NewStudent>,
    ) -> Result<BulkReport<StudentProfile>, StudentsServiceError> {
        let mut report = BulkReport::default();
        for (index, row) in rows.into_iter().enumerate() {
            let key = row.email.clone();
            match self.create_student(institute_id, row).await {
                Ok(profile) => report.created.push(profile),
                Err(StudentsServiceError::DbError(err)) => return Err(err.into()),
                Err(err) => {
                    warn!(index, %key, "bulk student row rejected: {err}");
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

    pub async fn get_student(
        &self,
        student_id: StudentId,
    ) -> Result<StudentProfile, StudentsServiceError> {
        let (student, user) = Student::find_by_id(student_id)
            .find_also_related(User)
            .one(&self.db)
            .await?
            .ok_or(StudentsServiceError::StudentNotFound)?;
        let user = user.ok_or(StudentsServiceError::StudentNotFound)?;
        Ok(StudentProfile { student, user })
    }

    pub async fn list_students(
        &self,
        filter: StudentFilter,
    ) -> Result<Vec<StudentProfile>, StudentsServiceError> {
        let mut query = Student::find().find_also_related(User);

        if let Some(institute_id) = filter.institute_id {
            query = query.filter(StudentColumn::InstituteId.eq(institute_id));
        }
        if let Some(program_id) = filter.program_id {
            query = query.filter(StudentColumn::ProgramId.eq(program_id));
        }
        if let Some(year) = filter.year {
            query = query.filter(StudentColumn::Year.eq(year));
        }
        if let Some(semester) = filter.semester {
            query = query.filter(StudentColumn::Semester.eq(semester));
        }
        if let Some(section) = validate::optional(filter.section) {
            query = query.filter(StudentColumn::Section.eq(section));
        }
        if let Some(term) = validate::optional(filter.search) {
            query = query.filter(
                Condition::any()
                    .add(StudentColumn::RollNumber.contains(term.as_str()))
                    .add(UserColumn::Name.contains(term.as_str()))
                    .add(UserColumn::Email.contains(term.to_lowercase())),
            );
        }

        let rows = query
            .order_by_asc(StudentColumn::RollNumber)
            .all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(student, user)| user.map(|user| StudentProfile { student, user }))
            .collect())
    }

    pub async fn update_student(
        &self,
        student_id: StudentId,
        scope: InstituteId,
        update: StudentUpdate,
    ) -> Result<StudentModel, StudentsServiceError> {
        let student = Student::find_by_id(student_id)
            .one(&self.db)
            .await?
            .ok_or(StudentsServiceError::StudentNotFound)?;
        if student.institute_id != scope {
            return Err(StudentsServiceError::Forbidden);
        }

        if let Some(program_id) = update.program_id {
            self.check_program(&self.db, scope, program_id).await?;
        }

        let mut active: StudentActiveModel = student.clone().into();
        if let Some(roll_number) = update.roll_number {
            let roll_number = validate::required("roll_number", &roll_number)?;
            if roll_number != student.roll_number {
                let taken = Student::find()
                    .filter(StudentColumn::InstituteId.eq(scope))
                    .filter(StudentColumn::RollNumber.eq(roll_number.as_str()))
                    .one(&self.db)
                    .await?
                    .is_some();
                if taken {
                    return Err(StudentsServiceError::RollNumberTaken);
                }
            }
            active.roll_number = Set(roll_number);
        }
        if update.program_id.is_some() {
            active.program_id = Set(update.program_id);
        }
        if update.year.is_some() {
            active.year = Set(update.year);
        }
        if update.semester.is_some() {
            active.semester = Set(update.semester);
        }
        if update.section.is_some() {
            active.section = Set(validate::optional(update.section));
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    /// Removes the profile and its account together.
    pub async fn delete_student(
        &self,
        student_id: StudentId,
        scope: InstituteId,
    ) -> Result<(), StudentsServiceError> {
        let txn = self.db.begin().await?;

        let student = Student::find_by_id(student_id)
            .one(&txn)
            .await?
            .ok_or(StudentsServiceError::StudentNotFound)?;
        if student.institute_id != scope {
            return Err(StudentsServiceError::Forbidden);
        }

        Student::delete_by_id(student.id).exec(&txn).await?;
        User::delete_by_id(student.user_id).exec(&txn).await?;

        txn.commit().await?;
        info!(%student_id, "student deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    async fn setup() -> (StudentsService, InstituteModel) {
        let db = test_utils::setup_db().await;
        let institute = test_utils::create_test_institute(&db).await;
        (StudentsService::new(db), institute)
    }

    #[tokio::test]
    async fn test_create_student_creates_account() {
        let (service, institute) = setup().await;
        let profile = service
            .create_student(institute.id, test_utils::new_student("1RV22CS001"))
            .await
            .unwrap();

        assert_eq!(profile.user.role, Role::Student);
        assert_eq!(profile.student.user_id, profile.user.id);
        assert_eq!(profile.student.institute_id, institute.id);
    }

    #[tokio::test]
    async fn test_roll_number_unique_per_institute() {
        let (service, institute) = setup().await;
        service
            .create_student(institute.id, test_utils::new_student("1RV22CS001"))
            .await
            .unwrap();

        let mut dup = test_utils::new_student("1RV22CS001");
        dup.email = "other@students.campus.edu".to_string();
        let result = service.create_student(institute.id, dup).await;
        assert!(matches!(result, Err(StudentsServiceError::RollNumberTaken)));

        let other = test_utils::create_test_institute(&service.db).await;
        let mut elsewhere = test_utils::new_student("1RV22CS001");
        elsewhere.email = "third@students.campus.edu".to_string();
        assert!(service.create_student(other.id, elsewhere).await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_create_leaves_no_account() {
        let (service, institute) = setup().await;
        let mut bad = test_utils::new_student("1RV22CS001");
        bad.program_id = Some(ProgramId::new());

        let result = service.create_student(institute.id, bad).await;
        assert!(matches!(result, Err(StudentsServiceError::ProgramNotFound)));

        let accounts = User::find().all(&service.db).await.unwrap();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_institute() {
        let (service, _) = setup().await;
        let result = service
            .create_student(InstituteId::new(), test_utils::new_student("X1"))
            .await;
        assert!(matches!(result, Err(StudentsServiceError::InstituteNotFound)));
    }

    #[tokio::test]
    async fn test_bulk_create_reports_failures() {
        let (service, institute) = setup().await;
        let mut dup_email = test_utils::new_student("R3");
        dup_email.email = "r1@students.campus.edu".to_string();

        let report = service
            .bulk_create_students(
                institute.id,
                vec![
                    test_utils::new_student("R1"),
                    test_utils::new_student("R2"),
                    dup_email,
                ],
            )
            .await
            .unwrap();

        assert_eq!(report.created.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 2);
        assert_eq!(report.failed[0].reason, "email already registered");
    }

    #[tokio::test]
    async fn test_list_students_filters() {
        let (service, institute) = setup().await;
        service
            .create_student(institute.id, test_utils::new_student("R1"))
            .await
            .unwrap();
        let mut second = test_utils::new_student("R2");
        second.year = Some(4);
        service.create_student(institute.id, second).await.unwrap();

        let all = service
            .list_students(StudentFilter {
                institute_id: Some(institute.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let fourth_year = service
            .list_students(StudentFilter {
                institute_id: Some(institute.id),
                year: Some(4),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(fourth_year.len(), 1);
        assert_eq!(fourth_year[0].student.roll_number, "R2");

        let searched = service
            .list_students(StudentFilter {
                search: Some("Student R1".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(searched.len(), 1);
    }

    #[tokio::test]
    async fn test_update_student_scoped_to_institute() {
        let (service, institute) = setup().await;
        let profile = service
            .create_student(institute.id, test_utils::new_student("R1"))
            .await
            .unwrap();

        let update = StudentUpdate {
            semester: Some(5),
            ..Default::default()
        };
        let denied = service
            .update_student(profile.student.id, InstituteId::new(), update.clone())
            .await;
        assert!(matches!(denied, Err(StudentsServiceError::Forbidden)));

        let updated = service
            .update_student(profile.student.id, institute.id, update)
            .await
            .unwrap();
        assert_eq!(updated.semester, Some(5));
    }

    #[tokio::test]
    async fn test_delete_student_removes_account() {
        let (service, institute) = setup().await;
        let profile = service
            .create_student(institute.id, test_utils::new_student("R1"))
            .await
            .unwrap();

        service
            .delete_student(profile.student.id, institute.id)
            .await
            .unwrap();

        assert!(matches!(
            service.get_student(profile.student.id).await,
            Err(StudentsServiceError::StudentNotFound)
        ));
        let user = User::find_by_id(profile.user.id).one(&service.db).await.unwrap();
        assert!(user.is_none());
    }
}
