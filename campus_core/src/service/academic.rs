use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    entity::prelude::*,
    ids::{AcademicRecordId, InstituteId, StudentId},
    service::validate::{self, Invalid},
};

#[derive(Debug, Error)]
pub enum AcademicServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("student not found")]
    StudentNotFound,

    #[error("academic record not found")]
    RecordNotFound,

    #[error("student already has an academic record")]
    RecordExists,

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAcademicRecord {
    #[serde(alias = "studentId")]
    pub student_id: StudentId,
    #[serde(default)]
    pub branch: Option<String>,
    pub year: i32,
    pub section: String,
    #[serde(default, alias = "universityId")]
    pub university_id: Option<String>,
    pub course: String,
    pub semester: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AcademicUpdate {
    pub branch: Option<String>,
    pub year: Option<i32>,
    pub section: Option<String>,
    #[serde(alias = "universityId")]
    pub university_id: Option<String>,
    pub course: Option<String>,
    pub semester: Option<String>,
}

fn check_year(year: i32) -> Result<i32, Invalid> {
    if year < 1 {
        return Err(Invalid::new("year must be at least 1"));
    }
    Ok(year)
}

#[derive(Clone)]
pub struct AcademicService {
    db: DatabaseConnection,
}

impl AcademicService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Students outside `scope` are reported as missing.
    async fn scoped_student(
        &self,
        student_id: StudentId,
        scope: InstituteId,
    ) -> Result<StudentModel, AcademicServiceError> {
        match Student::find_by_id(student_id).one(&self.db).await? {
            Some(student) if student.institute_id == scope => Ok(student),
            _ => Err(AcademicServiceError::StudentNotFound),
        }
    }

    async fn find_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Option<AcademicRecordModel>, AcademicServiceError> {
        Ok(AcademicRecord::find()
            .filter(AcademicRecordColumn::StudentId.eq(student_id))
            .one(&self.db)
            .await?)
    }

    pub async fn create_record(
        &self,
        scope: InstituteId,
        new: NewAcademicRecord,
    ) -> Result<AcademicRecordModel, AcademicServiceError> {
        let section = validate::required("section", &new.section)?;
        let course = validate::required("course", &new.course)?;
        let semester = validate::required("semester", &new.semester)?;
        let year = check_year(new.year)?;

        let student = self.scoped_student(new.student_id, scope).await?;
        if self.find_for_student(student.id).await?.is_some() {
            return Err(AcademicServiceError::RecordExists);
        }

        let now = Utc::now();
        let record = AcademicRecord::insert(AcademicRecordActiveModel {
            id: Set(AcademicRecordId::new()),
            student_id: Set(student.id),
            branch: Set(validate::optional(new.branch)),
            year: Set(year),
            section: Set(section),
            university_id: Set(validate::optional(new.university_id)),
            course: Set(course),
            semester: Set(semester),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_with_returning(&self.db)
        .await?;

        info!(student_id = %student.id, "academic record created");
        Ok(record)
    }

    pub async fn get_for_student(
        &self,
        student_id: StudentId,
        scope: InstituteId,
    ) -> Result<AcademicRecordModel, AcademicServiceError> {
        self.scoped_student(student_id, scope).await?;
        self.find_for_student(student_id)
            .await?
            .ok_or(AcademicServiceError::RecordNotFound)
    }

    pub async fn update_for_student(
        &self,
        student_id: StudentId,
        scope: InstituteId,
        update: AcademicUpdate,
    ) -> Result<AcademicRecordModel, AcademicServiceError> {
        let record = self.get_for_student(student_id, scope).await?;

        let mut active: AcademicRecordActiveModel = record.into();
        if update.branch.is_some() {
            active.branch = Set(validate::optional(update.branch));
        }
        if let Some(year) = update.year {
            active.year = Set(check_year(year)?);
        }
        if let Some(section) = update.section {
            active.section = Set(validate::required("section", &section)?);
        }
        if update.university_id.is_some() {
            active.university_id = Set(validate::optional(update.university_id));
        }
        if let Some(course) = update.course {
            active.course = Set(validate::required("course", &course)?);
        }
        if let Some(semester) = update.semester {
            active.semester = Set(validate::required("semester", &semester)?);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    fn new_record(student_id: StudentId) -> NewAcademicRecord {
        NewAcademicRecord {
            student_id,
            branch: Some("CSE".to_string()),
            year: 2,
            section: "A".to_string(),
            university_id: Some("VTU-1RV22CS001".to_string()),
            course: "B.E.".to_string(),
            semester: "3".to_string(),
        }
    }

    async fn setup() -> (AcademicService, InstituteModel, StudentModel) {
        let db = test_utils::setup_db().await;
        let institute = test_utils::create_test_institute(&db).await;
        let student = test_utils::create_test_student(&db, institute.id, "1RV22CS001").await;
        (AcademicService::new(db), institute, student)
    }

    #[tokio::test]
    async fn test_create_and_get_record() {
        let (service, institute, student) = setup().await;
        let created = service
            .create_record(institute.id, new_record(student.id))
            .await
            .unwrap();
        assert_eq!(created.university_id.as_deref(), Some("VTU-1RV22CS001"));

        let found = service
            .get_for_student(student.id, institute.id)
            .await
            .unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_one_record_per_student() {
        let (service, institute, student) = setup().await;
        service
            .create_record(institute.id, new_record(student.id))
            .await
            .unwrap();
        let result = service
            .create_record(institute.id, new_record(student.id))
            .await;
        assert!(matches!(result, Err(AcademicServiceError::RecordExists)));
    }

    #[tokio::test]
    async fn test_other_institute_cannot_see_record() {
        let (service, institute, student) = setup().await;
        service
            .create_record(institute.id, new_record(student.id))
            .await
            .unwrap();

        let other = test_utils::create_test_institute(&service.db).await;
        let result = service.get_for_student(student.id, other.id).await;
        assert!(matches!(result, Err(AcademicServiceError::StudentNotFound)));
    }

    #[tokio::test]
    async fn test_update_record() {
        let (service, institute, student) = setup().await;
        service
            .create_record(institute.id, new_record(student.id))
            .await
            .unwrap();

        let updated = service
            .update_for_student(
                student.id,
                institute.id,
                AcademicUpdate {
                    year: Some(3),
                    semester: Some("5".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.year, 3);
        assert_eq!(updated.semester, "5");
        assert_eq!(updated.course, "B.E.");

        let rejected = service
            .update_for_student(
                student.id,
                institute.id,
                AcademicUpdate {
                    year: Some(0),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(rejected, Err(AcademicServiceError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_missing_record() {
        let (service, institute, student) = setup().await;
        let result = service.get_for_student(student.id, institute.id).await;
        assert!(matches!(result, Err(AcademicServiceError::RecordNotFound)));
    }

    #[test]
    fn test_accepts_camel_case_payload() {
        let student_id = StudentId::new();
        let new: NewAcademicRecord = serde_json::from_value(serde_json::json!({
            "studentId": student_id,
            "year": 1,
            "section": "B",
            "universityId": "U-7",
            "course": "BCA",
            "semester": "1"
        }))
        .unwrap();
        assert_eq!(new.student_id, student_id);
        assert_eq!(new.university_id.as_deref(), Some("U-7"));
    }
}
