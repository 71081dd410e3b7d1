use chrono::Utc;
use sea_orm::{sea_query::SimpleExpr, DatabaseConnection};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    entity::prelude::*,
    ids::{InstituteId, ProgramId},
    service::{
        validate::{self, Invalid},
        BulkFailure, BulkReport,
    },
};

#[derive(Debug, Error)]
pub enum ProgramsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("program not found")]
    ProgramNotFound,

    #[error("institute not found")]
    InstituteNotFound,

    #[error("program already exists for this institute")]
    DuplicateProgram,

    #[error("program belongs to another institute")]
    Forbidden,

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProgram {
    pub level: ProgramLevel,
    pub degree: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub specialization: Option<String>,
    pub intake: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramUpdate {
    pub level: Option<ProgramLevel>,
    pub degree: Option<String>,
    pub branch: Option<String>,
    pub specialization: Option<String>,
    pub intake: Option<i32>,
}

fn check_intake(intake: i32) -> Result<i32, Invalid> {
    if intake < 1 {
        return Err(Invalid::new("intake must be at least 1"));
    }
    Ok(intake)
}

fn eq_or_null(column: ProgramColumn, value: &Option<String>) -> SimpleExpr {
    match value {
        Some(v) => column.eq(v.as_str()),
        None => column.is_null(),
    }
}

#[derive(Clone)]
pub struct ProgramsService {
    db: DatabaseConnection,
}

impl ProgramsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// True when another program of the institute has the same offering tuple.
    async fn offering_exists(
        &self,
        institute_id: InstituteId,
        level: ProgramLevel,
        degree: &str,
        branch: &Option<String>,
        specialization: &Option<String>,
        except: Option<ProgramId>,
    ) -> Result<bool, ProgramsServiceError> {
        let mut query = Program::find()
            .filter(ProgramColumn::InstituteId.eq(institute_id))
            .filter(ProgramColumn::Level.eq(level))
            .filter(ProgramColumn::Degree.eq(degree))
            .filter(eq_or_null(ProgramColumn::Branch, branch))
            .filter(eq_or_null(ProgramColumn::Specialization, specialization));
        if let Some(id) = except {
            query = query.filter(ProgramColumn::Id.ne(id));
        }
        Ok(query.one(&self.db).await?.is_some())
    }

    pub async fn create_program(
        &self,
        institute_id: InstituteId,
        new: NewProgram,
    ) -> Result<ProgramModel, ProgramsServiceError> {
        let degree = validate::required("degree", &new.degree)?;
        let branch = validate::optional(new.branch);
        let specialization = validate::optional(new.specialization);
        let intake = check_intake(new.intake)?;

        if Institute::find_by_id(institute_id).one(&self.db).await?.is_none() {
            return Err(ProgramsServiceError::InstituteNotFound);
        }
        if self
            .offering_exists(institute_id, new.level, &degree, &branch, &specialization, None)
            .await?
        {
            return Err(ProgramsServiceError::DuplicateProgram);
        }

        let now = Utc::now();
        let program = ProgramActiveModel {
            id: Set(ProgramId::new()),
            institute_id: Set(institute_id),
            level: Set(new.level),
            degree: Set(degree),
            branch: Set(branch),
            specialization: Set(specialization),
            intake: Set(intake),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let program = Program::insert(program).exec_with_returning(&self.db).await?;
        info!(program_id = %program.id, %institute_id, "program created");
        Ok(program)
    }

    pub async fn bulk_create_programs(
        &self,
        institute_id: InstituteId,
        rows: Vec<NewProgram>,
    ) -> Result<BulkReport<ProgramModel>, ProgramsServiceError> {
        let mut report = BulkReport::default();
        for (index, row) in rows.into_iter().enumerate() {
            let key = format!("{:?} {}", row.level, row.degree);
            match self.create_program(institute_id, row).await {
                Ok(program) => report.created.push(program),
                Err(ProgramsServiceError::DbError(err)) => return Err(err.into()),
                Err(err) => {
                    warn!(index, %key, "bulk program row rejected: {err}");
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

    pub async fn get_program(&self, program_id: ProgramId) -> Result<ProgramModel, ProgramsServiceError> {
        Program::find_by_id(program_id)
            .one(&self.db)
            .await?
            .ok_or(ProgramsServiceError::ProgramNotFound)
    }

    pub async fn list_programs(&self) -> Result<Vec<ProgramModel>, ProgramsServiceError> {
        Ok(Program::find()
            .order_by_asc(ProgramColumn::Degree)
            .all(&self.db)
            .await?)
    }

    pub async fn list_by_institute(
        &self,
        institute_id: InstituteId,
    ) -> Result<Vec<ProgramModel>, ProgramsServiceError> {
        Ok(Program::find()
            .filter(ProgramColumn::InstituteId.eq(institute_id))
            .order_by_asc(ProgramColumn::Degree)
            .all(&self.db)
            .await?)
    }

    pub async fn list_by_level(
        &self,
        level: ProgramLevel,
    ) -> Result<Vec<ProgramModel>, ProgramsServiceError> {
        Ok(Program::find()
            .filter(ProgramColumn::Level.eq(level))
            .order_by_asc(ProgramColumn::Degree)
            .all(&self.db)
            .await?)
    }

    pub async fn list_by_degree(&self, degree: &str) -> Result<Vec<ProgramModel>, ProgramsServiceError> {
        Ok(Program::find()
            .filter(ProgramColumn::Degree.eq(degree.trim()))
            .order_by_asc(ProgramColumn::Branch)
            .all(&self.db)
            .await?)
    }

    async fn owned_program(
        &self,
        program_id: ProgramId,
        scope: InstituteId,
    ) -> Result<ProgramModel, ProgramsServiceError> {
        let program = self.get_program(program_id).await?;
        if program.institute_id != scope {
            return Err(ProgramsServiceError::Forbidden);
        }
        Ok(program)
    }

    pub async fn update_program(
        &self,
        program_id: ProgramId,
        scope: InstituteId,
        update: ProgramUpdate,
    ) -> Result<ProgramModel, ProgramsServiceError> {
        let program = self.owned_program(program_id, scope).await?;

        let level = update.level.unwrap_or(program.level);
        let degree = match update.degree {
            Some(d) => validate::required("degree", &d)?,
            None => program.degree.clone(),
        };
        let branch = match update.branch {
            Some(b) => validate::optional(Some(b)),
            None => program.branch.clone(),
        };
        let specialization = match update.specialization {
            Some(s) => validate::optional(Some(s)),
            None => program.specialization.clone(),
        };
        if self
            .offering_exists(scope, level, &degree, &branch, &specialization, Some(program.id))
            .await?
        {
            return Err(ProgramsServiceError::DuplicateProgram);
        }

        let mut active: ProgramActiveModel = program.into();
        active.level = Set(level);
        active.degree = Set(degree);
        active.branch = Set(branch);
        active.specialization = Set(specialization);
        if let Some(intake) = update.intake {
            active.intake = Set(check_intake(intake)?);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    pub async fn update_intake(
        &self,
        program_id: ProgramId,
        scope: InstituteId,
        intake: i32,
    ) -> Result<ProgramModel, ProgramsServiceError> {
        let intake = check_intake(intake)?;
        let program = self.owned_program(program_id, scope).await?;

        let mut active: ProgramActiveModel = program.into();
        active.intake = Set(intake);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete_program(
        &self,
        program_id: ProgramId,
        scope: InstituteId,
    ) -> Result<(), ProgramsServiceError> {
        let program = self.owned_program(program_id, scope).await?;
        Program::delete_by_id(program.id).exec(&self.db).await?;
        info!(%program_id, "program deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    async fn setup() -> (ProgramsService, InstituteModel) {
        let db = test_utils::setup_db().await;
        let institute = test_utils::create_test_institute(&db).await;
        (ProgramsService::new(db), institute)
    }

    fn btech(branch: Option<&str>) -> NewProgram {
        NewProgram {
            level: ProgramLevel::UG,
            degree: "B.Tech".to_string(),
            branch: branch.map(str::to_string),
            specialization: None,
            intake: 60,
        }
    }

    #[tokio::test]
    async fn test_create_program() {
        let (service, institute) = setup().await;
        let program = service
            .create_program(institute.id, btech(Some("CSE")))
            .await
            .unwrap();
        assert_eq!(program.level, ProgramLevel::UG);
        assert_eq!(program.intake, 60);
    }

    #[tokio::test]
    async fn test_offering_tuple_is_unique() {
        let (service, institute) = setup().await;
        service
            .create_program(institute.id, btech(Some("CSE")))
            .await
            .unwrap();

        let dup = service.create_program(institute.id, btech(Some("CSE"))).await;
        assert!(matches!(dup, Err(ProgramsServiceError::DuplicateProgram)));

        // Missing branch is its own offering, and still unique.
        service.create_program(institute.id, btech(None)).await.unwrap();
        let dup_null = service.create_program(institute.id, btech(None)).await;
        assert!(matches!(dup_null, Err(ProgramsServiceError::DuplicateProgram)));

        service
            .create_program(institute.id, btech(Some("ECE")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_intake_must_be_positive() {
        let (service, institute) = setup().await;
        let mut zero = btech(Some("CSE"));
        zero.intake = 0;
        assert!(matches!(
            service.create_program(institute.id, zero).await,
            Err(ProgramsServiceError::Invalid(_))
        ));

        let program = service
            .create_program(institute.id, btech(Some("CSE")))
            .await
            .unwrap();
        assert!(service.update_intake(program.id, institute.id, 0).await.is_err());
        let updated = service.update_intake(program.id, institute.id, 120).await.unwrap();
        assert_eq!(updated.intake, 120);
    }

    #[tokio::test]
    async fn test_bulk_create_programs() {
        let (service, institute) = setup().await;
        let report = service
            .bulk_create_programs(
                institute.id,
                vec![btech(Some("CSE")), btech(Some("CSE")), btech(Some("ME"))],
            )
            .await
            .unwrap();
        assert_eq!(report.created.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].index, 1);
    }

    #[tokio::test]
    async fn test_lookups() {
        let (service, institute) = setup().await;
        service
            .create_program(institute.id, btech(Some("CSE")))
            .await
            .unwrap();
        service
            .create_program(
                institute.id,
                NewProgram {
                    level: ProgramLevel::PG,
                    degree: "M.Tech".to_string(),
                    branch: Some("VLSI".to_string()),
                    specialization: None,
                    intake: 18,
                },
            )
            .await
            .unwrap();

        assert_eq!(service.list_by_institute(institute.id).await.unwrap().len(), 2);
        assert_eq!(service.list_by_level(ProgramLevel::PG).await.unwrap().len(), 1);
        assert_eq!(service.list_by_degree("B.Tech").await.unwrap().len(), 1);
        assert_eq!(service.list_programs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_and_delete_are_scoped() {
        let (service, institute) = setup().await;
        let program = service
            .create_program(institute.id, btech(Some("CSE")))
            .await
            .unwrap();

        let denied = service.delete_program(program.id, InstituteId::new()).await;
        assert!(matches!(denied, Err(ProgramsServiceError::Forbidden)));

        let updated = service
            .update_program(
                program.id,
                institute.id,
                ProgramUpdate {
                    specialization: Some("AI".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.specialization.as_deref(), Some("AI"));

        service.delete_program(program.id, institute.id).await.unwrap();
        assert!(matches!(
            service.get_program(program.id).await,
            Err(ProgramsServiceError::ProgramNotFound)
        ));
    }
}
