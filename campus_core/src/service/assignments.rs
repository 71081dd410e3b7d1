use chrono::Utc;
use sea_orm::{sea_query::Expr, ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    entity::prelude::*,
    ids::{ActivityId, AssignmentId, FacultyId, InstituteId},
};

#[derive(Debug, Error)]
pub enum AssignmentsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("activity not found")]
    ActivityNotFound,

    #[error("faculty not found in this institute")]
    FacultyNotFound,

    #[error("no assignment found for this activity")]
    AssignmentNotFound,

    #[error("activity is already assigned to faculty {0}")]
    AlreadyAssigned(FacultyId),

    #[error("activity belongs to another institute")]
    Forbidden,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub activity_id: ActivityId,
    pub faculty_id: FacultyId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkAssign {
    pub activity_ids: Vec<ActivityId>,
    pub faculty_id: FacultyId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Reassign {
    pub activity_id: ActivityId,
    pub new_faculty_id: FacultyId,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignmentFilter {
    pub faculty_id: Option<FacultyId>,
    pub activity_id: Option<ActivityId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkStatus {
    Success,
    Partial,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assigned {
    pub activity_id: ActivityId,
    pub assignment_id: AssignmentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlreadyAssigned {
    pub activity_id: ActivityId,
    pub current_faculty_id: FacultyId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssignFailure {
    pub activity_id: ActivityId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkAssignReport {
    pub status: BulkStatus,
    pub total: usize,
    pub assigned: usize,
    pub already_assigned_count: usize,
    pub failed: usize,
    pub successes: Vec<Assigned>,
    pub already_assigned: Vec<AlreadyAssigned>,
    pub failures: Vec<AssignFailure>,
}

impl BulkAssignReport {
    fn finish(
        total: usize,
        successes: Vec<Assigned>,
        already_assigned: Vec<AlreadyAssigned>,
        failures: Vec<AssignFailure>,
    ) -> Self {
        let status = if failures.is_empty() && already_assigned.is_empty() {
            BulkStatus::Success
        } else if !successes.is_empty() {
            BulkStatus::Partial
        } else {
            BulkStatus::Failed
        };
        Self {
            status,
            total,
            assigned: successes.len(),
            already_assigned_count: already_assigned.len(),
            failed: failures.len(),
            successes,
            already_assigned,
            failures,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacultyAssignmentCount {
    pub faculty_id: FacultyId,
    pub count: i64,
}

/// An assignment with the activity it points at.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedActivity {
    pub assignment: AssignmentModel,
    pub activity: Option<ActivityModel>,
}

async fn set_activity_status<C: ConnectionTrait>(
    conn: &C,
    activity: ActivityModel,
    status: ActivityStatus,
) -> Result<ActivityModel, DbErr> {
    let mut active: ActivityActiveModel = activity.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(conn).await
}

#[derive(Clone)]
pub struct AssignmentsService {
    db: DatabaseConnection,
}

impl AssignmentsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn scoped_activity<C: ConnectionTrait>(
        conn: &C,
        scope: InstituteId,
        activity_id: ActivityId,
    ) -> Result<ActivityModel, AssignmentsServiceError> {
        let activity = Activity::find_by_id(activity_id)
            .one(conn)
            .await?
            .ok_or(AssignmentsServiceError::ActivityNotFound)?;
        if activity.institute_id != scope {
            return Err(AssignmentsServiceError::Forbidden);
        }
        Ok(activity)
    }

    async fn scoped_faculty<C: ConnectionTrait>(
        conn: &C,
        scope: InstituteId,
        faculty_id: FacultyId,
    ) -> Result<FacultyModel, AssignmentsServiceError> {
        Faculty::find_by_id(faculty_id)
            .one(conn)
            .await?
            .filter(|f| f.institute_id == scope)
            .ok_or(AssignmentsServiceError::FacultyNotFound)
    }

    async fn existing<C: ConnectionTrait>(
        conn: &C,
        activity_id: ActivityId,
    ) -> Result<Option<AssignmentModel>, DbErr> {
        Assignment::find()
            .filter(AssignmentColumn::ActivityId.eq(activity_id))
            .one(conn)
            .await
    }

    /// Hands an activity to one faculty and moves it to pending review.
    pub async fn assign(
        &self,
        scope: InstituteId,
        new: NewAssignment,
    ) -> Result<AssignmentModel, AssignmentsServiceError> {
        let txn = self.db.begin().await?;

        let activity = Self::scoped_activity(&txn, scope, new.activity_id).await?;
        Self::scoped_faculty(&txn, scope, new.faculty_id).await?;
        if let Some(existing) = Self::existing(&txn, new.activity_id).await? {
            return Err(AssignmentsServiceError::AlreadyAssigned(existing.faculty_id));
        }

        let now = Utc::now();
        let assignment = AssignmentActiveModel {
            id: Set(AssignmentId::new()),
            activity_id: Set(new.activity_id),
            faculty_id: Set(new.faculty_id),
            institute_id: Set(scope),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let assignment = Assignment::insert(assignment)
            .exec_with_returning(&txn)
            .await?;
        set_activity_status(&txn, activity, ActivityStatus::Pending).await?;
        txn.commit().await?;

        info!(activity_id = %new.activity_id, faculty_id = %new.faculty_id, "activity assigned");
        Ok(assignment)
    }

    /// Assigns each activity independently. Database failures still abort the batch.
    pub async fn bulk_assign(
        &self,
        scope: InstituteId,
        bulk: BulkAssign,
    ) -> Result<BulkAssignReport, AssignmentsServiceError> {
        let total = bulk.activity_ids.len();
        let mut successes = Vec::new();
        let mut already_assigned = Vec::new();
        let mut failures = Vec::new();

        for activity_id in bulk.activity_ids {
            let result = self
                .assign(
                    scope,
                    NewAssignment {
                        activity_id,
                        faculty_id: bulk.faculty_id,
                    },
                )
                .await;
            match result {
                Ok(assignment) => successes.push(Assigned {
                    activity_id,
                    assignment_id: assignment.id,
                }),
                Err(AssignmentsServiceError::AlreadyAssigned(current_faculty_id)) => {
                    already_assigned.push(AlreadyAssigned {
                        activity_id,
                        current_faculty_id,
                    })
                }
                Err(AssignmentsServiceError::DbError(e)) => return Err(e.into()),
                Err(e) => {
                    warn!(%activity_id, error = %e, "bulk assign row rejected");
                    failures.push(AssignFailure {
                        activity_id,
                        reason: e.to_string(),
                    })
                }
            }
        }

        Ok(BulkAssignReport::finish(
            total,
            successes,
            already_assigned,
            failures,
        ))
    }

    pub async fn reassign(
        &self,
        scope: InstituteId,
        reassign: Reassign,
    ) -> Result<AssignmentModel, AssignmentsServiceError> {
        Self::scoped_faculty(&self.db, scope, reassign.new_faculty_id).await?;
        let assignment = Self::existing(&self.db, reassign.activity_id)
            .await?
            .ok_or(AssignmentsServiceError::AssignmentNotFound)?;
        if assignment.institute_id != scope {
            return Err(AssignmentsServiceError::Forbidden);
        }

        let mut active: AssignmentActiveModel = assignment.into();
        active.faculty_id = Set(reassign.new_faculty_id);
        active.updated_at = Set(Utc::now());
        let assignment = active.update(&self.db).await?;

        info!(activity_id = %reassign.activity_id, faculty_id = %reassign.new_faculty_id, "activity reassigned");
        Ok(assignment)
    }

    pub async fn get_for_activity(
        &self,
        scope: InstituteId,
        activity_id: ActivityId,
    ) -> Result<AssignmentModel, AssignmentsServiceError> {
        let assignment = Self::existing(&self.db, activity_id)
            .await?
            .ok_or(AssignmentsServiceError::AssignmentNotFound)?;
        if assignment.institute_id != scope {
            return Err(AssignmentsServiceError::Forbidden);
        }
        Ok(assignment)
    }

    /// Removes the assignment and puts a still-pending activity back to submitted.
    pub async fn unassign(
        &self,
        scope: InstituteId,
        activity_id: ActivityId,
    ) -> Result<(), AssignmentsServiceError> {
        let txn = self.db.begin().await?;
        let assignment = Self::existing(&txn, activity_id)
            .await?
            .ok_or(AssignmentsServiceError::AssignmentNotFound)?;
        if assignment.institute_id != scope {
            return Err(AssignmentsServiceError::Forbidden);
        }

        Assignment::delete_by_id(assignment.id).exec(&txn).await?;
        if let Some(activity) = Activity::find_by_id(activity_id).one(&txn).await? {
            if activity.status == ActivityStatus::Pending {
                set_activity_status(&txn, activity, ActivityStatus::Submitted).await?;
            }
        }
        txn.commit().await?;

        info!(%activity_id, "activity unassigned");
        Ok(())
    }

    pub async fn list_assignments(
        &self,
        scope: InstituteId,
        filter: AssignmentFilter,
    ) -> Result<Vec<AssignedActivity>, AssignmentsServiceError> {
        let mut query = Assignment::find().filter(AssignmentColumn::InstituteId.eq(scope));
        if let Some(faculty_id) = filter.faculty_id {
            query = query.filter(AssignmentColumn::FacultyId.eq(faculty_id));
        }
        if let Some(activity_id) = filter.activity_id {
            query = query.filter(AssignmentColumn::ActivityId.eq(activity_id));
        }

        let rows = query
            .order_by_desc(AssignmentColumn::CreatedAt)
            .find_also_related(Activity)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(assignment, activity)| AssignedActivity {
                assignment,
                activity,
            })
            .collect())
    }

    pub async fn list_for_faculty(
        &self,
        faculty_id: FacultyId,
        scope: Option<InstituteId>,
    ) -> Result<Vec<AssignedActivity>, AssignmentsServiceError> {
        let mut query = Assignment::find().filter(AssignmentColumn::FacultyId.eq(faculty_id));
        if let Some(institute_id) = scope {
            query = query.filter(AssignmentColumn::InstituteId.eq(institute_id));
        }

        let rows = query
            .order_by_desc(AssignmentColumn::CreatedAt)
            .find_also_related(Activity)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(assignment, activity)| AssignedActivity {
                assignment,
                activity,
            })
            .collect())
    }

    /// Number of assignments per faculty, busiest first.
    pub async fn faculty_counts(
        &self,
        scope: InstituteId,
    ) -> Result<Vec<FacultyAssignmentCount>, AssignmentsServiceError> {
        let counts: Vec<(FacultyId, i64)> = Assignment::find()
            .select_only()
            .column(AssignmentColumn::FacultyId)
            .column_as(Expr::col(AssignmentColumn::Id).count(), "count")
            .filter(AssignmentColumn::InstituteId.eq(scope))
            .group_by(AssignmentColumn::FacultyId)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut counts: Vec<_> = counts
            .into_iter()
            .map(|(faculty_id, count)| FacultyAssignmentCount { faculty_id, count })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ids::StudentId, test_utils};

    struct Fixture {
        db: DatabaseConnection,
        service: AssignmentsService,
        institute_id: InstituteId,
        student_id: StudentId,
    }

    async fn setup() -> Fixture {
        let db = test_utils::setup_db().await;
        let institute = test_utils::create_test_institute(&db).await;
        let student = test_utils::create_test_student(&db, institute.id, "1RV22CS001").await;
        Fixture {
            service: AssignmentsService::new(db.clone()),
            db,
            institute_id: institute.id,
            student_id: student.id,
        }
    }

    async fn create_activity(fx: &Fixture, title: &str) -> ActivityModel {
        let now = Utc::now();
        Activity::insert(ActivityActiveModel {
            id: Set(ActivityId::new()),
            student_id: Set(fx.student_id),
            institute_id: Set(fx.institute_id),
            activity_type_id: Set(None),
            kind: Set(ActivityKind::Default),
            title: Set(title.to_string()),
            description: Set(None),
            status: Set(ActivityStatus::Submitted),
            details: Set(ActivityDetails::Default),
            remarks: Set(None),
            date_start: Set(None),
            date_end: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_with_returning(&fx.db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_assign_sets_pending() {
        let fx = setup().await;
        let activity = create_activity(&fx, "Hackathon").await;
        let faculty = test_utils::create_test_faculty(&fx.db, fx.institute_id, "EMP001").await;

        fx.service
            .assign(
                fx.institute_id,
                NewAssignment {
                    activity_id: activity.id,
                    faculty_id: faculty.id,
                },
            )
            .await
            .unwrap();

        let activity = Activity::find_by_id(activity.id)
            .one(&fx.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(activity.status, ActivityStatus::Pending);
    }

    #[tokio::test]
    async fn test_one_faculty_per_activity() {
        let fx = setup().await;
        let activity = create_activity(&fx, "Hackathon").await;
        let first = test_utils::create_test_faculty(&fx.db, fx.institute_id, "EMP001").await;
        let second = test_utils::create_test_faculty(&fx.db, fx.institute_id, "EMP002").await;

        fx.service
            .assign(
                fx.institute_id,
                NewAssignment {
                    activity_id: activity.id,
                    faculty_id: first.id,
                },
            )
            .await
            .unwrap();

        let again = fx
            .service
            .assign(
                fx.institute_id,
                NewAssignment {
                    activity_id: activity.id,
                    faculty_id: second.id,
                },
            )
            .await;
        assert!(matches!(
            again,
            Err(AssignmentsServiceError::AlreadyAssigned(id)) if id == first.id
        ));

        let moved = fx
            .service
            .reassign(
                fx.institute_id,
                Reassign {
                    activity_id: activity.id,
                    new_faculty_id: second.id,
                },
            )
            .await
            .unwrap();
        assert_eq!(moved.faculty_id, second.id);
    }

    #[tokio::test]
    async fn test_bulk_assign_partial() {
        let fx = setup().await;
        let a = create_activity(&fx, "A").await;
        let b = create_activity(&fx, "B").await;
        let faculty = test_utils::create_test_faculty(&fx.db, fx.institute_id, "EMP001").await;

        fx.service
            .assign(
                fx.institute_id,
                NewAssignment {
                    activity_id: a.id,
                    faculty_id: faculty.id,
                },
            )
            .await
            .unwrap();

        let report = fx
            .service
            .bulk_assign(
                fx.institute_id,
                BulkAssign {
                    activity_ids: vec![a.id, b.id, ActivityId::new()],
                    faculty_id: faculty.id,
                },
            )
            .await
            .unwrap();
        assert_eq!(report.status, BulkStatus::Partial);
        assert_eq!(report.total, 3);
        assert_eq!(report.assigned, 1);
        assert_eq!(report.already_assigned_count, 1);
        assert_eq!(report.failed, 1);

        let counts = fx.service.faculty_counts(fx.institute_id).await.unwrap();
        assert_eq!(
            counts,
            vec![FacultyAssignmentCount {
                faculty_id: faculty.id,
                count: 2
            }]
        );
    }

    #[tokio::test]
    async fn test_unassign_returns_to_submitted() {
        let fx = setup().await;
        let activity = create_activity(&fx, "A").await;
        let faculty = test_utils::create_test_faculty(&fx.db, fx.institute_id, "EMP001").await;
        fx.service
            .assign(
                fx.institute_id,
                NewAssignment {
                    activity_id: activity.id,
                    faculty_id: faculty.id,
                },
            )
            .await
            .unwrap();

        let listed = fx
            .service
            .list_for_faculty(faculty.id, Some(fx.institute_id))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].activity.as_ref().map(|a| a.id), Some(activity.id));

        fx.service
            .unassign(fx.institute_id, activity.id)
            .await
            .unwrap();
        assert!(matches!(
            fx.service.get_for_activity(fx.institute_id, activity.id).await,
            Err(AssignmentsServiceError::AssignmentNotFound)
        ));
        let activity = Activity::find_by_id(activity.id)
            .one(&fx.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(activity.status, ActivityStatus::Submitted);
    }

    #[tokio::test]
    async fn test_other_institute_rejected() {
        let fx = setup().await;
        let activity = create_activity(&fx, "A").await;
        let faculty = test_utils::create_test_faculty(&fx.db, fx.institute_id, "EMP001").await;
        let result = fx
            .service
            .assign(
                InstituteId::new(),
                NewAssignment {
                    activity_id: activity.id,
                    faculty_id: faculty.id,
                },
            )
            .await;
        assert!(matches!(result, Err(AssignmentsServiceError::Forbidden)));
    }
}
