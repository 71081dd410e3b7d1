use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    auth::Identity,
    entity::prelude::*,
    ids::{ActivityId, ActivityTypeId, StudentId},
    service::{
        activity_types::check_fields,
        validate::{self, Invalid},
    },
};

#[derive(Debug, Error)]
pub enum ActivitiesServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("activity not found")]
    ActivityNotFound,

    #[error("activity type not found")]
    ActivityTypeNotFound,

    #[error("activity type is not approved")]
    ActivityTypeNotApproved,

    #[error("approved activities cannot be changed")]
    Locked,

    #[error("not allowed to access this activity")]
    Forbidden,

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewActivity {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub activity_type_id: Option<ActivityTypeId>,
    pub details: ActivityDetails,
    #[serde(default)]
    pub date_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_end: Option<DateTime<Utc>>,
    /// Submit straight away instead of keeping a draft.
    #[serde(default)]
    pub submit: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub details: Option<ActivityDetails>,
    pub date_start: Option<DateTime<Utc>>,
    pub date_end: Option<DateTime<Utc>>,
    pub submit: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityFilter {
    pub student_id: Option<StudentId>,
    pub activity_type_id: Option<ActivityTypeId>,
    pub kind: Option<ActivityKind>,
    pub status: Option<ActivityStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityReview {
    pub status: ActivityStatus,
    #[serde(default)]
    pub remarks: Option<String>,
}

fn check_details(details: &ActivityDetails) -> Result<(), Invalid> {
    match details {
        ActivityDetails::Workshop { workshop_name, .. } => {
            validate::required("workshop_name", workshop_name)?;
        }
        ActivityDetails::Hackathon {
            team_size: Some(0), ..
        } => return Err(Invalid::new("team_size must be at least 1")),
        _ => {}
    }
    Ok(())
}

fn check_dates(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Result<(), Invalid> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => {
            Err(Invalid::new("date_start must not be after date_end"))
        }
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct ActivitiesService {
    db: DatabaseConnection,
}

impl ActivitiesService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Loads a type the student may file against and checks custom answers against its form.
    async fn check_type(
        &self,
        actor: &Identity,
        activity_type_id: Option<ActivityTypeId>,
        details: &ActivityDetails,
    ) -> Result<(), ActivitiesServiceError> {
        let activity_type = match activity_type_id {
            Some(id) => ActivityType::find_by_id(id).one(&self.db).await?,
            None if details.kind() == ActivityKind::Custom => {
                return Err(Invalid::new("custom activities need an activity_type_id").into());
            }
            None => return Ok(()),
        };

        let activity_type = activity_type
            .filter(|t| t.is_primitive || t.institute_id == actor.institute_id)
            .ok_or(ActivitiesServiceError::ActivityTypeNotFound)?;
        if activity_type.status != ReviewStatus::Approved {
            return Err(ActivitiesServiceError::ActivityTypeNotApproved);
        }

        if let ActivityDetails::Custom { fields } = details {
            check_fields(&activity_type.form_schema, fields)?;
        }
        Ok(())
    }

    pub async fn create_activity(
        &self,
        actor: &Identity,
        new: NewActivity,
    ) -> Result<ActivityModel, ActivitiesServiceError> {
        let (Some(student_id), Some(institute_id)) = (actor.student_id, actor.institute_id) else {
            return Err(ActivitiesServiceError::Forbidden);
        };

        let title = validate::required("title", &new.title)?;
        check_details(&new.details)?;
        check_dates(new.date_start, new.date_end)?;
        self.check_type(actor, new.activity_type_id, &new.details)
            .await?;

        let status = if new.submit {
            ActivityStatus::Submitted
        } else {
            ActivityStatus::Draft
        };
        let now = Utc::now();
        let activity = ActivityActiveModel {
            id: Set(ActivityId::new()),
            student_id: Set(student_id),
            institute_id: Set(institute_id),
            activity_type_id: Set(new.activity_type_id),
            kind: Set(new.details.kind()),
            title: Set(title),
            description: Set(validate::optional(new.description)),
            status: Set(status),
            details: Set(new.details),
            remarks: Set(None),
            date_start: Set(new.date_start),
            date_end: Set(new.date_end),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let activity = Activity::insert(activity)
            .exec_with_returning(&self.db)
            .await?;

        info!(activity_id = %activity.id, %student_id, kind = ?activity.kind, "activity created");
        Ok(activity)
    }

    /// Students see their own activities, staff see their institute's.
    pub async fn list_activities(
        &self,
        actor: &Identity,
        filter: ActivityFilter,
    ) -> Result<Vec<ActivityModel>, ActivitiesServiceError> {
        let mut query = Activity::find();
        match (actor.role, actor.student_id, actor.institute_id) {
            (Role::Student, Some(student_id), _) => {
                query = query.filter(ActivityColumn::StudentId.eq(student_id));
            }
            (Role::Admin | Role::Faculty, _, Some(institute_id)) => {
                query = query.filter(ActivityColumn::InstituteId.eq(institute_id));
                if let Some(student_id) = filter.student_id {
                    query = query.filter(ActivityColumn::StudentId.eq(student_id));
                }
            }
            _ => return Err(ActivitiesServiceError::Forbidden),
        }

        if let Some(activity_type_id) = filter.activity_type_id {
            query = query.filter(ActivityColumn::ActivityTypeId.eq(activity_type_id));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(ActivityColumn::Kind.eq(kind));
        }
        if let Some(status) = filter.status {
            query = query.filter(ActivityColumn::Status.eq(status));
        }

        Ok(query
            .order_by_desc(ActivityColumn::CreatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn get_activity(
        &self,
        actor: &Identity,
        activity_id: ActivityId,
    ) -> Result<ActivityModel, ActivitiesServiceError> {
        let activity = Activity::find_by_id(activity_id)
            .one(&self.db)
            .await?
            .ok_or(ActivitiesServiceError::ActivityNotFound)?;

        let allowed = match actor.role {
            Role::Student => actor.student_id == Some(activity.student_id),
            Role::Admin | Role::Faculty => actor.institute_id == Some(activity.institute_id),
            Role::Member => false,
        };
        if !allowed {
            return Err(ActivitiesServiceError::Forbidden);
        }
        Ok(activity)
    }

    /// Owner-only edit. Anything already approved or waiting on a reviewer is frozen.
    pub async fn update_activity(
        &self,
        actor: &Identity,
        activity_id: ActivityId,
        update: ActivityUpdate,
    ) -> Result<ActivityModel, ActivitiesServiceError> {
        let activity = self.get_activity(actor, activity_id).await?;
        if actor.student_id != Some(activity.student_id) {
            return Err(ActivitiesServiceError::Forbidden);
        }
        if matches!(
            activity.status,
            ActivityStatus::Approved | ActivityStatus::Pending
        ) {
            return Err(ActivitiesServiceError::Locked);
        }

        let date_start = update.date_start.or(activity.date_start);
        let date_end = update.date_end.or(activity.date_end);
        check_dates(date_start, date_end)?;

        let mut active: ActivityActiveModel = activity.clone().into();
        if let Some(details) = update.details {
            check_details(&details)?;
            self.check_type(actor, activity.activity_type_id, &details)
                .await?;
            active.kind = Set(details.kind());
            active.details = Set(details);
        }
        if let Some(title) = update.title {
            active.title = Set(validate::required("title", &title)?);
        }
        if update.description.is_some() {
            active.description = Set(validate::optional(update.description));
        }
        match update.submit {
            Some(true) => active.status = Set(ActivityStatus::Submitted),
            Some(false) => active.status = Set(ActivityStatus::Draft),
            None => {}
        }
        active.date_start = Set(date_start);
        active.date_end = Set(date_end);
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    pub async fn delete_activity(
        &self,
        actor: &Identity,
        activity_id: ActivityId,
    ) -> Result<(), ActivitiesServiceError> {
        let activity = self.get_activity(actor, activity_id).await?;
        let owner = actor.student_id == Some(activity.student_id);
        if !owner && actor.role != Role::Admin {
            return Err(ActivitiesServiceError::Forbidden);
        }

        Activity::delete_by_id(activity.id).exec(&self.db).await?;
        info!(%activity_id, "activity deleted");
        Ok(())
    }

    /// Only the faculty the activity is assigned to may approve or reject it.
    pub async fn review_activity(
        &self,
        actor: &Identity,
        activity_id: ActivityId,
        review: ActivityReview,
    ) -> Result<ActivityModel, ActivitiesServiceError> {
        if !matches!(
            review.status,
            ActivityStatus::Approved | ActivityStatus::Rejected
        ) {
            return Err(Invalid::new("review status must be approved or rejected").into());
        }
        let Some(faculty_id) = actor.faculty_id else {
            return Err(ActivitiesServiceError::Forbidden);
        };

        let (activity, assignment) = Activity::find_by_id(activity_id)
            .find_also_related(Assignment)
            .one(&self.db)
            .await?
            .ok_or(ActivitiesServiceError::ActivityNotFound)?;
        if assignment.map(|a| a.faculty_id) != Some(faculty_id) {
            return Err(ActivitiesServiceError::Forbidden);
        }
        if activity.status == ActivityStatus::Approved {
            return Err(ActivitiesServiceError::Locked);
        }

        let mut active: ActivityActiveModel = activity.into();
        active.status = Set(review.status);
        active.remarks = Set(validate::optional(review.remarks));
        active.updated_at = Set(Utc::now());
        let activity = active.update(&self.db).await?;

        info!(%activity_id, %faculty_id, status = ?activity.status, "activity reviewed");
        Ok(activity)
    }
}
