use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::{
    auth::Identity,
    entity::prelude::*,
    ids::{ActivityTypeAssignmentId, ActivityTypeId, InstituteId},
    service::validate::{self, Invalid},
};

#[derive(Debug, Error)]
pub enum ActivityTypesServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("activity type not found")]
    ActivityTypeNotFound,

    #[error("activity type with this name already exists")]
    DuplicateName,

    #[error("primitive activity types cannot be modified")]
    PrimitiveLocked,

    #[error("not allowed to manage this activity type")]
    Forbidden,

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewActivityType {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_primitive: bool,
    #[serde(default)]
    pub form_schema: FormSchema,
    #[serde(default)]
    pub min_credit: i32,
    #[serde(default)]
    pub max_credit: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityTypeUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub form_schema: Option<FormSchema>,
    pub min_credit: Option<i32>,
    pub max_credit: Option<i32>,
}

pub fn check_credits(min: i32, max: i32) -> Result<(), Invalid> {
    if min < 0 || max < 0 {
        return Err(Invalid::new("credits cannot be negative"));
    }
    if min > max {
        return Err(Invalid::new(
            "minimum credit cannot be greater than maximum credit",
        ));
    }
    Ok(())
}

/// Keys must be present and unique; choice fields need options.
pub fn check_schema(schema: &FormSchema) -> Result<(), Invalid> {
    let mut seen = HashSet::new();
    for field in schema.fields() {
        if field.key.trim().is_empty() {
            return Err(Invalid::new("form field key is required"));
        }
        if field.label.trim().is_empty() {
            return Err(Invalid(format!("form field {} needs a label", field.key)));
        }
        if !seen.insert(field.key.as_str()) {
            return Err(Invalid(format!("duplicate form field key: {}", field.key)));
        }
        if field.kind.needs_options() && field.options.is_empty() {
            return Err(Invalid(format!("form field {} needs options", field.key)));
        }
    }
    Ok(())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn is_date(s: &str) -> bool {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(s).is_ok()
}

/// Checks the answers of a custom activity against its type's form.
pub fn check_fields(schema: &FormSchema, fields: &Map<String, Value>) -> Result<(), Invalid> {
    for key in fields.keys() {
        if !schema.fields().iter().any(|f| &f.key == key) {
            return Err(Invalid(format!("unknown field: {key}")));
        }
    }

    for field in schema.fields() {
        let value = match fields.get(&field.key) {
            Some(v) if !is_blank(v) => v,
            _ if field.required => {
                return Err(Invalid(format!("{} is required", field.label)));
            }
            _ => continue,
        };

        let ok = match field.kind {
            FieldKind::Text => value.is_string(),
            FieldKind::Number => {
                value.is_number()
                    || value.as_str().is_some_and(|s| s.trim().parse::<f64>().is_ok())
            }
            FieldKind::Date => value.as_str().is_some_and(is_date),
            FieldKind::Select => value
                .as_str()
                .is_some_and(|s| field.options.iter().any(|o| o == s)),
            FieldKind::Checkbox => value.as_array().is_some_and(|items| {
                items.iter().all(|item| {
                    item.as_str()
                        .is_some_and(|s| field.options.iter().any(|o| o == s))
                })
            }),
        };
        if !ok {
            return Err(Invalid(format!("{} has an invalid value", field.label)));
        }
    }
    Ok(())
}

async fn upsert_type_status<C: ConnectionTrait>(
    conn: &C,
    activity_type_id: ActivityTypeId,
    institute_id: Option<InstituteId>,
    status: ReviewStatus,
) -> Result<ActivityTypeAssignmentModel, DbErr> {
    let institute_filter = match institute_id {
        Some(id) => ActivityTypeAssignmentColumn::InstituteId.eq(id),
        None => ActivityTypeAssignmentColumn::InstituteId.is_null(),
    };
    let existing = ActivityTypeAssignment::find()
        .filter(ActivityTypeAssignmentColumn::ActivityTypeId.eq(activity_type_id))
        .filter(institute_filter)
        .one(conn)
        .await?;

    let now = Utc::now();
    match existing {
        Some(row) => {
            let mut active: ActivityTypeAssignmentActiveModel = row.into();
            active.status = Set(status);
            active.updated_at = Set(now);
            active.update(conn).await
        }
        None => {
            let row = ActivityTypeAssignmentActiveModel {
                id: Set(ActivityTypeAssignmentId::new()),
                activity_type_id: Set(activity_type_id),
                institute_id: Set(institute_id),
                status: Set(status),
                created_at: Set(now),
                updated_at: Set(now),
            };
            ActivityTypeAssignment::insert(row).exec_with_returning(conn).await
        }
    }
}

#[derive(Clone)]
pub struct ActivityTypesService {
    db: DatabaseConnection,
}

impl ActivityTypesService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn name_taken(
        &self,
        name: &str,
        institute_id: Option<InstituteId>,
        except: Option<ActivityTypeId>,
    ) -> Result<bool, DbErr> {
        let scope = match institute_id {
            Some(id) => ActivityTypeColumn::InstituteId.eq(id),
            None => ActivityTypeColumn::InstituteId.is_null(),
        };
        let mut query = ActivityType::find()
            .filter(ActivityTypeColumn::Name.eq(name))
            .filter(scope);
        if let Some(id) = except {
            query = query.filter(ActivityTypeColumn::Id.ne(id));
        }
        Ok(query.one(&self.db).await?.is_some())
    }

    /// Admin-created types start approved, everyone else's go to review.
    pub async fn create_activity_type(
        &self,
        actor: &Identity,
        new: NewActivityType,
    ) -> Result<ActivityTypeModel, ActivityTypesServiceError> {
        let is_admin = actor.role == Role::Admin;
        if matches!(actor.role, Role::Member) || (new.is_primitive && !is_admin) {
            return Err(ActivityTypesServiceError::Forbidden);
        }

        let name = validate::required("name", &new.name)?;
        check_credits(new.min_credit, new.max_credit)?;
        check_schema(&new.form_schema)?;

        let institute_id = if new.is_primitive {
            None
        } else {
            Some(actor.institute_id.ok_or(ActivityTypesServiceError::Forbidden)?)
        };
        if self.name_taken(&name, institute_id, None).await? {
            return Err(ActivityTypesServiceError::DuplicateName);
        }

        let status = if is_admin {
            ReviewStatus::Approved
        } else {
            ReviewStatus::UnderReview
        };

        let txn = self.db.begin().await?;
        let now = Utc::now();
        let activity_type = ActivityTypeActiveModel {
            id: Set(ActivityTypeId::new()),
            name: Set(name),
            is_primitive: Set(new.is_primitive),
            institute_id: Set(institute_id),
            description: Set(validate::optional(new.description)),
            status: Set(status),
            form_schema: Set(new.form_schema),
            min_credit: Set(new.min_credit),
            max_credit: Set(new.max_credit),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let activity_type = ActivityType::insert(activity_type)
            .exec_with_returning(&txn)
            .await?;
        upsert_type_status(&txn, activity_type.id, institute_id, status).await?;
        txn.commit().await?;

        info!(activity_type_id = %activity_type.id, ?status, "activity type created");
        Ok(activity_type)
    }

    /// Primitive types plus the actor's institute types. Non-admins only see approved ones.
    pub async fn list_activity_types(
        &self,
        actor: &Identity,
    ) -> Result<Vec<ActivityTypeModel>, ActivityTypesServiceError> {
        let mut visible = Condition::any().add(ActivityTypeColumn::IsPrimitive.eq(true));
        if let Some(institute_id) = actor.institute_id {
            visible = visible.add(ActivityTypeColumn::InstituteId.eq(institute_id));
        }

        let mut query = ActivityType::find().filter(visible);
        if actor.role != Role::Admin {
            query = query.filter(ActivityTypeColumn::Status.eq(ReviewStatus::Approved));
        }

        Ok(query
            .order_by_asc(ActivityTypeColumn::Name)
            .all(&self.db)
            .await?)
    }

    pub async fn get_activity_type(
        &self,
        actor: &Identity,
        activity_type_id: ActivityTypeId,
    ) -> Result<ActivityTypeModel, ActivityTypesServiceError> {
        let activity_type = ActivityType::find_by_id(activity_type_id)
            .one(&self.db)
            .await?
            .ok_or(ActivityTypesServiceError::ActivityTypeNotFound)?;

        if !activity_type.is_primitive && activity_type.institute_id != actor.institute_id {
            return Err(ActivityTypesServiceError::ActivityTypeNotFound);
        }
        if actor.role != Role::Admin && activity_type.status != ReviewStatus::Approved {
            return Err(ActivityTypesServiceError::Forbidden);
        }
        Ok(activity_type)
    }

    async fn owned_type(
        &self,
        actor: &Identity,
        activity_type_id: ActivityTypeId,
    ) -> Result<ActivityTypeModel, ActivityTypesServiceError> {
        let activity_type = ActivityType::find_by_id(activity_type_id)
            .one(&self.db)
            .await?
            .ok_or(ActivityTypesServiceError::ActivityTypeNotFound)?;
        if activity_type.is_primitive {
            return Err(ActivityTypesServiceError::PrimitiveLocked);
        }
        if activity_type.institute_id != actor.institute_id {
            return Err(ActivityTypesServiceError::Forbidden);
        }
        Ok(activity_type)
    }

    pub async fn update_activity_type(
        &self,
        actor: &Identity,
        activity_type_id: ActivityTypeId,
        update: ActivityTypeUpdate,
    ) -> Result<ActivityTypeModel, ActivityTypesServiceError> {
        if actor.role != Role::Admin {
            return Err(ActivityTypesServiceError::Forbidden);
        }
        let activity_type = self.owned_type(actor, activity_type_id).await?;

        let min = update.min_credit.unwrap_or(activity_type.min_credit);
        let max = update.max_credit.unwrap_or(activity_type.max_credit);
        check_credits(min, max)?;
        if let Some(schema) = &update.form_schema {
            check_schema(schema)?;
        }

        let mut active: ActivityTypeActiveModel = activity_type.clone().into();
        if let Some(name) = update.name {
            let name = validate::required("name", &name)?;
            if name != activity_type.name
                && self
                    .name_taken(&name, activity_type.institute_id, Some(activity_type.id))
                    .await?
            {
                return Err(ActivityTypesServiceError::DuplicateName);
            }
            active.name = Set(name);
        }
        if update.description.is_some() {
            active.description = Set(validate::optional(update.description));
        }
        if let Some(schema) = update.form_schema {
            active.form_schema = Set(schema);
        }
        active.min_credit = Set(min);
        active.max_credit = Set(max);
        active.updated_at = Set(Utc::now());

        Ok(active.update(&self.db).await?)
    }

    pub async fn delete_activity_type(
        &self,
        actor: &Identity,
        activity_type_id: ActivityTypeId,
    ) -> Result<(), ActivityTypesServiceError> {
        if actor.role != Role::Admin {
            return Err(ActivityTypesServiceError::Forbidden);
        }
        let activity_type = self.owned_type(actor, activity_type_id).await?;
        ActivityType::delete_by_id(activity_type.id)
            .exec(&self.db)
            .await?;
        info!(%activity_type_id, "activity type deleted");
        Ok(())
    }

    pub async fn approve_activity_type(
        &self,
        actor: &Identity,
        activity_type_id: ActivityTypeId,
    ) -> Result<ActivityTypeModel, ActivityTypesServiceError> {
        self.review(actor, activity_type_id, ReviewStatus::Approved)
            .await
    }

    pub async fn reject_activity_type(
        &self,
        actor: &Identity,
        activity_type_id: ActivityTypeId,
    ) -> Result<ActivityTypeModel, ActivityTypesServiceError> {
        self.review(actor, activity_type_id, ReviewStatus::Rejected)
            .await
    }

    /// Institute types change their own status. Primitive types only record
    /// the decision for the reviewing admin's institute.
    async fn review(
        &self,
        actor: &Identity,
        activity_type_id: ActivityTypeId,
        status: ReviewStatus,
    ) -> Result<ActivityTypeModel, ActivityTypesServiceError> {
        if actor.role != Role::Admin {
            return Err(ActivityTypesServiceError::Forbidden);
        }
        let activity_type = ActivityType::find_by_id(activity_type_id)
            .one(&self.db)
            .await?
            .ok_or(ActivityTypesServiceError::ActivityTypeNotFound)?;
        if !activity_type.is_primitive && activity_type.institute_id != actor.institute_id {
            return Err(ActivityTypesServiceError::Forbidden);
        }

        let txn = self.db.begin().await?;
        upsert_type_status(&txn, activity_type.id, actor.institute_id, status).await?;
        let activity_type = if activity_type.is_primitive {
            activity_type
        } else {
            let mut active: ActivityTypeActiveModel = activity_type.into();
            active.status = Set(status);
            active.updated_at = Set(Utc::now());
            active.update(&txn).await?
        };
        txn.commit().await?;

        info!(%activity_type_id, ?status, "activity type reviewed");
        Ok(activity_type)
    }

    /// Per-institute review rows, used to tell which primitive types an institute has accepted.
    pub async fn list_type_statuses(
        &self,
        institute_id: InstituteId,
    ) -> Result<Vec<ActivityTypeAssignmentModel>, ActivityTypesServiceError> {
        Ok(ActivityTypeAssignment::find()
            .filter(ActivityTypeAssignmentColumn::InstituteId.eq(institute_id))
            .all(&self.db)
            .await?)
    }
}
