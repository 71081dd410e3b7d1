use crate::ids::{ActivityTypeId, InstituteId};
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

/// Review state of an activity type, both for the type itself and for its
/// per-institute assignment rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Number,
    Date,
    Select,
    Checkbox,
}

impl FieldKind {
    pub fn needs_options(self) -> bool {
        matches!(self, FieldKind::Select | FieldKind::Checkbox)
    }
}

/// One dynamic input a student fills in for a custom activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(transparent)]
pub struct FormSchema(pub Vec<FormField>);

impl FormSchema {
    pub fn fields(&self) -> &[FormField] {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_type")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: ActivityTypeId,
    pub name: String,
    pub is_primitive: bool,
    pub institute_id: Option<InstituteId>,
    pub description: Option<String>,
    pub status: ReviewStatus,
    #[sea_orm(column_type = "Json")]
    pub form_schema: FormSchema,
    pub min_credit: i32,
    pub max_credit: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::institute::Entity",
        from = "Column::InstituteId",
        to = "super::institute::Column::Id"
    )]
    Institute,
    #[sea_orm(has_many = "super::activity_type_assignment::Entity")]
    ActivityTypeAssignment,
}

impl Related<super::institute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Institute.def()
    }
}

impl Related<super::activity_type_assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityTypeAssignment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
