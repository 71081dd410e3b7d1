use crate::ids::{ActivityId, ActivityTypeId, InstituteId, StudentId};
use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    #[sea_orm(string_value = "custom")]
    Custom,
    #[sea_orm(string_value = "workshop")]
    Workshop,
    #[sea_orm(string_value = "hackathon")]
    Hackathon,
    #[sea_orm(string_value = "default")]
    Default,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "submitted")]
    Submitted,
    /// Waiting on the assigned faculty.
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Per-kind payload. The tag must agree with the row's `kind` column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityDetails {
    Custom {
        #[serde(default)]
        fields: serde_json::Map<String, serde_json::Value>,
    },
    Workshop {
        workshop_name: String,
        #[serde(default)]
        speaker: Option<String>,
        #[serde(default)]
        organizer: Option<String>,
        #[serde(default)]
        duration: Option<String>,
        #[serde(default)]
        location: Option<String>,
    },
    Hackathon {
        #[serde(default)]
        team_size: Option<u32>,
        #[serde(default)]
        rank: Option<String>,
        #[serde(default)]
        level: Option<String>,
        #[serde(default)]
        participant_type: Option<String>,
        #[serde(default)]
        deadline: Option<DateTimeUtc>,
        #[serde(default)]
        organizer: Option<String>,
    },
    Default,
}

impl ActivityDetails {
    pub fn kind(&self) -> ActivityKind {
        match self {
            ActivityDetails::Custom { .. } => ActivityKind::Custom,
            ActivityDetails::Workshop { .. } => ActivityKind::Workshop,
            ActivityDetails::Hackathon { .. } => ActivityKind::Hackathon,
            ActivityDetails::Default => ActivityKind::Default,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: ActivityId,
    pub student_id: StudentId,
    pub institute_id: InstituteId,
    pub activity_type_id: Option<ActivityTypeId>,
    pub kind: ActivityKind,
    pub title: String,
    pub description: Option<String>,
    pub status: ActivityStatus,
    #[sea_orm(column_type = "Json")]
    pub details: ActivityDetails,
    pub remarks: Option<String>,
    pub date_start: Option<DateTimeUtc>,
    pub date_end: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::student::Entity",
        from = "Column::StudentId",
        to = "super::student::Column::Id"
    )]
    Student,
    #[sea_orm(has_one = "super::assignment::Entity")]
    Assignment,
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::assignment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assignment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
