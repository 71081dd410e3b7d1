use super::activity_type::ReviewStatus;
use crate::ids::{ActivityTypeAssignmentId, ActivityTypeId, InstituteId};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_type_assignment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: ActivityTypeAssignmentId,
    pub activity_type_id: ActivityTypeId,
    pub institute_id: Option<InstituteId>,
    pub status: ReviewStatus,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::activity_type::Entity",
        from = "Column::ActivityTypeId",
        to = "super::activity_type::Column::Id"
    )]
    ActivityType,
}

impl Related<super::activity_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityType.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
