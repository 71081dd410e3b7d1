use crate::ids::{AcademicRecordId, StudentId};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Enrollment details kept alongside a student profile.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "academic_record")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: AcademicRecordId,
    #[sea_orm(unique)]
    pub student_id: StudentId,
    pub branch: Option<String>,
    pub year: i32,
    pub section: String,
    pub university_id: Option<String>,
    pub course: String,
    pub semester: String,
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
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
