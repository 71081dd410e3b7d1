use crate::ids::{InstituteId, ProgramId};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum ProgramLevel {
    #[sea_orm(string_value = "UG")]
    UG,
    #[sea_orm(string_value = "PG")]
    PG,
    #[sea_orm(string_value = "Diploma")]
    Diploma,
    #[sea_orm(string_value = "PhD")]
    PhD,
    #[sea_orm(string_value = "Certification")]
    Certification,
}

impl std::str::FromStr for ProgramLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UG" => Ok(Self::UG),
            "PG" => Ok(Self::PG),
            "Diploma" => Ok(Self::Diploma),
            "PhD" => Ok(Self::PhD),
            "Certification" => Ok(Self::Certification),
            other => Err(format!("unknown program level: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "program")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: ProgramId,
    pub institute_id: InstituteId,
    pub level: ProgramLevel,
    pub degree: String,
    pub branch: Option<String>,
    pub specialization: Option<String>,
    pub intake: i32,
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
}

impl Related<super::institute::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Institute.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
