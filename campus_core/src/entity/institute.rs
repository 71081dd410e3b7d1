use crate::ids::InstituteId;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "snake_case")]
pub enum InstituteKind {
    #[sea_orm(string_value = "private")]
    Private,
    #[sea_orm(string_value = "government")]
    Government,
    #[sea_orm(string_value = "aided")]
    Aided,
    #[sea_orm(string_value = "autonomous")]
    Autonomous,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "institute")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: InstituteId,
    pub name: String,
    pub kind: InstituteKind,
    #[sea_orm(unique)]
    pub official_email: String,
    pub official_phone: String,
    pub address_line1: String,
    pub address_line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub is_affiliated: bool,
    pub affiliation_university: Option<String>,
    pub affiliation_id: Option<String>,
    pub institute_code: Option<String>,
    pub established_year: Option<i32>,
    pub accreditation_status: Option<String>,
    pub website: Option<String>,
    pub logo: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::admin::Entity")]
    Admin,
    #[sea_orm(has_many = "super::student::Entity")]
    Student,
    #[sea_orm(has_many = "super::faculty::Entity")]
    Faculty,
    #[sea_orm(has_many = "super::program::Entity")]
    Program,
}

impl Related<super::admin::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Admin.def()
    }
}

impl Related<super::student::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Student.def()
    }
}

impl Related<super::faculty::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Faculty.def()
    }
}

impl Related<super::program::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Program.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
