use crate::ids::{AttachmentId, UserId};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Metadata for a file already stored by the media host.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachment")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: AttachmentId,
    pub uploader_id: Option<UserId>,
    pub url: String,
    pub secure_url: Option<String>,
    pub filename: String,
    pub file_size: i64,
    pub mime_type: String,
    pub asset_id: Option<String>,
    pub public_id: Option<String>,
    pub format: Option<String>,
    pub resource_type: Option<String>,
    pub folder: Option<String>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub uploaded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::message_attachment::Entity")]
    MessageAttachment,
}

impl Related<super::message_attachment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MessageAttachment.def()
    }
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        super::message_attachment::Relation::Message.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::message_attachment::Relation::Attachment.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
