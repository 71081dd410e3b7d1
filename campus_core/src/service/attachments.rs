use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::{ConnectionTrait, DatabaseConnection};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::{
    entity::prelude::*,
    ids::{AttachmentId, MessageId, UserId},
    service::validate::{self, Invalid},
};

#[derive(Debug, Error)]
pub enum AttachmentsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("attachment not found")]
    AttachmentNotFound,

    #[error("only the uploader can change this attachment")]
    Forbidden,

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

/// Metadata for a file the client already pushed to the media host.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAttachment {
    pub url: String,
    #[serde(default)]
    pub secure_url: Option<String>,
    pub filename: String,
    pub file_size: i64,
    pub mime_type: String,
    #[serde(default)]
    pub folder: Option<String>,
}

/// The upload response body the media host returns to the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct HostedUpload {
    #[serde(alias = "assetId")]
    pub asset_id: String,
    #[serde(alias = "publicId")]
    pub public_id: String,
    pub format: String,
    #[serde(alias = "resourceType")]
    pub resource_type: String,
    #[serde(default)]
    pub bytes: i64,
    pub url: String,
    #[serde(alias = "secureUrl")]
    pub secure_url: String,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(alias = "originalFilename")]
    pub original_filename: String,
    #[serde(default)]
    pub width: Option<i32>,
    #[serde(default)]
    pub height: Option<i32>,
}

impl HostedUpload {
    fn mime_type(&self) -> String {
        match self.resource_type.as_str() {
            "image" | "video" | "audio" => format!("{}/{}", self.resource_type, self.format),
            _ if self.format == "pdf" => "application/pdf".to_string(),
            _ => "application/octet-stream".to_string(),
        }
    }

    fn filename(&self) -> String {
        if self.format.is_empty() || self.original_filename.ends_with(&format!(".{}", self.format)) {
            self.original_filename.clone()
        } else {
            format!("{}.{}", self.original_filename, self.format)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentRename {
    pub filename: String,
}

#[derive(Clone)]
pub struct AttachmentsService {
    db: DatabaseConnection,
}

impl AttachmentsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn create_attachment(
        &self,
        uploader: UserId,
        new: NewAttachment,
    ) -> Result<AttachmentModel, AttachmentsServiceError> {
        let url = validate::required("url", &new.url)?;
        let filename = validate::required("filename", &new.filename)?;
        let mime_type = validate::required("mime_type", &new.mime_type)?;
        if new.file_size < 0 {
            return Err(Invalid::new("file_size cannot be negative").into());
        }

        let attachment = AttachmentActiveModel {
            id: Set(AttachmentId::new()),
            uploader_id: Set(Some(uploader)),
            url: Set(url),
            secure_url: Set(validate::optional(new.secure_url)),
            filename: Set(filename),
            file_size: Set(new.file_size),
            mime_type: Set(mime_type),
            asset_id: Set(None),
            public_id: Set(None),
            format: Set(None),
            resource_type: Set(None),
            folder: Set(validate::optional(new.folder)),
            width: Set(None),
            height: Set(None),
            uploaded_at: Set(Utc::now()),
        };
        let attachment = Attachment::insert(attachment)
            .exec_with_returning(&self.db)
            .await?;
        info!(attachment_id = %attachment.id, %uploader, "attachment recorded");
        Ok(attachment)
    }

    pub async fn record_hosted_upload(
        &self,
        uploader: UserId,
        upload: HostedUpload,
    ) -> Result<AttachmentModel, AttachmentsServiceError> {
        validate::required("public_id", &upload.public_id)?;
        validate::required("secure_url", &upload.secure_url)?;
        validate::required("original_filename", &upload.original_filename)?;
        if upload.bytes < 0 {
            return Err(Invalid::new("bytes cannot be negative").into());
        }

        let attachment = AttachmentActiveModel {
            id: Set(AttachmentId::new()),
            uploader_id: Set(Some(uploader)),
            url: Set(upload.url.clone()),
            secure_url: Set(Some(upload.secure_url.clone())),
            filename: Set(upload.filename()),
            file_size: Set(upload.bytes),
            mime_type: Set(upload.mime_type()),
            asset_id: Set(Some(upload.asset_id)),
            public_id: Set(Some(upload.public_id)),
            format: Set(Some(upload.format)),
            resource_type: Set(Some(upload.resource_type)),
            folder: Set(validate::optional(upload.folder)),
            width: Set(upload.width),
            height: Set(upload.height),
            uploaded_at: Set(Utc::now()),
        };
        let attachment = Attachment::insert(attachment)
            .exec_with_returning(&self.db)
            .await?;
        info!(attachment_id = %attachment.id, %uploader, "hosted upload recorded");
        Ok(attachment)
    }

    pub async fn get_attachment(
        &self,
        attachment_id: AttachmentId,
    ) -> Result<AttachmentModel, AttachmentsServiceError> {
        Attachment::find_by_id(attachment_id)
            .one(&self.db)
            .await?
            .ok_or(AttachmentsServiceError::AttachmentNotFound)
    }

    async fn owned(
        &self,
        uploader: UserId,
        attachment_id: AttachmentId,
    ) -> Result<AttachmentModel, AttachmentsServiceError> {
        let attachment = self.get_attachment(attachment_id).await?;
        if attachment.uploader_id != Some(uploader) {
            return Err(AttachmentsServiceError::Forbidden);
        }
        Ok(attachment)
    }

    pub async fn rename_attachment(
        &self,
        uploader: UserId,
        attachment_id: AttachmentId,
        rename: AttachmentRename,
    ) -> Result<AttachmentModel, AttachmentsServiceError> {
        let attachment = self.owned(uploader, attachment_id).await?;
        let filename = validate::required("filename", &rename.filename)?;

        let mut active: AttachmentActiveModel = attachment.into();
        active.filename = Set(filename);
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete_attachment(
        &self,
        uploader: UserId,
        attachment_id: AttachmentId,
    ) -> Result<(), AttachmentsServiceError> {
        let attachment = self.owned(uploader, attachment_id).await?;
        Attachment::delete_by_id(attachment.id)
            .exec(&self.db)
            .await?;
        info!(%attachment_id, "attachment deleted");
        Ok(())
    }

    /// Checks that every id exists and was uploaded by `uploader`.
    pub async fn check_owned(
        &self,
        uploader: UserId,
        attachment_ids: &[AttachmentId],
    ) -> Result<(), AttachmentsServiceError> {
        if attachment_ids.is_empty() {
            return Ok(());
        }
        let found = Attachment::find()
            .filter(AttachmentColumn::Id.is_in(attachment_ids.iter().copied()))
            .all(&self.db)
            .await?;
        let distinct: HashSet<_> = attachment_ids.iter().collect();
        if found.len() != distinct.len() {
            return Err(AttachmentsServiceError::AttachmentNotFound);
        }
        if found.iter().any(|a| a.uploader_id != Some(uploader)) {
            return Err(AttachmentsServiceError::Forbidden);
        }
        Ok(())
    }
}

pub async fn attachments_by_message<C: ConnectionTrait>(
    conn: &C,
    message_ids: &[MessageId],
) -> Result<HashMap<MessageId, Vec<AttachmentModel>>, DbErr> {
    let mut grouped: HashMap<MessageId, Vec<AttachmentModel>> = HashMap::new();
    if message_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = MessageAttachment::find()
        .filter(MessageAttachmentColumn::MessageId.is_in(message_ids.iter().copied()))
        .find_also_related(Attachment)
        .all(conn)
        .await?;
    for (link, attachment) in rows {
        if let Some(attachment) = attachment {
            grouped.entry(link.message_id).or_default().push(attachment);
        }
    }
    Ok(grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;
    use serde_json::json;

    async fn setup() -> (AttachmentsService, UserId) {
        let db = test_utils::setup_db().await;
        let user = test_utils::create_test_user(&db, "Asha", Role::Member).await;
        (AttachmentsService::new(db), user.id)
    }

    fn notes() -> NewAttachment {
        NewAttachment {
            url: "https://cdn.example.com/notes.pdf".to_string(),
            secure_url: None,
            filename: "notes.pdf".to_string(),
            file_size: 2048,
            mime_type: "application/pdf".to_string(),
            folder: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_rename() {
        let (service, user_id) = setup().await;
        let attachment = service.create_attachment(user_id, notes()).await.unwrap();
        assert_eq!(attachment.uploader_id, Some(user_id));

        let renamed = service
            .rename_attachment(
                user_id,
                attachment.id,
                AttachmentRename {
                    filename: "week1.pdf".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.filename, "week1.pdf");
    }

    #[tokio::test]
    async fn test_negative_size_rejected() {
        let (service, user_id) = setup().await;
        let mut new = notes();
        new.file_size = -1;
        assert!(matches!(
            service.create_attachment(user_id, new).await,
            Err(AttachmentsServiceError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_hosted_upload_mapping() {
        let (service, user_id) = setup().await;
        let upload: HostedUpload = serde_json::from_value(json!({
            "asset_id": "a1b2",
            "public_id": "campus_uploads/cat",
            "format": "png",
            "resource_type": "image",
            "bytes": 1234,
            "url": "http://res.example.com/cat.png",
            "secure_url": "https://res.example.com/cat.png",
            "folder": "campus_uploads",
            "original_filename": "cat",
            "width": 400,
            "height": 300
        }))
        .unwrap();

        let attachment = service.record_hosted_upload(user_id, upload).await.unwrap();
        assert_eq!(attachment.filename, "cat.png");
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(attachment.file_size, 1234);
        assert_eq!(attachment.width, Some(400));
    }

    #[tokio::test]
    async fn test_only_uploader_deletes() {
        let (service, user_id) = setup().await;
        let attachment = service.create_attachment(user_id, notes()).await.unwrap();

        assert!(matches!(
            service.delete_attachment(UserId::new(), attachment.id).await,
            Err(AttachmentsServiceError::Forbidden)
        ));
        service.delete_attachment(user_id, attachment.id).await.unwrap();
        assert!(matches!(
            service.get_attachment(attachment.id).await,
            Err(AttachmentsServiceError::AttachmentNotFound)
        ));
    }

    #[tokio::test]
    async fn test_check_owned_tolerates_repeated_ids() {
        let (service, user_id) = setup().await;
        let attachment = service.create_attachment(user_id, notes()).await.unwrap();

        service
            .check_owned(user_id, &[attachment.id, attachment.id])
            .await
            .unwrap();
        assert!(matches!(
            service
                .check_owned(user_id, &[attachment.id, AttachmentId::new()])
                .await,
            Err(AttachmentsServiceError::AttachmentNotFound)
        ));
    }
}
