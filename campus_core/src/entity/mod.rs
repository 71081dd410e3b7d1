// SeaORM entities for the campus domain.

pub mod academic_record;
pub mod activity;
pub mod activity_type;
pub mod activity_type_assignment;
pub mod admin;
pub mod assignment;
pub mod attachment;
pub mod channel;
pub mod channel_member;
pub mod faculty;
pub mod friendship;
pub mod institute;
pub mod message;
pub mod message_attachment;
pub mod notification;
pub mod program;
pub mod student;
pub mod user;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use super::activity::{ActivityDetails, ActivityKind, ActivityStatus};
    pub use super::activity_type::{FieldKind, FormField, FormSchema, ReviewStatus};
    pub use super::friendship::FriendshipStatus;
    pub use super::institute::InstituteKind;
    pub use super::notification::NotificationKind;
    pub use super::program::ProgramLevel;
    pub use super::user::{Gender, Presence, Role};

    pub use super::academic_record::{
        ActiveModel as AcademicRecordActiveModel, Column as AcademicRecordColumn,
        Entity as AcademicRecord, Model as AcademicRecordModel,
    };
    pub use super::activity::{
        ActiveModel as ActivityActiveModel, Column as ActivityColumn, Entity as Activity,
        Model as ActivityModel,
    };
    pub use super::activity_type::{
        ActiveModel as ActivityTypeActiveModel, Column as ActivityTypeColumn, Entity as ActivityType,
        Model as ActivityTypeModel,
    };
    pub use super::activity_type_assignment::{
        ActiveModel as ActivityTypeAssignmentActiveModel, Column as ActivityTypeAssignmentColumn, Entity as ActivityTypeAssignment,
        Model as ActivityTypeAssignmentModel,
    };
    pub use super::admin::{
        ActiveModel as AdminActiveModel, Column as AdminColumn, Entity as Admin,
        Model as AdminModel,
    };
    pub use super::assignment::{
        ActiveModel as AssignmentActiveModel, Column as AssignmentColumn, Entity as Assignment,
        Model as AssignmentModel,
    };
    pub use super::attachment::{
        ActiveModel as AttachmentActiveModel, Column as AttachmentColumn, Entity as Attachment,
        Model as AttachmentModel,
    };
    pub use super::channel::{
        ActiveModel as ChannelActiveModel, Column as ChannelColumn, Entity as Channel,
        Model as ChannelModel,
    };
    pub use super::channel_member::{
        ActiveModel as ChannelMemberActiveModel, Column as ChannelMemberColumn, Entity as ChannelMember,
        Model as ChannelMemberModel,
    };
    pub use super::faculty::{
        ActiveModel as FacultyActiveModel, Column as FacultyColumn, Entity as Faculty,
        Model as FacultyModel,
    };
    pub use super::friendship::{
        ActiveModel as FriendshipActiveModel, Column as FriendshipColumn, Entity as Friendship,
        Model as FriendshipModel,
    };
    pub use super::institute::{
        ActiveModel as InstituteActiveModel, Column as InstituteColumn, Entity as Institute,
        Model as InstituteModel,
    };
    pub use super::message::{
        ActiveModel as MessageActiveModel, Column as MessageColumn, Entity as Message,
        Model as MessageModel,
    };
    pub use super::message_attachment::{
        ActiveModel as MessageAttachmentActiveModel, Column as MessageAttachmentColumn, Entity as MessageAttachment,
        Model as MessageAttachmentModel,
    };
    pub use super::notification::{
        ActiveModel as NotificationActiveModel, Column as NotificationColumn, Entity as Notification,
        Model as NotificationModel,
    };
    pub use super::program::{
        ActiveModel as ProgramActiveModel, Column as ProgramColumn, Entity as Program,
        Model as ProgramModel,
    };
    pub use super::student::{
        ActiveModel as StudentActiveModel, Column as StudentColumn, Entity as Student,
        Model as StudentModel,
    };
    pub use super::user::{
        ActiveModel as UserActiveModel, Column as UserColumn, Entity as User,
        Model as UserModel,
    };

    // Re-export commonly used SeaORM types and traits
    pub use sea_orm::{
        ActiveModelTrait, ActiveValue, ColumnTrait, Condition, ConnectionTrait, Database,
        DatabaseConnection, DatabaseTransaction, DbConn, DbErr, EntityTrait, IntoActiveModel,
        ModelTrait, NotSet, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Related,
        RelationTrait, Set, TransactionTrait, Unchanged,
    };
}
