use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::{
    entity::prelude::*,
    ids::{ChannelId, UserId},
    service::validate::{self, Invalid},
};

#[derive(Debug, Error)]
pub enum ChannelsServiceError {
    #[error("fatal database error")]
    DbError(#[from] DbErr),

    #[error("channel not found")]
    ChannelNotFound,

    #[error("user not found")]
    UserNotFound,

    #[error("user is already a member")]
    AlreadyMember,

    #[error("user is not a member of this channel")]
    NotMember,

    #[error("only the channel owner can do this")]
    NotOwner,

    #[error("the owner cannot leave their own channel")]
    OwnerRemoval,

    #[error(transparent)]
    Invalid(#[from] Invalid),
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewChannel {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<UserId>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddMember {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelMemberView {
    pub user: UserModel,
    pub joined_at: DateTime<Utc>,
}

async fn insert_member<C: ConnectionTrait>(
    conn: &C,
    channel_id: ChannelId,
    user_id: UserId,
) -> Result<(), DbErr> {
    let member = ChannelMemberActiveModel {
        channel_id: Set(channel_id),
        user_id: Set(user_id),
        joined_at: Set(Utc::now()),
    };
    ChannelMember::insert(member)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

#[derive(Clone)]
pub struct ChannelsService {
    db: DatabaseConnection,
}

impl ChannelsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates the channel with the owner and the listed users as members.
    pub async fn create_channel(
        &self,
        owner: UserId,
        new: NewChannel,
    ) -> Result<ChannelModel, ChannelsServiceError> {
        let name = validate::name(&new.name)?;

        let mut members: Vec<UserId> = new.members.into_iter().filter(|id| *id != owner).collect();
        members.sort();
        members.dedup();

        let txn = self.db.begin().await?;
        let found = User::find()
            .filter(UserColumn::Id.is_in(members.iter().copied()))
            .count(&txn)
            .await?;
        if found as usize != members.len() {
            return Err(ChannelsServiceError::UserNotFound);
        }

        let now = Utc::now();
        let channel = ChannelActiveModel {
            id: Set(ChannelId::new()),
            name: Set(name),
            description: Set(validate::optional(new.description)),
            owner_id: Set(owner),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let channel = Channel::insert(channel).exec_with_returning(&txn).await?;
        insert_member(&txn, channel.id, owner).await?;
        for user_id in &members {
            insert_member(&txn, channel.id, *user_id).await?;
        }
        txn.commit().await?;

        info!(channel_id = %channel.id, %owner, members = members.len() + 1, "channel created");
        Ok(channel)
    }

    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<ChannelModel>, ChannelsServiceError> {
        Ok(Channel::find()
            .inner_join(ChannelMember)
            .filter(ChannelMemberColumn::UserId.eq(user))
            .order_by_desc(ChannelColumn::UpdatedAt)
            .all(&self.db)
            .await?)
    }

    pub async fn is_member(&self, channel_id: ChannelId, user: UserId) -> Result<bool, ChannelsServiceError> {
        Ok(ChannelMember::find_by_id((channel_id, user))
            .one(&self.db)
            .await?
            .is_some())
    }

    /// Visible to members only; outsiders get not found.
    pub async fn get_channel(
        &self,
        user: UserId,
        channel_id: ChannelId,
    ) -> Result<ChannelModel, ChannelsServiceError> {
        let channel = Channel::find_by_id(channel_id)
            .one(&self.db)
            .await?
            .ok_or(ChannelsServiceError::ChannelNotFound)?;
        if !self.is_member(channel_id, user).await? {
            return Err(ChannelsServiceError::ChannelNotFound);
        }
        Ok(channel)
    }

    async fn owned(
        &self,
        user: UserId,
        channel_id: ChannelId,
    ) -> Result<ChannelModel, ChannelsServiceError> {
        let channel = Channel::find_by_id(channel_id)
            .one(&self.db)
            .await?
            .ok_or(ChannelsServiceError::ChannelNotFound)?;
        if channel.owner_id != user {
            return Err(ChannelsServiceError::NotOwner);
        }
        Ok(channel)
    }

    pub async fn update_channel(
        &self,
        user: UserId,
        channel_id: ChannelId,
        update: ChannelUpdate,
    ) -> Result<ChannelModel, ChannelsServiceError> {
        let channel = self.owned(user, channel_id).await?;
        let mut active: ChannelActiveModel = channel.into();
        if let Some(name) = update.name {
            active.name = Set(validate::name(&name)?);
        }
        if update.description.is_some() {
            active.description = Set(validate::optional(update.description));
        }
        active.updated_at = Set(Utc::now());
        Ok(active.update(&self.db).await?)
    }

    pub async fn delete_channel(
        &self,
        user: UserId,
        channel_id: ChannelId,
    ) -> Result<(), ChannelsServiceError> {
        let channel = self.owned(user, channel_id).await?;
        Channel::delete_by_id(channel.id).exec(&self.db).await?;
        info!(%channel_id, "channel deleted");
        Ok(())
    }

    pub async fn members(
        &self,
        user: UserId,
        channel_id: ChannelId,
    ) -> Result<Vec<ChannelMemberView>, ChannelsServiceError> {
        self.get_channel(user, channel_id).await?;
        let rows = ChannelMember::find()
            .filter(ChannelMemberColumn::ChannelId.eq(channel_id))
            .order_by_asc(ChannelMemberColumn::JoinedAt)
            .find_also_related(User)
            .all(&self.db)
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(member, user)| {
                user.map(|user| ChannelMemberView {
                    user,
                    joined_at: member.joined_at,
                })
            })
            .collect())
    }

    pub async fn member_ids(&self, channel_id: ChannelId) -> Result<Vec<UserId>, ChannelsServiceError> {
        Ok(ChannelMember::find()
            .filter(ChannelMemberColumn::ChannelId.eq(channel_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect())
    }

    pub async fn add_member(
        &self,
        user: UserId,
        channel_id: ChannelId,
        add: AddMember,
    ) -> Result<(), ChannelsServiceError> {
        self.owned(user, channel_id).await?;
        if User::find_by_id(add.user_id).one(&self.db).await?.is_none() {
            return Err(ChannelsServiceError::UserNotFound);
        }
        if self.is_member(channel_id, add.user_id).await? {
            return Err(ChannelsServiceError::AlreadyMember);
        }
        insert_member(&self.db, channel_id, add.user_id).await?;
        info!(%channel_id, user_id = %add.user_id, "channel member added");
        Ok(())
    }

    /// The owner removes anyone but themselves; a member may remove only themselves.
    pub async fn remove_member(
        &self,
        user: UserId,
        channel_id: ChannelId,
        member: UserId,
    ) -> Result<(), ChannelsServiceError> {
        let channel = Channel::find_by_id(channel_id)
            .one(&self.db)
            .await?
            .ok_or(ChannelsServiceError::ChannelNotFound)?;
        if member == channel.owner_id {
            return Err(ChannelsServiceError::OwnerRemoval);
        }
        if user != channel.owner_id && user != member {
            return Err(ChannelsServiceError::NotOwner);
        }

        let result = ChannelMember::delete_by_id((channel_id, member))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(ChannelsServiceError::NotMember);
        }
        info!(%channel_id, user_id = %member, "channel member removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils;

    async fn setup() -> (ChannelsService, UserModel, UserModel, UserModel) {
        let db = test_utils::setup_db().await;
        let asha = test_utils::create_test_user(&db, "Asha", Role::Member).await;
        let ravi = test_utils::create_test_user(&db, "Ravi", Role::Member).await;
        let meera = test_utils::create_test_user(&db, "Meera", Role::Member).await;
        (ChannelsService::new(db), asha, ravi, meera)
    }

    fn study_group(members: Vec<UserId>) -> NewChannel {
        NewChannel {
            name: "DBMS study group".to_string(),
            description: Some("Exam prep".to_string()),
            members,
        }
    }

    #[tokio::test]
    async fn test_owner_is_always_member() {
        let (service, asha, ravi, _) = setup().await;
        let channel = service
            .create_channel(asha.id, study_group(vec![ravi.id, asha.id, ravi.id]))
            .await
            .unwrap();

        let mut ids = service.member_ids(channel.id).await.unwrap();
        ids.sort();
        let mut expected = vec![asha.id, ravi.id];
        expected.sort();
        assert_eq!(ids, expected);

        assert!(matches!(
            service.remove_member(asha.id, channel.id, asha.id).await,
            Err(ChannelsServiceError::OwnerRemoval)
        ));
    }

    #[tokio::test]
    async fn test_short_name_rejected() {
        let (service, asha, _, _) = setup().await;
        let mut new = study_group(vec![]);
        new.name = "x".to_string();
        assert!(matches!(
            service.create_channel(asha.id, new).await,
            Err(ChannelsServiceError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_outsiders_cannot_see() {
        let (service, asha, ravi, meera) = setup().await;
        let channel = service
            .create_channel(asha.id, study_group(vec![ravi.id]))
            .await
            .unwrap();

        assert!(service.get_channel(ravi.id, channel.id).await.is_ok());
        assert!(matches!(
            service.get_channel(meera.id, channel.id).await,
            Err(ChannelsServiceError::ChannelNotFound)
        ));
        assert_eq!(service.list_for_user(ravi.id).await.unwrap().len(), 1);
        assert!(service.list_for_user(meera.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_membership_management() {
        let (service, asha, ravi, meera) = setup().await;
        let channel = service
            .create_channel(asha.id, study_group(vec![ravi.id]))
            .await
            .unwrap();

        // Members cannot invite.
        assert!(matches!(
            service
                .add_member(ravi.id, channel.id, AddMember { user_id: meera.id })
                .await,
            Err(ChannelsServiceError::NotOwner)
        ));
        service
            .add_member(asha.id, channel.id, AddMember { user_id: meera.id })
            .await
            .unwrap();
        assert!(matches!(
            service
                .add_member(asha.id, channel.id, AddMember { user_id: meera.id })
                .await,
            Err(ChannelsServiceError::AlreadyMember)
        ));

        // A member may leave on their own but not kick others.
        assert!(matches!(
            service.remove_member(ravi.id, channel.id, meera.id).await,
            Err(ChannelsServiceError::NotOwner)
        ));
        service
            .remove_member(ravi.id, channel.id, ravi.id)
            .await
            .unwrap();
        assert_eq!(service.members(asha.id, channel.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_only_owner_updates_and_deletes() {
        let (service, asha, ravi, _) = setup().await;
        let channel = service
            .create_channel(asha.id, study_group(vec![ravi.id]))
            .await
            .unwrap();

        let update = ChannelUpdate {
            name: Some("DBMS finals".to_string()),
            description: None,
        };
        assert!(matches!(
            service
                .update_channel(ravi.id, channel.id, update.clone())
                .await,
            Err(ChannelsServiceError::NotOwner)
        ));
        let updated = service
            .update_channel(asha.id, channel.id, update)
            .await
            .unwrap();
        assert_eq!(updated.name, "DBMS finals");

        service.delete_channel(asha.id, channel.id).await.unwrap();
        assert!(matches!(
            service.get_channel(asha.id, channel.id).await,
            Err(ChannelsServiceError::ChannelNotFound)
        ));
    }
}
