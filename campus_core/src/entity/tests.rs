#[cfg(test)]
mod entity_tests {
    use crate::entity::prelude::*;
    use crate::ids::*;
    use crate::models::migrator::Migrator;
    use chrono::Utc;
    use sea_orm_migration::MigratorTrait;
    use serde_json::json;

    /// Test helper to create and migrate an in-memory database
    async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    fn user(email: &str) -> UserActiveModel {
        let now = Utc::now();
        UserActiveModel {
            id: Set(UserId::new()),
            name: Set("Test User".to_string()),
            email: Set(email.to_string()),
            password_hash: Set("not-a-real-hash".to_string()),
            role: Set(Role::Member),
            gender: Set(None),
            phone: Set(None),
            profile_picture: Set(None),
            presence: Set(Presence::Offline),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    async fn insert_user(db: &DatabaseConnection, email: &str) -> UserModel {
        User::insert(user(email))
            .exec_with_returning(db)
            .await
            .expect("Failed to insert user")
    }

    async fn insert_institute(db: &DatabaseConnection) -> InstituteModel {
        let now = Utc::now();
        let institute = InstituteActiveModel {
            id: Set(InstituteId::new()),
            name: Set("Test Institute".to_string()),
            kind: Set(InstituteKind::Government),
            official_email: Set(format!("{}@inst.edu", InstituteId::new())),
            official_phone: Set("0801234567".to_string()),
            address_line1: Set("Main Road".to_string()),
            address_line2: Set(None),
            city: Set("Mysuru".to_string()),
            state: Set("Karnataka".to_string()),
            pincode: Set("570001".to_string()),
            is_affiliated: Set(false),
            affiliation_university: Set(None),
            affiliation_id: Set(None),
            institute_code: Set(None),
            established_year: Set(None),
            accreditation_status: Set(None),
            website: Set(None),
            logo: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        Institute::insert(institute)
            .exec_with_returning(db)
            .await
            .expect("Failed to insert institute")
    }

    fn program(institute_id: InstituteId, branch: Option<&str>) -> ProgramActiveModel {
        let now = Utc::now();
        ProgramActiveModel {
            id: Set(ProgramId::new()),
            institute_id: Set(institute_id),
            level: Set(ProgramLevel::UG),
            degree: Set("B.E.".to_string()),
            branch: Set(branch.map(str::to_string)),
            specialization: Set(None),
            intake: Set(60),
            created_at: Set(now),
            updated_at: Set(now),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let db = setup_test_db().await;
        let created = insert_user(&db, "asha@example.com").await;

        let found = User::find_by_id(created.id)
            .one(&db)
            .await
            .expect("Failed to query user")
            .expect("User missing");
        assert_eq!(found.email, "asha@example.com");
        assert_eq!(found.role, Role::Member);
        assert_eq!(found.presence, Presence::Offline);
    }

    #[tokio::test]
    async fn test_user_email_is_unique() {
        let db = setup_test_db().await;
        insert_user(&db, "dup@example.com").await;

        let result = User::insert(user("dup@example.com")).exec(&db).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_password_hash_is_never_serialized() {
        let db = setup_test_db().await;
        let created = insert_user(&db, "hidden@example.com").await;

        let value = serde_json::to_value(&created).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["role"], "member");
    }

    #[tokio::test]
    async fn test_program_tuple_is_unique() {
        let db = setup_test_db().await;
        let institute = insert_institute(&db).await;

        Program::insert(program(institute.id, Some("CSE")))
            .exec(&db)
            .await
            .unwrap();
        let duplicate = Program::insert(program(institute.id, Some("CSE")))
            .exec(&db)
            .await;
        assert!(duplicate.is_err());

        Program::insert(program(institute.id, Some("ECE")))
            .exec(&db)
            .await
            .unwrap();
        let count = Program::find()
            .filter(ProgramColumn::InstituteId.eq(institute.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_program_tuple_is_unique_without_branch() {
        let db = setup_test_db().await;
        let institute = insert_institute(&db).await;

        Program::insert(program(institute.id, None))
            .exec(&db)
            .await
            .unwrap();
        let duplicate = Program::insert(program(institute.id, None)).exec(&db).await;
        assert!(duplicate.is_err());

        Program::insert(program(institute.id, Some("CSE")))
            .exec(&db)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_null_id_column_loads_as_none() {
        let db = setup_test_db().await;
        let institute = insert_institute(&db).await;
        let account = insert_user(&db, "noprogram@example.com").await;

        let now = Utc::now();
        let student = Student::insert(StudentActiveModel {
            id: Set(StudentId::new()),
            user_id: Set(account.id),
            institute_id: Set(institute.id),
            program_id: Set(None),
            roll_number: Set("4MC21CS001".to_string()),
            year: Set(None),
            semester: Set(None),
            section: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_with_returning(&db)
        .await
        .unwrap();
        assert_eq!(student.program_id, None);

        let found = Student::find_by_id(student.id)
            .one(&db)
            .await
            .unwrap()
            .expect("student missing");
        assert_eq!(found.program_id, None);
        assert_eq!(found.user_id, account.id);

        let message = Message::insert(MessageActiveModel {
            id: Set(MessageId::new()),
            sender_id: Set(account.id),
            recipient_id: Set(Some(account.id)),
            channel_id: Set(None),
            content: Set("note to self".to_string()),
            is_read: Set(false),
            sent_at: Set(now),
            read_at: Set(None),
        })
        .exec_with_returning(&db)
        .await
        .unwrap();
        assert_eq!(message.channel_id, None);
        assert_eq!(message.recipient_id, Some(account.id));
    }

    #[tokio::test]
    async fn test_activity_details_round_trip_through_json_column() {
        let db = setup_test_db().await;
        let institute = insert_institute(&db).await;
        let account = insert_user(&db, "student@example.com").await;

        let now = Utc::now();
        let student = Student::insert(StudentActiveModel {
            id: Set(StudentId::new()),
            user_id: Set(account.id),
            institute_id: Set(institute.id),
            program_id: Set(None),
            roll_number: Set("4MC21CS042".to_string()),
            year: Set(Some(3)),
            semester: Set(Some(5)),
            section: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_with_returning(&db)
        .await
        .unwrap();

        let details: ActivityDetails = serde_json::from_value(json!({
            "kind": "hackathon",
            "team_size": 4,
            "rank": "2nd",
            "organizer": "IEEE"
        }))
        .unwrap();
        let activity = Activity::insert(ActivityActiveModel {
            id: Set(ActivityId::new()),
            student_id: Set(student.id),
            institute_id: Set(institute.id),
            activity_type_id: Set(None),
            kind: Set(details.kind()),
            title: Set("Smart India Hackathon".to_string()),
            description: Set(None),
            status: Set(ActivityStatus::Draft),
            details: Set(details.clone()),
            remarks: Set(None),
            date_start: Set(None),
            date_end: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_with_returning(&db)
        .await
        .unwrap();

        let found = Activity::find_by_id(activity.id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.kind, ActivityKind::Hackathon);
        assert_eq!(found.details, details);
    }

    #[tokio::test]
    async fn test_deleting_user_cascades_to_profile() {
        let db = setup_test_db().await;
        let institute = insert_institute(&db).await;
        let account = insert_user(&db, "admin@example.com").await;

        Admin::insert(AdminActiveModel {
            id: Set(AdminId::new()),
            user_id: Set(account.id),
            institute_id: Set(institute.id),
            created_at: Set(Utc::now()),
        })
        .exec(&db)
        .await
        .unwrap();

        User::delete_by_id(account.id).exec(&db).await.unwrap();
        let remaining = Admin::find()
            .filter(AdminColumn::UserId.eq(account.id))
            .count(&db)
            .await
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[tokio::test]
    async fn test_friendship_pair_is_unique() {
        let db = setup_test_db().await;
        let a = insert_user(&db, "a@example.com").await;
        let b = insert_user(&db, "b@example.com").await;

        let request = || FriendshipActiveModel {
            id: Set(FriendshipId::new()),
            requester_id: Set(a.id),
            recipient_id: Set(b.id),
            status: Set(FriendshipStatus::Pending),
            requested_at: Set(Utc::now()),
            responded_at: Set(None),
        };
        Friendship::insert(request()).exec(&db).await.unwrap();
        assert!(Friendship::insert(request()).exec(&db).await.is_err());
    }

    #[tokio::test]
    async fn test_channel_members_via_relation() {
        let db = setup_test_db().await;
        let owner = insert_user(&db, "owner@example.com").await;
        let now = Utc::now();

        let channel = Channel::insert(ChannelActiveModel {
            id: Set(ChannelId::new()),
            name: Set("Robotics club".to_string()),
            description: Set(None),
            owner_id: Set(owner.id),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .exec_with_returning(&db)
        .await
        .unwrap();

        ChannelMember::insert(ChannelMemberActiveModel {
            channel_id: Set(channel.id),
            user_id: Set(owner.id),
            joined_at: Set(now),
        })
        .exec_without_returning(&db)
        .await
        .unwrap();

        let members = channel
            .find_related(ChannelMember)
            .all(&db)
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, owner.id);
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(
            serde_json::to_value(ReviewStatus::UnderReview).unwrap(),
            "under_review"
        );
        assert_eq!(
            serde_json::to_value(NotificationKind::FriendAccepted).unwrap(),
            "friend_accepted"
        );
        assert_eq!(serde_json::to_value(ProgramLevel::PhD).unwrap(), "PhD");
        assert!(serde_json::from_value::<Role>(json!("superuser")).is_err());
    }
}
