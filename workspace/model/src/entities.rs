//! SeaORM entities for the bulletin board: members, topics and replies.

pub mod bbs_cmt;
pub mod bbs_post;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::bbs_cmt::Entity as BbsCmt;
    pub use super::bbs_post::Entity as BbsPost;
    pub use super::user::Entity as User;
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{
        ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait,
        ModelTrait, Set,
    };

    use super::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    fn new_user(handle: &str) -> user::ActiveModel {
        user::ActiveModel {
            urlname: Set(Some(handle.to_string())),
            nickname: Set(Some(format!("{handle}_n"))),
            anonyname: Set(Some(format!("{handle}_a"))),
            reg_time: Set(Some(Utc::now().naive_utc())),
            seen: Set(user::SEEN_VISIBLE),
            status: Set(user::STATUS_NORMAL),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_user_posts_and_comments() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let now = Utc::now().naive_utc();

        let alice = new_user("alice").insert(&db).await?;
        let bob = new_user("bob").insert(&db).await?;

        let post = bbs_post::ActiveModel {
            author_id: Set(alice.id),
            title: Set("Hello".to_string()),
            content: Set("First topic".to_string()),
            anonymous: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        for text in ["one", "two"] {
            let floor = bbs_cmt::next_floor(&db, post.id).await?;
            bbs_cmt::ActiveModel {
                post_id: Set(post.id),
                author_id: Set(bob.id),
                content: Set(text.to_string()),
                anonymous: Set(true),
                floor: Set(floor),
                created_at: Set(now),
                ..Default::default()
            }
            .insert(&db)
            .await?;
        }

        let posts = alice.find_related(BbsPost).all(&db).await?;
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "Hello");

        let cmts = bob.find_related(BbsCmt).all(&db).await?;
        let floors: Vec<i32> = cmts.iter().map(|c| c.floor).collect();
        assert_eq!(floors, vec![1, 2]);

        let author = post.find_related(User).one(&db).await?.unwrap();
        assert_eq!(author.id, alice.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_handles_are_unique() -> Result<(), DbErr> {
        let db = setup_db().await?;

        new_user("carol").insert(&db).await?;
        let duplicate = new_user("carol").insert(&db).await;
        assert!(duplicate.is_err());

        Ok(())
    }

    #[tokio::test]
    async fn test_deleting_user_cascades() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let now = Utc::now().naive_utc();

        let dave = new_user("dave").insert(&db).await?;
        bbs_post::ActiveModel {
            author_id: Set(dave.id),
            title: Set("Bye".to_string()),
            content: Set("Soon gone".to_string()),
            anonymous: Set(false),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        User::delete_by_id(dave.id).exec(&db).await?;
        assert!(BbsPost::find().all(&db).await?.is_empty());

        Ok(())
    }

    #[test]
    fn test_user_predicates() {
        let mut user = user::Model {
            id: 7,
            urlname: Some("erin".to_string()),
            nickname: Some("Erin".to_string()),
            anonyname: Some("ghost".to_string()),
            reg_time: None,
            last_login: None,
            seen: user::SEEN_VISIBLE,
            status: user::STATUS_NORMAL,
        };

        assert!(user.is_authenticated());
        assert!(user.is_active());
        assert_eq!(user.get_id(), "7");
        assert_eq!(user.to_string(), "<User \"Erin\">");
        assert_eq!(user.display_name(false), "Erin");
        assert_eq!(user.display_name(true), "ghost");
        assert!(!user.is_admin());
        assert!(user.is_visible());

        user.status = user::STATUS_ADMIN;
        user.seen = user::SEEN_HIDDEN;
        assert!(user.is_admin());
        assert!(!user.is_visible());
    }
}
