use sea_orm::entity::prelude::*;
use sea_orm::{QueryOrder, QuerySelect};
use serde::Serialize;

/// A reply to a topic. `floor` is the 1-based position of the reply within
/// its topic.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "bbs_cmts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub post_id: i32,
    pub author_id: i32,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub anonymous: bool,
    pub floor: i32,
    pub created_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bbs_post::Entity",
        from = "Column::PostId",
        to = "super::bbs_post::Column::Id"
    )]
    Post,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id"
    )]
    Author,
}

impl Related<super::bbs_post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Floor number the next reply to `post_id` should take.
pub async fn next_floor<C: ConnectionTrait>(db: &C, post_id: i32) -> Result<i32, DbErr> {
    let last = Entity::find()
        .filter(Column::PostId.eq(post_id))
        .order_by_desc(Column::Floor)
        .limit(1)
        .one(db)
        .await?;

    Ok(last.map_or(1, |cmt| cmt.floor + 1))
}
