use sea_orm::entity::prelude::*;
use serde::Serialize;

/// A discussion topic opened by a user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "bbs_posts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub author_id: i32,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    /// Shown under the author's `anonyname` instead of the nickname.
    pub anonymous: bool,
    pub created_at: DateTime,
    /// Bumped whenever a reply is added.
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id"
    )]
    Author,
    #[sea_orm(has_many = "super::bbs_cmt::Entity")]
    BbsCmt,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::bbs_cmt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BbsCmt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
