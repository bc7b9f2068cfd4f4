use sea_orm::entity::prelude::*;
use serde::Serialize;
use std::fmt;

/// Regular member.
pub const STATUS_NORMAL: i16 = 1;
/// Board administrator, allowed under `/admin`.
pub const STATUS_ADMIN: i16 = 2;

/// Profile is listed and viewable by everyone.
pub const SEEN_VISIBLE: i16 = 1;
/// Profile is only viewable by its owner and administrators.
pub const SEEN_HIDDEN: i16 = 0;

/// A board member.
///
/// A user carries three unique handles: `urlname` is used in profile URLs
/// and to log in, `nickname` is shown on signed posts and `anonyname` is
/// shown on posts made anonymously.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub urlname: Option<String>,
    #[sea_orm(unique)]
    pub nickname: Option<String>,
    #[sea_orm(unique)]
    pub anonyname: Option<String>,
    pub reg_time: Option<DateTime>,
    pub last_login: Option<DateTime>,
    #[sea_orm(default_value = "1")]
    pub seen: i16,
    #[sea_orm(default_value = "1")]
    pub status: i16,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Topics written by this user.
    #[sea_orm(has_many = "super::bbs_post::Entity")]
    BbsPost,
    /// Replies written by this user.
    #[sea_orm(has_many = "super::bbs_cmt::Entity")]
    BbsCmt,
}

impl Related<super::bbs_post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BbsPost.def()
    }
}

impl Related<super::bbs_cmt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BbsCmt.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Any loaded user counts as logged in.
    pub fn is_authenticated(&self) -> bool {
        true
    }

    /// Accounts are never deactivated.
    pub fn is_active(&self) -> bool {
        true
    }

    /// Identifier stored in the login session.
    pub fn get_id(&self) -> String {
        self.id.to_string()
    }

    pub fn is_admin(&self) -> bool {
        self.status == STATUS_ADMIN
    }

    pub fn is_visible(&self) -> bool {
        self.seen != SEEN_HIDDEN
    }

    /// Name shown next to a post or reply.
    pub fn display_name(&self, anonymous: bool) -> &str {
        let name = if anonymous {
            self.anonyname.as_deref()
        } else {
            self.nickname.as_deref()
        };
        name.unwrap_or("")
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<User {:?}>", self.nickname.as_deref().unwrap_or(""))
    }
}
