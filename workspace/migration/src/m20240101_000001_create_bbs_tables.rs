use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len_null(Users::Urlname, 10).unique_key())
                    .col(string_len_null(Users::Nickname, 10).unique_key())
                    .col(string_len_null(Users::Anonyname, 10).unique_key())
                    .col(date_time_null(Users::RegTime))
                    .col(date_time_null(Users::LastLogin))
                    .col(small_integer(Users::Seen).default(1))
                    .col(small_integer(Users::Status).default(1))
                    .to_owned(),
            )
            .await?;

        // Create bbs_posts table
        manager
            .create_table(
                Table::create()
                    .table(BbsPosts::Table)
                    .if_not_exists()
                    .col(pk_auto(BbsPosts::Id))
                    .col(integer(BbsPosts::AuthorId))
                    .col(string_len(BbsPosts::Title, 80))
                    .col(text(BbsPosts::Content))
                    .col(boolean(BbsPosts::Anonymous).default(false))
                    .col(date_time(BbsPosts::CreatedAt))
                    .col(date_time(BbsPosts::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bbs_post_author")
                            .from(BbsPosts::Table, BbsPosts::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create bbs_cmts table
        manager
            .create_table(
                Table::create()
                    .table(BbsCmts::Table)
                    .if_not_exists()
                    .col(pk_auto(BbsCmts::Id))
                    .col(integer(BbsCmts::PostId))
                    .col(integer(BbsCmts::AuthorId))
                    .col(text(BbsCmts::Content))
                    .col(boolean(BbsCmts::Anonymous).default(false))
                    .col(integer(BbsCmts::Floor))
                    .col(date_time(BbsCmts::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bbs_cmt_post")
                            .from(BbsCmts::Table, BbsCmts::PostId)
                            .to(BbsPosts::Table, BbsPosts::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bbs_cmt_author")
                            .from(BbsCmts::Table, BbsCmts::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Floors are unique within a post
        manager
            .create_index(
                Index::create()
                    .name("idx_bbs_cmts_post_floor")
                    .table(BbsCmts::Table)
                    .col(BbsCmts::PostId)
                    .col(BbsCmts::Floor)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BbsCmts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BbsPosts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Urlname,
    Nickname,
    Anonyname,
    RegTime,
    LastLogin,
    Seen,
    Status,
}

#[derive(DeriveIden)]
enum BbsPosts {
    Table,
    Id,
    AuthorId,
    Title,
    Content,
    Anonymous,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum BbsCmts {
    Table,
    Id,
    PostId,
    AuthorId,
    Content,
    Anonymous,
    Floor,
    CreatedAt,
}
