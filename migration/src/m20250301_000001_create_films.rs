use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Films::Table)
                    .if_not_exists()
                    // AUTOINCREMENT on SQLite, so deleted ids are never handed out again.
                    .col(pk_auto(Films::Id))
                    .col(string_len(Films::Title, 255))
                    .col(integer(Films::Year))
                    .col(string_null(Films::Genre))
                    .col(string_null(Films::Director))
                    .col(double_null(Films::Rating))
                    .col(string_null(Films::OmdbId))
                    .col(big_integer(Films::CreatedAt))
                    .col(big_integer(Films::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_films_title_year")
                    .table(Films::Table)
                    .col(Films::Title)
                    .col(Films::Year)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_films_omdb_id")
                    .table(Films::Table)
                    .col(Films::OmdbId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Films::Table).to_owned()).await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Films {
    Table,
    Id,
    Title,
    Year,
    Genre,
    Director,
    Rating,
    OmdbId,
    CreatedAt,
    UpdatedAt,
}
