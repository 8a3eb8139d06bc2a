use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter().table(Films::Table).add_column(text_null(Films::Description)).to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(Table::alter().table(Films::Table).drop_column(Films::Description).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Films {
    Table,
    Description,
}
