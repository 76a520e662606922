use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TelegramLinks::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TelegramLinks::UserId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TelegramLinks::TelegramId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(TelegramLinks::ChatId).big_integer().not_null())
                    .col(ColumnDef::new(TelegramLinks::TelegramUsername).string().null())
                    .col(
                        ColumnDef::new(TelegramLinks::LinkedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_telegram_links_telegram_id")
                    .table(TelegramLinks::Table)
                    .col(TelegramLinks::TelegramId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_telegram_links_telegram_id")
                    .to_owned(),
            )
            .await?;

        manager
            .drop_table(Table::drop().table(TelegramLinks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TelegramLinks {
    Table,
    UserId,
    TelegramId,
    ChatId,
    TelegramUsername,
    LinkedAt,
}
