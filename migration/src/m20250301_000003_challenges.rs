use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Challenges::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Challenges::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Challenges::CreatorId).string().not_null())
                    .col(ColumnDef::new(Challenges::ChallengedId).string().null())
                    .col(ColumnDef::new(Challenges::Title).string().not_null())
                    .col(ColumnDef::new(Challenges::Description).text().null())
                    .col(
                        ColumnDef::new(Challenges::Category)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Challenges::StakeAmount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Challenges::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Challenges::Result).string_len(24).null())
                    .col(
                        ColumnDef::new(Challenges::DueDate)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Challenges::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Challenges::AcceptedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Challenges::ResolvedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_challenges_creator")
                    .table(Challenges::Table)
                    .col(Challenges::CreatorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_challenges_challenged")
                    .table(Challenges::Table)
                    .col(Challenges::ChallengedId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_challenges_status")
                    .table(Challenges::Table)
                    .col(Challenges::Status)
                    .col(Challenges::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Challenges::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Challenges {
    Table,
    Id,
    CreatorId,
    ChallengedId,
    Title,
    Description,
    Category,
    StakeAmount,
    Status,
    Result,
    DueDate,
    CreatedAt,
    AcceptedAt,
    ResolvedAt,
}
