use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Events::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Events::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Events::CreatorId).string().not_null())
                    .col(ColumnDef::new(Events::Title).string().not_null())
                    .col(ColumnDef::new(Events::Description).text().null())
                    .col(ColumnDef::new(Events::Category).string_len(32).not_null())
                    .col(ColumnDef::new(Events::EntryFee).big_integer().not_null())
                    .col(
                        ColumnDef::new(Events::YesPool)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Events::NoPool)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Events::MaxParticipants).integer().null())
                    .col(
                        ColumnDef::new(Events::IsPrivate)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Events::Status).string_len(16).not_null())
                    .col(ColumnDef::new(Events::Outcome).string_len(8).null())
                    .col(
                        ColumnDef::new(Events::EndDate)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::EndingSoonNotified)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Events::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Events::ResolvedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // scheduler scans open events by end date
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_events_status_end_date")
                    .table(Events::Table)
                    .col(Events::Status)
                    .col(Events::EndDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(EventParticipants::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(EventParticipants::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(EventParticipants::EventId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EventParticipants::UserId).string().not_null())
                    .col(
                        ColumnDef::new(EventParticipants::Prediction)
                            .string_len(8)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(EventParticipants::Amount)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(EventParticipants::Payout).big_integer().null())
                    .col(
                        ColumnDef::new(EventParticipants::JoinedAt)
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
                    .name("idx_event_participants_unique")
                    .table(EventParticipants::Table)
                    .col(EventParticipants::EventId)
                    .col(EventParticipants::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventParticipants::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Events::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
    CreatorId,
    Title,
    Description,
    Category,
    EntryFee,
    YesPool,
    NoPool,
    MaxParticipants,
    IsPrivate,
    Status,
    Outcome,
    EndDate,
    EndingSoonNotified,
    CreatedAt,
    ResolvedAt,
}

#[derive(DeriveIden)]
enum EventParticipants {
    Table,
    Id,
    EventId,
    UserId,
    Prediction,
    Amount,
    Payout,
    JoinedAt,
}
