use sea_orm_migration::prelude::*;

/// Outbox entries may be dispatched more than once; the originating outbox
/// uuid is stored on every materialized row so replays become no-ops.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .alter_table(
                Table::alter()
                    .table(ChangeLogs::Table)
                    .add_column(ColumnDef::new(ChangeLogs::SourceEventId).uuid())
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(Notifications::Table)
                    .add_column(ColumnDef::new(Notifications::SourceEventId).uuid())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_change_logs_source_event_id")
                    .table(ChangeLogs::Table)
                    .col(ChangeLogs::SourceEventId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_notifications_source_event_user")
                    .table(Notifications::Table)
                    .col(Notifications::SourceEventId)
                    .col(Notifications::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS idx_notifications_source_event_user;")
            .await?;
        manager
            .get_connection()
            .execute_unprepared("DROP INDEX IF EXISTS idx_change_logs_source_event_id;")
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(Notifications::Table)
                    .drop_column(Notifications::SourceEventId)
                    .to_owned(),
            )
            .await?;
        manager
            .alter_table(
                Table::alter()
                    .table(ChangeLogs::Table)
                    .drop_column(ChangeLogs::SourceEventId)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(Iden)]
enum ChangeLogs {
    Table,
    SourceEventId,
}

#[derive(Iden)]
enum Notifications {
    Table,
    UserId,
    SourceEventId,
}
