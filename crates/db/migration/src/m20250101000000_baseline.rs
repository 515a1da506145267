use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Workspaces::Table)
                    .col(pk_id_col(manager, Workspaces::Id))
                    .col(uuid_col(Workspaces::Uuid))
                    .col(ColumnDef::new(Workspaces::Name).string().not_null())
                    .col(
                        ColumnDef::new(Workspaces::WorkspaceType)
                            .string_len(16)
                            .not_null()
                            .default(Expr::val("COMMUNITY")),
                    )
                    // users.workspace_id already points here; no constraint in this direction.
                    .col(fk_id_nullable_col(manager, Workspaces::OwnerId))
                    .col(
                        ColumnDef::new(Workspaces::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(counter_col(Workspaces::UsageUsers))
                    .col(counter_col(Workspaces::UsageTasks))
                    .col(counter_col(Workspaces::UsageTeams))
                    .col(ColumnDef::new(Workspaces::MaxUsers).integer())
                    .col(ColumnDef::new(Workspaces::MaxTasks).integer())
                    .col(ColumnDef::new(Workspaces::MaxTeams).integer())
                    .col(timestamp_col(Workspaces::CreatedAt))
                    .col(timestamp_col(Workspaces::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_workspaces_uuid")
                    .table(Workspaces::Table)
                    .col(Workspaces::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_workspaces_workspace_type")
                    .table(Workspaces::Table)
                    .col(Workspaces::WorkspaceType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Users::Table)
                    .col(pk_id_col(manager, Users::Id))
                    .col(uuid_col(Users::Uuid))
                    .col(fk_id_nullable_col(manager, Users::WorkspaceId))
                    // Kept in sync with team_members by the team model.
                    .col(fk_id_nullable_col(manager, Users::TeamId))
                    .col(ColumnDef::new(Users::Name).string().not_null())
                    .col(ColumnDef::new(Users::Email).string().not_null())
                    .col(
                        ColumnDef::new(Users::Role)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("member")),
                    )
                    .col(ColumnDef::new(Users::ProfilePicture).string())
                    .col(
                        ColumnDef::new(Users::IsActive)
                            .boolean()
                            .not_null()
                            .default(Expr::val(true)),
                    )
                    .col(timestamp_col(Users::CreatedAt))
                    .col(timestamp_col(Users::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_users_workspace_id")
                            .from(Users::Table, Users::WorkspaceId)
                            .to(Workspaces::Table, Workspaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_uuid")
                    .table(Users::Table)
                    .col(Users::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_email")
                    .table(Users::Table)
                    .col(Users::Email)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_users_workspace_id")
                    .table(Users::Table)
                    .col(Users::WorkspaceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Teams::Table)
                    .col(pk_id_col(manager, Teams::Id))
                    .col(uuid_col(Teams::Uuid))
                    .col(fk_id_nullable_col(manager, Teams::WorkspaceId))
                    .col(ColumnDef::new(Teams::Name).string().not_null())
                    .col(ColumnDef::new(Teams::Description).text())
                    .col(fk_id_nullable_col(manager, Teams::HrId))
                    .col(fk_id_nullable_col(manager, Teams::LeadId))
                    .col(
                        ColumnDef::new(Teams::Pinned)
                            .boolean()
                            .not_null()
                            .default(Expr::val(false)),
                    )
                    .col(fk_id_nullable_col(manager, Teams::CreatedBy))
                    .col(timestamp_col(Teams::CreatedAt))
                    .col(timestamp_col(Teams::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_teams_workspace_id")
                            .from(Teams::Table, Teams::WorkspaceId)
                            .to(Workspaces::Table, Workspaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_teams_hr_id")
                            .from(Teams::Table, Teams::HrId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_teams_lead_id")
                            .from(Teams::Table, Teams::LeadId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_teams_created_by")
                            .from(Teams::Table, Teams::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_teams_uuid")
                    .table(Teams::Table)
                    .col(Teams::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_teams_workspace_id")
                    .table(Teams::Table)
                    .col(Teams::WorkspaceId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TeamMembers::Table)
                    .col(pk_id_col(manager, TeamMembers::Id))
                    .col(fk_id_col(manager, TeamMembers::TeamId))
                    .col(fk_id_col(manager, TeamMembers::UserId))
                    .col(timestamp_col(TeamMembers::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_team_members_team_id")
                            .from(TeamMembers::Table, TeamMembers::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_team_members_user_id")
                            .from(TeamMembers::Table, TeamMembers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_team_members_team_user")
                    .table(TeamMembers::Table)
                    .col(TeamMembers::TeamId)
                    .col(TeamMembers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Tasks::Table)
                    .col(pk_id_col(manager, Tasks::Id))
                    .col(uuid_col(Tasks::Uuid))
                    .col(fk_id_nullable_col(manager, Tasks::WorkspaceId))
                    .col(fk_id_nullable_col(manager, Tasks::TeamId))
                    .col(fk_id_nullable_col(manager, Tasks::CreatedBy))
                    .col(ColumnDef::new(Tasks::Title).string().not_null())
                    .col(ColumnDef::new(Tasks::Description).text())
                    .col(
                        ColumnDef::new(Tasks::Status)
                            .string_len(32)
                            .not_null()
                            .default(Expr::val("todo")),
                    )
                    .col(
                        ColumnDef::new(Tasks::Priority)
                            .string_len(16)
                            .not_null()
                            .default(Expr::val("medium")),
                    )
                    .col(ColumnDef::new(Tasks::DueDate).timestamp())
                    .col(timestamp_col(Tasks::CreatedAt))
                    .col(timestamp_col(Tasks::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_workspace_id")
                            .from(Tasks::Table, Tasks::WorkspaceId)
                            .to(Workspaces::Table, Workspaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_team_id")
                            .from(Tasks::Table, Tasks::TeamId)
                            .to(Teams::Table, Teams::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_created_by")
                            .from(Tasks::Table, Tasks::CreatedBy)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_uuid")
                    .table(Tasks::Table)
                    .col(Tasks::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_tasks_workspace_status")
                    .table(Tasks::Table)
                    .col(Tasks::WorkspaceId)
                    .col(Tasks::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TaskAssignees::Table)
                    .col(pk_id_col(manager, TaskAssignees::Id))
                    .col(fk_id_col(manager, TaskAssignees::TaskId))
                    .col(fk_id_col(manager, TaskAssignees::UserId))
                    .col(timestamp_col(TaskAssignees::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_assignees_task_id")
                            .from(TaskAssignees::Table, TaskAssignees::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_assignees_user_id")
                            .from(TaskAssignees::Table, TaskAssignees::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_task_assignees_task_user")
                    .table(TaskAssignees::Table)
                    .col(TaskAssignees::TaskId)
                    .col(TaskAssignees::UserId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_task_assignees_user_id")
                    .table(TaskAssignees::Table)
                    .col(TaskAssignees::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(TaskComments::Table)
                    .col(pk_id_col(manager, TaskComments::Id))
                    .col(uuid_col(TaskComments::Uuid))
                    .col(fk_id_nullable_col(manager, TaskComments::WorkspaceId))
                    .col(fk_id_col(manager, TaskComments::TaskId))
                    .col(fk_id_nullable_col(manager, TaskComments::AuthorId))
                    .col(ColumnDef::new(TaskComments::Content).text().not_null())
                    .col(ColumnDef::new(TaskComments::Mentions).json().not_null())
                    .col(timestamp_col(TaskComments::CreatedAt))
                    .col(timestamp_col(TaskComments::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_comments_workspace_id")
                            .from(TaskComments::Table, TaskComments::WorkspaceId)
                            .to(Workspaces::Table, Workspaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_comments_task_id")
                            .from(TaskComments::Table, TaskComments::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_task_comments_author_id")
                            .from(TaskComments::Table, TaskComments::AuthorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_task_comments_uuid")
                    .table(TaskComments::Table)
                    .col(TaskComments::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_task_comments_task_id")
                    .table(TaskComments::Table)
                    .col(TaskComments::TaskId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(Notifications::Table)
                    .col(pk_id_col(manager, Notifications::Id))
                    .col(uuid_col(Notifications::Uuid))
                    .col(fk_id_nullable_col(manager, Notifications::WorkspaceId))
                    .col(fk_id_col(manager, Notifications::UserId))
                    .col(
                        ColumnDef::new(Notifications::NotificationType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Notifications::Title).string().not_null())
                    .col(ColumnDef::new(Notifications::Message).text().not_null())
                    .col(fk_id_nullable_col(manager, Notifications::TaskId))
                    .col(ColumnDef::new(Notifications::ReadAt).timestamp())
                    .col(timestamp_col(Notifications::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_workspace_id")
                            .from(Notifications::Table, Notifications::WorkspaceId)
                            .to(Workspaces::Table, Workspaces::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_user_id")
                            .from(Notifications::Table, Notifications::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_notifications_task_id")
                            .from(Notifications::Table, Notifications::TaskId)
                            .to(Tasks::Table, Tasks::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_notifications_uuid")
                    .table(Notifications::Table)
                    .col(Notifications::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_notifications_user_read_at")
                    .table(Notifications::Table)
                    .col(Notifications::UserId)
                    .col(Notifications::ReadAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(ChangeLogs::Table)
                    .col(pk_id_col(manager, ChangeLogs::Id))
                    .col(uuid_col(ChangeLogs::Uuid))
                    .col(fk_id_nullable_col(manager, ChangeLogs::WorkspaceId))
                    .col(ColumnDef::new(ChangeLogs::EventType).string_len(64).not_null())
                    .col(uuid_nullable_col(ChangeLogs::UserId))
                    .col(ColumnDef::new(ChangeLogs::UserName).string())
                    .col(ColumnDef::new(ChangeLogs::UserEmail).string())
                    .col(ColumnDef::new(ChangeLogs::UserRole).string_len(32))
                    .col(ColumnDef::new(ChangeLogs::TargetType).string_len(32).not_null())
                    .col(uuid_nullable_col(ChangeLogs::TargetId))
                    .col(ColumnDef::new(ChangeLogs::TargetName).string())
                    .col(ColumnDef::new(ChangeLogs::Action).string_len(32).not_null())
                    .col(ColumnDef::new(ChangeLogs::Description).text().not_null())
                    .col(ColumnDef::new(ChangeLogs::Changes).json())
                    .col(ColumnDef::new(ChangeLogs::Metadata).json())
                    .col(timestamp_col(ChangeLogs::CreatedAt))
                    // Audit entries outlive the workspace they describe.
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_change_logs_workspace_id")
                            .from(ChangeLogs::Table, ChangeLogs::WorkspaceId)
                            .to(Workspaces::Table, Workspaces::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_change_logs_uuid")
                    .table(ChangeLogs::Table)
                    .col(ChangeLogs::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_change_logs_workspace_created_at")
                    .table(ChangeLogs::Table)
                    .col(ChangeLogs::WorkspaceId)
                    .col(ChangeLogs::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_change_logs_event_type")
                    .table(ChangeLogs::Table)
                    .col(ChangeLogs::EventType)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create().if_not_exists()
                    .table(EventOutbox::Table)
                    .col(pk_id_col(manager, EventOutbox::Id))
                    .col(uuid_col(EventOutbox::Uuid))
                    .col(ColumnDef::new(EventOutbox::EventType).string_len(64).not_null())
                    .col(ColumnDef::new(EventOutbox::EntityType).string_len(64).not_null())
                    .col(ColumnDef::new(EventOutbox::EntityUuid).uuid().not_null())
                    .col(ColumnDef::new(EventOutbox::Payload).json().not_null())
                    .col(timestamp_col(EventOutbox::CreatedAt))
                    .col(ColumnDef::new(EventOutbox::PublishedAt).timestamp())
                    .col(
                        ColumnDef::new(EventOutbox::Attempts)
                            .integer()
                            .not_null()
                            .default(Expr::val(0)),
                    )
                    .col(ColumnDef::new(EventOutbox::LastError).text())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_event_outbox_uuid")
                    .table(EventOutbox::Table)
                    .col(EventOutbox::Uuid)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create().if_not_exists()
                    .name("idx_event_outbox_published_at")
                    .table(EventOutbox::Table)
                    .col(EventOutbox::PublishedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(EventOutbox::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ChangeLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaskComments::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TaskAssignees::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TeamMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Teams::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Workspaces::Table).to_owned())
            .await?;
        Ok(())
    }
}

fn pk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.not_null().auto_increment().primary_key().to_owned()
}

fn fk_id_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = fk_id_nullable_col(manager, col);
    col.not_null().to_owned()
}

fn fk_id_nullable_col<T: Iden>(manager: &SchemaManager, col: T) -> ColumnDef {
    let mut col = ColumnDef::new(col);
    match manager.get_database_backend() {
        DatabaseBackend::Sqlite => {
            col.integer();
        }
        _ => {
            col.big_integer();
        }
    }
    col.to_owned()
}

fn uuid_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().not_null().to_owned()
}

fn uuid_nullable_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col).uuid().to_owned()
}

fn counter_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .integer()
        .not_null()
        .default(Expr::val(0))
        .to_owned()
}

fn timestamp_col<T: Iden>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(Iden)]
enum Workspaces {
    Table,
    Id,
    Uuid,
    Name,
    WorkspaceType,
    OwnerId,
    IsActive,
    UsageUsers,
    UsageTasks,
    UsageTeams,
    MaxUsers,
    MaxTasks,
    MaxTeams,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Users {
    Table,
    Id,
    Uuid,
    WorkspaceId,
    TeamId,
    Name,
    Email,
    Role,
    ProfilePicture,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Teams {
    Table,
    Id,
    Uuid,
    WorkspaceId,
    Name,
    Description,
    HrId,
    LeadId,
    Pinned,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TeamMembers {
    Table,
    Id,
    TeamId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum Tasks {
    Table,
    Id,
    Uuid,
    WorkspaceId,
    TeamId,
    CreatedBy,
    Title,
    Description,
    Status,
    Priority,
    DueDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum TaskAssignees {
    Table,
    Id,
    TaskId,
    UserId,
    CreatedAt,
}

#[derive(Iden)]
enum TaskComments {
    Table,
    Id,
    Uuid,
    WorkspaceId,
    TaskId,
    AuthorId,
    Content,
    Mentions,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum Notifications {
    Table,
    Id,
    Uuid,
    WorkspaceId,
    UserId,
    NotificationType,
    Title,
    Message,
    TaskId,
    ReadAt,
    CreatedAt,
}

#[derive(Iden)]
enum ChangeLogs {
    Table,
    Id,
    Uuid,
    WorkspaceId,
    EventType,
    UserId,
    UserName,
    UserEmail,
    UserRole,
    TargetType,
    TargetId,
    TargetName,
    Action,
    Description,
    Changes,
    Metadata,
    CreatedAt,
}

#[derive(Iden)]
enum EventOutbox {
    Table,
    Id,
    Uuid,
    EventType,
    EntityType,
    EntityUuid,
    Payload,
    CreatedAt,
    PublishedAt,
    Attempts,
    LastError,
}
