use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "workspaces")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub workspace_type: String,
    pub owner_id: Option<i64>,
    pub is_active: bool,
    pub usage_users: i32,
    pub usage_tasks: i32,
    pub usage_teams: i32,
    pub max_users: Option<i32>,
    pub max_tasks: Option<i32>,
    pub max_teams: Option<i32>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
