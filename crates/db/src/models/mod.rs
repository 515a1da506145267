use std::str::FromStr;

use sea_orm::DbErr;

pub mod backfill;
pub mod change_log;
pub mod event_outbox;
pub mod ids;
pub mod notification;
pub mod task;
pub mod task_comment;
pub mod team;
pub mod user;
pub mod workspace;

/// Enum columns are stored as their wire names.
pub(crate) fn parse_enum<T: FromStr>(column: &str, raw: &str) -> Result<T, DbErr> {
    T::from_str(raw).map_err(|_| DbErr::Custom(format!("invalid {column} value '{raw}'")))
}
