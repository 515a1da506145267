pub mod activity;
pub mod backfill;
pub mod bulk_import;
pub mod changelog;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod notifications;
pub mod tasks;
pub mod teams;
pub mod users;
pub mod workspaces;

#[cfg(test)]
pub(crate) mod test_utils;
