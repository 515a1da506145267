pub mod changelog;
pub mod events;
pub mod health;
pub mod me;
pub mod notifications;
pub mod tasks;
pub mod teams;
pub mod users;
pub mod workspaces;
