pub mod change_log;
pub mod event_outbox;
pub mod notification;
pub mod task;
pub mod task_assignee;
pub mod task_comment;
pub mod team;
pub mod team_member;
pub mod user;
pub mod workspace;
