/// Persistence layer
///
/// SQLite tables behind small typed stores:
/// - LogStore: generic event/audit log
/// - TaskStore: agent task lifecycle rows
/// - NotificationStore: escalation alerts
/// Workflow definitions live in `workflow::storage`.

pub mod database;
pub mod logs;
pub mod notifications;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_utils;

pub use logs::{LogEntry, LogRecord, LogStore, Visibility};
pub use notifications::{NewNotification, Notification, NotificationStore};
pub use tasks::{TaskRecord, TaskStore};
