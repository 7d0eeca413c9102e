use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AdminLogId, NotificationId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    User,
    Admin,
}

/// Append-only message to a worker (`recipient = Some`) or to the admin
/// surface at large (`recipient = None`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: Option<UserId>,
    pub title: String,
    pub body: String,
    pub is_read: bool,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit trail of administrator actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminLog {
    pub id: AdminLogId,
    /// Absent for system-originated entries.
    pub actor: Option<UserId>,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
