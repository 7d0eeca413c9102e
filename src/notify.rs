use chrono::{DateTime, Utc};
use tracing::warn;

use crate::prelude::*;

/// Append a notification to a worker's inbox. Failures are logged and
/// swallowed; a broken inbox must never abort the flow that earned it.
pub fn user_notify(
    writer: &StoreWriter,
    recipient: UserId,
    title: &str,
    body: &str,
    now: DateTime<Utc>,
) {
    if let Err(error) =
        writer.append_notification(Some(recipient), title, body, NotificationKind::User, now)
    {
        warn!(%error, recipient, "failed to append user notification");
    }
}

/// Broadcast to the admin surface.
pub fn admin_notify(writer: &StoreWriter, title: &str, body: &str, now: DateTime<Utc>) {
    if let Err(error) = writer.append_notification(None, title, body, NotificationKind::Admin, now)
    {
        warn!(%error, "failed to append admin notification");
    }
}

/// Audit-trail entry for an administrator action.
pub fn admin_log(writer: &StoreWriter, actor: Option<UserId>, description: &str, now: DateTime<Utc>) {
    if let Err(error) = writer.append_admin_log(actor, description, now) {
        warn!(%error, "failed to append admin log");
    }
}

/// Mark one notification read, when it belongs to the given recipient.
pub fn mark_read(store: &Store, recipient: Option<UserId>, id: NotificationId) -> Result<(), Error> {
    let writer = store.start_writer()?;

    let mut notification = writer.notification(id)?.ok_or(Error::NotFound("notification"))?;

    if notification.recipient != recipient {
        return Err(Error::NotFound("notification"));
    }

    if !notification.is_read {
        notification.is_read = true;
        writer.put_notification(&notification)?;
    }

    writer.commit()?;

    Ok(())
}

/// Mark every unread notification for the recipient as read.
pub fn mark_all_read(store: &Store, recipient: Option<UserId>) -> Result<(), Error> {
    let writer = store.start_writer()?;

    let kind = match recipient {
        Some(_) => NotificationKind::User,
        None => NotificationKind::Admin,
    };

    for mut notification in writer.notifications_all()? {
        if notification.kind == kind && notification.recipient == recipient && !notification.is_read
        {
            notification.is_read = true;
            writer.put_notification(&notification)?;
        }
    }

    writer.commit()?;

    Ok(())
}
