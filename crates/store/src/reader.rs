use redb::ReadTransaction;

use encore_core::{
    AdminLog, DailyResetTracker, HoldBand, HoldBandId, Invitation, Notification, NotificationKind,
    Pack, PackId, Product, ProductId, Settings, Task, TaskId, User, UserId, Wallet,
};

use crate::{
    tx_read_row, tx_scan_rows, Error, ADMIN_LOGS, CONTROL, HOLD_BANDS, INVITATIONS, NOTIFICATIONS,
    PACKS, PRODUCTS, RESET_TRACKER_KEY, SETTINGS_KEY, TASKS, TASKS_BY_USER, USERS, USERS_BY_EMAIL,
    USERS_BY_USERNAME, WALLETS,
};

/// Consistent snapshot of the store for read paths.
pub struct StoreReader {
    rx: ReadTransaction,
}

impl StoreReader {
    pub(crate) fn new(rx: ReadTransaction) -> Self {
        Self { rx }
    }

    pub fn user(&self, id: UserId) -> Result<Option<User>, Error> {
        let table = self.rx.open_table(USERS)?;
        tx_read_row(&table, id)
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let index = self.rx.open_table(USERS_BY_USERNAME)?;
        let id = index.get(username)?.map(|guard| guard.value());

        match id {
            Some(id) => self.user(id),
            None => Ok(None),
        }
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let index = self.rx.open_table(USERS_BY_EMAIL)?;
        let id = index.get(email)?.map(|guard| guard.value());

        match id {
            Some(id) => self.user(id),
            None => Ok(None),
        }
    }

    pub fn users_all(&self) -> Result<Vec<User>, Error> {
        let table = self.rx.open_table(USERS)?;
        tx_scan_rows(&table)
    }

    pub fn wallet(&self, user: UserId) -> Result<Option<Wallet>, Error> {
        let table = self.rx.open_table(WALLETS)?;
        tx_read_row(&table, user)
    }

    pub fn pack(&self, id: PackId) -> Result<Option<Pack>, Error> {
        let table = self.rx.open_table(PACKS)?;
        tx_read_row(&table, id)
    }

    pub fn packs_all(&self) -> Result<Vec<Pack>, Error> {
        let table = self.rx.open_table(PACKS)?;
        tx_scan_rows(&table)
    }

    pub fn product(&self, id: ProductId) -> Result<Option<Product>, Error> {
        let table = self.rx.open_table(PRODUCTS)?;
        tx_read_row(&table, id)
    }

    pub fn products_all(&self) -> Result<Vec<Product>, Error> {
        let table = self.rx.open_table(PRODUCTS)?;
        tx_scan_rows(&table)
    }

    pub fn hold_band(&self, id: HoldBandId) -> Result<Option<HoldBand>, Error> {
        let table = self.rx.open_table(HOLD_BANDS)?;
        tx_read_row(&table, id)
    }

    pub fn hold_bands_all(&self) -> Result<Vec<HoldBand>, Error> {
        let table = self.rx.open_table(HOLD_BANDS)?;
        tx_scan_rows(&table)
    }

    pub fn task(&self, id: TaskId) -> Result<Option<Task>, Error> {
        let table = self.rx.open_table(TASKS)?;
        tx_read_row(&table, id)
    }

    pub fn tasks_for_user(&self, user: UserId) -> Result<Vec<Task>, Error> {
        let index = self.rx.open_multimap_table(TASKS_BY_USER)?;
        let table = self.rx.open_table(TASKS)?;

        let mut out = Vec::new();

        for id in index.get(user)? {
            let id = id?.value();
            if let Some(task) = tx_read_row(&table, id)? {
                out.push(task);
            }
        }

        Ok(out)
    }

    pub fn tasks_all(&self) -> Result<Vec<Task>, Error> {
        let table = self.rx.open_table(TASKS)?;
        tx_scan_rows(&table)
    }

    pub fn invitation_for(&self, user: UserId) -> Result<Option<Invitation>, Error> {
        let table = self.rx.open_table(INVITATIONS)?;
        tx_read_row(&table, user)
    }

    /// A worker's notifications, unread first, newest first.
    pub fn notifications_for(&self, user: UserId) -> Result<Vec<Notification>, Error> {
        let table = self.rx.open_table(NOTIFICATIONS)?;
        let mut out: Vec<Notification> = tx_scan_rows(&table)?
            .into_iter()
            .filter(|n: &Notification| {
                n.kind == NotificationKind::User && n.recipient == Some(user)
            })
            .collect();

        out.sort_by(|a, b| {
            a.is_read
                .cmp(&b.is_read)
                .then(b.created_at.cmp(&a.created_at))
        });

        Ok(out)
    }

    /// Admin-broadcast notifications, unread first, newest first.
    pub fn admin_notifications(&self) -> Result<Vec<Notification>, Error> {
        let table = self.rx.open_table(NOTIFICATIONS)?;
        let mut out: Vec<Notification> = tx_scan_rows(&table)?
            .into_iter()
            .filter(|n: &Notification| n.kind == NotificationKind::Admin)
            .collect();

        out.sort_by(|a, b| {
            a.is_read
                .cmp(&b.is_read)
                .then(b.created_at.cmp(&a.created_at))
        });

        Ok(out)
    }

    pub fn admin_logs(&self) -> Result<Vec<AdminLog>, Error> {
        let table = self.rx.open_table(ADMIN_LOGS)?;
        let mut out: Vec<AdminLog> = tx_scan_rows(&table)?;
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    pub fn settings(&self) -> Result<Settings, Error> {
        let table = self.rx.open_table(CONTROL)?;
        let value = table.get(SETTINGS_KEY)?;

        match value {
            Some(guard) => crate::decode_row(guard.value()),
            None => Ok(Settings::default()),
        }
    }

    pub fn reset_tracker(&self) -> Result<DailyResetTracker, Error> {
        let table = self.rx.open_table(CONTROL)?;
        let value = table.get(RESET_TRACKER_KEY)?;

        match value {
            Some(guard) => crate::decode_row(guard.value()),
            None => Ok(DailyResetTracker::default()),
        }
    }
}
