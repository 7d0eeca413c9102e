use chrono::{DateTime, Utc};
use redb::{ReadableMultimapTable, ReadableTable, WriteTransaction};

use encore_core::{
    AdminLog, DailyResetTracker, HoldBand, HoldBandId, Invitation, InvitationCode, Notification,
    NotificationKind, Pack, PackId, Product, ProductId, Settings, Task, TaskId, User, UserId,
    Wallet,
};

use crate::{
    encode_row, tx_read_row, tx_scan_rows, Error, ADMIN_LOGS, CONTROL, HOLD_BANDS, INVITATIONS,
    INVITATION_CODES, NOTIFICATIONS, PACKS, PRODUCTS, RATING_CODES, RESET_TRACKER_KEY, SEQUENCES,
    SETTINGS_KEY, TASKS, TASKS_BY_USER, USERS, USERS_BY_EMAIL, USERS_BY_USERNAME, WALLETS,
};

/// One read-write unit of work. Nothing is visible to readers until
/// `commit`; dropping the writer rolls everything back.
pub struct StoreWriter {
    wx: WriteTransaction,
}

impl StoreWriter {
    pub(crate) fn new(wx: WriteTransaction) -> Self {
        Self { wx }
    }

    pub fn commit(self) -> Result<(), Error> {
        self.wx.commit()?;
        Ok(())
    }

    /// Allocate the next id in the named sequence.
    pub fn next_id(&self, sequence: &str) -> Result<u64, Error> {
        let mut table = self.wx.open_table(SEQUENCES)?;

        let next = table.get(sequence)?.map(|guard| guard.value()).unwrap_or(0) + 1;
        table.insert(sequence, next)?;

        Ok(next)
    }

    // users

    /// Insert a fresh user, enforcing username and email uniqueness.
    pub fn create_user(&self, user: &User) -> Result<(), Error> {
        {
            let mut by_username = self.wx.open_table(USERS_BY_USERNAME)?;
            if by_username.get(user.username.as_str())?.is_some() {
                return Err(Error::Duplicate("username"));
            }
            by_username.insert(user.username.as_str(), user.id)?;
        }

        {
            let mut by_email = self.wx.open_table(USERS_BY_EMAIL)?;
            if by_email.get(user.email.as_str())?.is_some() {
                return Err(Error::Duplicate("email"));
            }
            by_email.insert(user.email.as_str(), user.id)?;
        }

        self.put_user(user)
    }

    pub fn put_user(&self, user: &User) -> Result<(), Error> {
        let bytes = encode_row(user)?;
        let mut table = self.wx.open_table(USERS)?;
        table.insert(user.id, bytes.as_slice())?;
        Ok(())
    }

    pub fn user(&self, id: UserId) -> Result<Option<User>, Error> {
        let table = self.wx.open_table(USERS)?;
        tx_read_row(&table, id)
    }

    pub fn user_by_username(&self, username: &str) -> Result<Option<User>, Error> {
        let index = self.wx.open_table(USERS_BY_USERNAME)?;
        let id = index.get(username)?.map(|guard| guard.value());
        drop(index);

        match id {
            Some(id) => self.user(id),
            None => Ok(None),
        }
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>, Error> {
        let index = self.wx.open_table(USERS_BY_EMAIL)?;
        let id = index.get(email)?.map(|guard| guard.value());
        drop(index);

        match id {
            Some(id) => self.user(id),
            None => Ok(None),
        }
    }

    pub fn user_by_referral_code(&self, code: &str) -> Result<Option<User>, Error> {
        // referral codes are sparse enough that a scan beats another index
        let table = self.wx.open_table(USERS)?;
        let users: Vec<User> = tx_scan_rows(&table)?;
        Ok(users.into_iter().find(|u| u.referral_code == code))
    }

    pub fn users_all(&self) -> Result<Vec<User>, Error> {
        let table = self.wx.open_table(USERS)?;
        tx_scan_rows(&table)
    }

    // wallets

    pub fn wallet(&self, user: UserId) -> Result<Option<Wallet>, Error> {
        let table = self.wx.open_table(WALLETS)?;
        tx_read_row(&table, user)
    }

    pub fn put_wallet(&self, wallet: &Wallet) -> Result<(), Error> {
        let bytes = encode_row(wallet)?;
        let mut table = self.wx.open_table(WALLETS)?;
        table.insert(wallet.user, bytes.as_slice())?;
        Ok(())
    }

    pub fn wallets_all(&self) -> Result<Vec<Wallet>, Error> {
        let table = self.wx.open_table(WALLETS)?;
        tx_scan_rows(&table)
    }

    // packs

    pub fn pack(&self, id: PackId) -> Result<Option<Pack>, Error> {
        let table = self.wx.open_table(PACKS)?;
        tx_read_row(&table, id)
    }

    pub fn put_pack(&self, pack: &Pack) -> Result<(), Error> {
        let bytes = encode_row(pack)?;
        let mut table = self.wx.open_table(PACKS)?;
        table.insert(pack.id, bytes.as_slice())?;
        Ok(())
    }

    pub fn delete_pack(&self, id: PackId) -> Result<(), Error> {
        let mut table = self.wx.open_table(PACKS)?;
        table.remove(id)?;
        Ok(())
    }

    pub fn packs_all(&self) -> Result<Vec<Pack>, Error> {
        let table = self.wx.open_table(PACKS)?;
        tx_scan_rows(&table)
    }

    // products

    pub fn product(&self, id: ProductId) -> Result<Option<Product>, Error> {
        let table = self.wx.open_table(PRODUCTS)?;
        tx_read_row(&table, id)
    }

    pub fn put_product(&self, product: &Product) -> Result<(), Error> {
        let bytes = encode_row(product)?;
        let mut table = self.wx.open_table(PRODUCTS)?;
        table.insert(product.id, bytes.as_slice())?;
        Ok(())
    }

    pub fn delete_product(&self, id: ProductId) -> Result<(), Error> {
        let mut table = self.wx.open_table(PRODUCTS)?;
        table.remove(id)?;
        Ok(())
    }

    pub fn products_all(&self) -> Result<Vec<Product>, Error> {
        let table = self.wx.open_table(PRODUCTS)?;
        tx_scan_rows(&table)
    }

    // hold bands

    pub fn hold_band(&self, id: HoldBandId) -> Result<Option<HoldBand>, Error> {
        let table = self.wx.open_table(HOLD_BANDS)?;
        tx_read_row(&table, id)
    }

    pub fn put_hold_band(&self, band: &HoldBand) -> Result<(), Error> {
        let bytes = encode_row(band)?;
        let mut table = self.wx.open_table(HOLD_BANDS)?;
        table.insert(band.id, bytes.as_slice())?;
        Ok(())
    }

    pub fn delete_hold_band(&self, id: HoldBandId) -> Result<(), Error> {
        let mut table = self.wx.open_table(HOLD_BANDS)?;
        table.remove(id)?;
        Ok(())
    }

    pub fn hold_bands_all(&self) -> Result<Vec<HoldBand>, Error> {
        let table = self.wx.open_table(HOLD_BANDS)?;
        tx_scan_rows(&table)
    }

    // tasks

    pub fn task(&self, id: TaskId) -> Result<Option<Task>, Error> {
        let table = self.wx.open_table(TASKS)?;
        tx_read_row(&table, id)
    }

    pub fn put_task(&self, task: &Task) -> Result<(), Error> {
        let bytes = encode_row(task)?;

        {
            let mut table = self.wx.open_table(TASKS)?;
            table.insert(task.id, bytes.as_slice())?;
        }

        let mut index = self.wx.open_multimap_table(TASKS_BY_USER)?;
        index.insert(task.user, task.id)?;

        Ok(())
    }

    pub fn delete_task(&self, task: &Task) -> Result<(), Error> {
        {
            let mut table = self.wx.open_table(TASKS)?;
            table.remove(task.id)?;
        }

        let mut index = self.wx.open_multimap_table(TASKS_BY_USER)?;
        index.remove(task.user, task.id)?;

        Ok(())
    }

    /// All tasks ever assigned to a user, in creation order.
    pub fn tasks_for_user(&self, user: UserId) -> Result<Vec<Task>, Error> {
        let index = self.wx.open_multimap_table(TASKS_BY_USER)?;
        let table = self.wx.open_table(TASKS)?;

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
        let table = self.wx.open_table(TASKS)?;
        tx_scan_rows(&table)
    }

    // invitations

    pub fn invitation_for(&self, user: UserId) -> Result<Option<Invitation>, Error> {
        let table = self.wx.open_table(INVITATIONS)?;
        tx_read_row(&table, user)
    }

    pub fn put_invitation(&self, invitation: &Invitation) -> Result<(), Error> {
        let bytes = encode_row(invitation)?;
        let mut table = self.wx.open_table(INVITATIONS)?;
        table.insert(invitation.user, bytes.as_slice())?;
        Ok(())
    }

    pub fn invitation_code(&self, code: &str) -> Result<Option<InvitationCode>, Error> {
        let table = self.wx.open_table(INVITATION_CODES)?;
        let value = table.get(code)?;
        value
            .map(|guard| crate::decode_row(guard.value()))
            .transpose()
    }

    pub fn put_invitation_code(&self, code: &InvitationCode) -> Result<(), Error> {
        let bytes = encode_row(code)?;
        let mut table = self.wx.open_table(INVITATION_CODES)?;
        table.insert(code.code.as_str(), bytes.as_slice())?;
        Ok(())
    }

    // rating codes

    /// Reserve a review code; `false` when it is already in use.
    pub fn claim_rating_code(&self, code: &str, owner: u64) -> Result<bool, Error> {
        let mut table = self.wx.open_table(RATING_CODES)?;

        if table.get(code)?.is_some() {
            return Ok(false);
        }

        table.insert(code, owner)?;

        Ok(true)
    }

    // notifications & audit log

    pub fn append_notification(
        &self,
        recipient: Option<UserId>,
        title: &str,
        body: &str,
        kind: NotificationKind,
        now: DateTime<Utc>,
    ) -> Result<Notification, Error> {
        let notification = Notification {
            id: self.next_id("notifications")?,
            recipient,
            title: title.to_string(),
            body: body.to_string(),
            is_read: false,
            kind,
            created_at: now,
        };

        self.put_notification(&notification)?;

        Ok(notification)
    }

    pub fn put_notification(&self, notification: &Notification) -> Result<(), Error> {
        let bytes = encode_row(notification)?;
        let mut table = self.wx.open_table(NOTIFICATIONS)?;
        table.insert(notification.id, bytes.as_slice())?;
        Ok(())
    }

    pub fn notification(&self, id: u64) -> Result<Option<Notification>, Error> {
        let table = self.wx.open_table(NOTIFICATIONS)?;
        tx_read_row(&table, id)
    }

    pub fn notifications_all(&self) -> Result<Vec<Notification>, Error> {
        let table = self.wx.open_table(NOTIFICATIONS)?;
        tx_scan_rows(&table)
    }

    pub fn append_admin_log(
        &self,
        actor: Option<UserId>,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminLog, Error> {
        let entry = AdminLog {
            id: self.next_id("admin_logs")?,
            actor,
            description: description.to_string(),
            created_at: now,
        };

        let bytes = encode_row(&entry)?;
        let mut table = self.wx.open_table(ADMIN_LOGS)?;
        table.insert(entry.id, bytes.as_slice())?;

        Ok(entry)
    }

    // control singletons

    pub fn settings(&self) -> Result<Settings, Error> {
        let table = self.wx.open_table(CONTROL)?;
        let value = table.get(SETTINGS_KEY)?;

        match value {
            Some(guard) => crate::decode_row(guard.value()),
            None => Ok(Settings::default()),
        }
    }

    pub fn put_settings(&self, settings: &Settings) -> Result<(), Error> {
        let bytes = encode_row(settings)?;
        let mut table = self.wx.open_table(CONTROL)?;
        table.insert(SETTINGS_KEY, bytes.as_slice())?;
        Ok(())
    }

    pub fn reset_tracker(&self) -> Result<DailyResetTracker, Error> {
        let table = self.wx.open_table(CONTROL)?;
        let value = table.get(RESET_TRACKER_KEY)?;

        match value {
            Some(guard) => crate::decode_row(guard.value()),
            None => Ok(DailyResetTracker::default()),
        }
    }

    pub fn put_reset_tracker(&self, tracker: &DailyResetTracker) -> Result<(), Error> {
        let bytes = encode_row(tracker)?;
        let mut table = self.wx.open_table(CONTROL)?;
        table.insert(RESET_TRACKER_KEY, bytes.as_slice())?;
        Ok(())
    }
}
