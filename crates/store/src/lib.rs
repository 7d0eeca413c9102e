//! Embedded persistent store for the encore platform.
//!
//! Every entity lives in its own redb table keyed by id, with the few
//! secondary indexes the engine queries by. Values are bincode-encoded
//! through serde. All mutations run inside a single write transaction;
//! redb serializes writers, which is what gives wallet and counter updates
//! their linearizable per-user history.

use std::{path::Path, sync::Arc};

use redb::{Database, MultimapTableDefinition, ReadableDatabase, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

mod reader;
mod writer;

pub use reader::StoreReader;
pub use writer::StoreWriter;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    DatabaseError(#[from] ::redb::DatabaseError),

    #[error(transparent)]
    TransactionError(Box<::redb::TransactionError>),

    #[error(transparent)]
    CommitError(#[from] ::redb::CommitError),

    #[error(transparent)]
    TableError(#[from] ::redb::TableError),

    #[error(transparent)]
    StorageError(#[from] ::redb::StorageError),

    #[error("encoding error: {0}")]
    EncodingError(#[from] bincode::Error),

    #[error("duplicate {0}")]
    Duplicate(&'static str),
}

impl From<::redb::TransactionError> for Error {
    fn from(error: ::redb::TransactionError) -> Self {
        Error::TransactionError(Box::new(error))
    }
}

pub(crate) type RowTable = TableDefinition<'static, u64, &'static [u8]>;
pub(crate) type NamedRowTable = TableDefinition<'static, &'static str, &'static [u8]>;
pub(crate) type IndexTable = TableDefinition<'static, &'static str, u64>;

pub(crate) const USERS: RowTable = TableDefinition::new("users");
pub(crate) const USERS_BY_USERNAME: IndexTable = TableDefinition::new("users_by_username");
pub(crate) const USERS_BY_EMAIL: IndexTable = TableDefinition::new("users_by_email");
pub(crate) const WALLETS: RowTable = TableDefinition::new("wallets");
pub(crate) const PACKS: RowTable = TableDefinition::new("packs");
pub(crate) const PRODUCTS: RowTable = TableDefinition::new("products");
pub(crate) const HOLD_BANDS: RowTable = TableDefinition::new("hold_bands");
pub(crate) const TASKS: RowTable = TableDefinition::new("tasks");
pub(crate) const TASKS_BY_USER: MultimapTableDefinition<'static, u64, u64> =
    MultimapTableDefinition::new("tasks_by_user");
pub(crate) const INVITATIONS: RowTable = TableDefinition::new("invitations");
pub(crate) const INVITATION_CODES: NamedRowTable = TableDefinition::new("invitation_codes");
pub(crate) const RATING_CODES: IndexTable = TableDefinition::new("rating_codes");
pub(crate) const NOTIFICATIONS: RowTable = TableDefinition::new("notifications");
pub(crate) const ADMIN_LOGS: RowTable = TableDefinition::new("admin_logs");
pub(crate) const CONTROL: NamedRowTable = TableDefinition::new("control");
pub(crate) const SEQUENCES: IndexTable = TableDefinition::new("sequences");

pub(crate) const SETTINGS_KEY: &str = "settings";
pub(crate) const RESET_TRACKER_KEY: &str = "reset_tracker";

const DEFAULT_CACHE_SIZE_MB: usize = 100;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StorageConfig {
    /// Directory where to find storage. If undefined, ephemeral storage
    /// will be used.
    pub path: Option<std::path::PathBuf>,

    /// Size (in Mb) of memory allocated for store caching.
    pub cache_size: Option<usize>,
}

impl StorageConfig {
    pub fn is_ephemeral(&self) -> bool {
        self.path.is_none()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: Some(std::path::PathBuf::from("data")),
            cache_size: None,
        }
    }
}

#[derive(Clone)]
pub struct Store {
    db: Arc<Database>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>, cache_size: Option<usize>) -> Result<Self, Error> {
        let db = ::redb::Database::builder()
            .set_repair_callback(|x| warn!(progress = x.progress() * 100f64, "store is repairing"))
            .set_cache_size(1024 * 1024 * cache_size.unwrap_or(DEFAULT_CACHE_SIZE_MB))
            .create(path)?;

        let store = Self { db: db.into() };
        store.initialize_schema()?;

        Ok(store)
    }

    pub fn in_memory() -> Result<Self, Error> {
        let db = ::redb::Database::builder()
            .create_with_backend(::redb::backends::InMemoryBackend::new())?;

        let store = Self { db: db.into() };
        store.initialize_schema()?;

        Ok(store)
    }

    fn initialize_schema(&self) -> Result<(), Error> {
        let wx = self.db.begin_write()?;

        let _ = wx.open_table(USERS)?;
        let _ = wx.open_table(USERS_BY_USERNAME)?;
        let _ = wx.open_table(USERS_BY_EMAIL)?;
        let _ = wx.open_table(WALLETS)?;
        let _ = wx.open_table(PACKS)?;
        let _ = wx.open_table(PRODUCTS)?;
        let _ = wx.open_table(HOLD_BANDS)?;
        let _ = wx.open_table(TASKS)?;
        let _ = wx.open_multimap_table(TASKS_BY_USER)?;
        let _ = wx.open_table(INVITATIONS)?;
        let _ = wx.open_table(INVITATION_CODES)?;
        let _ = wx.open_table(RATING_CODES)?;
        let _ = wx.open_table(NOTIFICATIONS)?;
        let _ = wx.open_table(ADMIN_LOGS)?;
        let _ = wx.open_table(CONTROL)?;
        let _ = wx.open_table(SEQUENCES)?;

        wx.commit()?;

        Ok(())
    }

    /// Start a read-write transaction. Writers are serialized by the
    /// database; hold them only for the duration of one logical operation.
    pub fn start_writer(&self) -> Result<StoreWriter, Error> {
        let wx = self.db.begin_write()?;
        Ok(StoreWriter::new(wx))
    }

    /// Snapshot view for read paths.
    pub fn reader(&self) -> Result<StoreReader, Error> {
        let rx = self.db.begin_read()?;
        Ok(StoreReader::new(rx))
    }
}

pub(crate) fn encode_row<T: Serialize>(value: &T) -> Result<Vec<u8>, Error> {
    Ok(bincode::serialize(value)?)
}

pub(crate) fn decode_row<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    Ok(bincode::deserialize(bytes)?)
}

pub(crate) fn tx_read_row<T: DeserializeOwned>(
    table: &impl redb::ReadableTable<u64, &'static [u8]>,
    id: u64,
) -> Result<Option<T>, Error> {
    let value = table.get(id)?;
    value.map(|guard| decode_row(guard.value())).transpose()
}

pub(crate) fn tx_scan_rows<T: DeserializeOwned>(
    table: &impl redb::ReadableTable<u64, &'static [u8]>,
) -> Result<Vec<T>, Error> {
    let mut out = Vec::new();

    for entry in table.iter()? {
        let (_, value) = entry?;
        out.push(decode_row(value.value())?);
    }

    Ok(out)
}


#[cfg(test)]
mod tests {
    use chrono::Utc;
    use encore_core::{NotificationKind, User, Wallet};
    use rust_decimal::dec;

    use super::*;

    fn sample_user(id: u64, username: &str) -> User {
        User::new(
            id,
            username.into(),
            format!("{username}@example.com"),
            "+1000000".into(),
            "hash".into(),
            "hash".into(),
            format!("REF{id:05}"),
            Utc::now(),
        )
    }

    #[test]
    fn user_round_trip_with_indexes() {
        let store = Store::in_memory().unwrap();

        let writer = store.start_writer().unwrap();
        let id = writer.next_id("users").unwrap();
        writer.create_user(&sample_user(id, "alice")).unwrap();
        writer.commit().unwrap();

        let reader = store.reader().unwrap();
        let by_id = reader.user(id).unwrap().unwrap();
        let by_name = reader.user_by_username("alice").unwrap().unwrap();
        let by_email = reader.user_by_email("alice@example.com").unwrap().unwrap();

        assert_eq!(by_id.id, id);
        assert_eq!(by_name.id, id);
        assert_eq!(by_email.id, id);
        assert!(reader.user_by_username("bob").unwrap().is_none());
    }

    #[test]
    fn duplicate_username_rejected() {
        let store = Store::in_memory().unwrap();

        let writer = store.start_writer().unwrap();
        writer.create_user(&sample_user(1, "alice")).unwrap();

        let mut dupe = sample_user(2, "alice");
        dupe.email = "other@example.com".into();
        assert!(matches!(
            writer.create_user(&dupe),
            Err(Error::Duplicate("username"))
        ));
    }

    #[test]
    fn uncommitted_writes_are_invisible() {
        let store = Store::in_memory().unwrap();

        let writer = store.start_writer().unwrap();
        writer.create_user(&sample_user(1, "alice")).unwrap();
        drop(writer);

        let reader = store.reader().unwrap();
        assert!(reader.user(1).unwrap().is_none());
    }

    #[test]
    fn wallet_decimal_round_trip() {
        let store = Store::in_memory().unwrap();

        let writer = store.start_writer().unwrap();
        let mut wallet = Wallet::new(1, Utc::now());
        wallet.balance = dec!(-50.25);
        wallet.on_hold = dec!(150.25);
        writer.put_wallet(&wallet).unwrap();
        writer.commit().unwrap();

        let loaded = store.reader().unwrap().wallet(1).unwrap().unwrap();
        assert_eq!(loaded.balance, dec!(-50.25));
        assert_eq!(loaded.on_hold, dec!(150.25));
    }

    #[test]
    fn sequences_are_monotonic() {
        let store = Store::in_memory().unwrap();

        let writer = store.start_writer().unwrap();
        assert_eq!(writer.next_id("tasks").unwrap(), 1);
        assert_eq!(writer.next_id("tasks").unwrap(), 2);
        assert_eq!(writer.next_id("users").unwrap(), 1);
        writer.commit().unwrap();

        let writer = store.start_writer().unwrap();
        assert_eq!(writer.next_id("tasks").unwrap(), 3);
    }

    #[test]
    fn rating_codes_claimed_once() {
        let store = Store::in_memory().unwrap();

        let writer = store.start_writer().unwrap();
        assert!(writer.claim_rating_code("12345678", 1).unwrap());
        assert!(!writer.claim_rating_code("12345678", 2).unwrap());
    }

    #[test]
    fn notifications_sort_unread_first() {
        let store = Store::in_memory().unwrap();
        let now = Utc::now();

        let writer = store.start_writer().unwrap();
        let first = writer
            .append_notification(Some(1), "a", "body", NotificationKind::User, now)
            .unwrap();
        writer
            .append_notification(Some(1), "b", "body", NotificationKind::User, now)
            .unwrap();
        writer
            .append_notification(None, "c", "body", NotificationKind::Admin, now)
            .unwrap();

        let mut read = first.clone();
        read.is_read = true;
        writer.put_notification(&read).unwrap();
        writer.commit().unwrap();

        let reader = store.reader().unwrap();
        let inbox = reader.notifications_for(1).unwrap();
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox[0].title, "b");
        assert!(inbox[1].is_read);

        let admin = reader.admin_notifications().unwrap();
        assert_eq!(admin.len(), 1);
        assert_eq!(admin[0].title, "c");
    }

    #[test]
    fn tasks_index_follows_deletes() {
        let store = Store::in_memory().unwrap();
        let now = Utc::now();

        let writer = store.start_writer().unwrap();
        let task = encore_core::Task {
            id: 1,
            user: 9,
            products: vec![4],
            amount: dec!(80),
            commission: dec!(0.40),
            commission_percentage: dec!(0.5),
            rating_no: "00000001".into(),
            game_number: 1,
            special_product: false,
            played: false,
            pending: true,
            is_active: true,
            on_hold: None,
            rating_score: None,
            comment: None,
            created_at: now,
            updated_at: now,
        };
        writer.put_task(&task).unwrap();
        assert_eq!(writer.tasks_for_user(9).unwrap().len(), 1);

        writer.delete_task(&task).unwrap();
        assert!(writer.tasks_for_user(9).unwrap().is_empty());
    }

    #[test]
    fn reopened_store_keeps_committed_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encore.redb");

        {
            let store = Store::open(&path, None).unwrap();
            let writer = store.start_writer().unwrap();
            writer.create_user(&sample_user(1, "alice")).unwrap();
            writer.commit().unwrap();
        }

        let store = Store::open(&path, None).unwrap();
        let reader = store.reader().unwrap();
        assert_eq!(reader.user(1).unwrap().unwrap().username, "alice");
    }
}

