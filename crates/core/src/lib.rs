//! Domain types and machinery that are common to all encore crates.
//!
//! Glossary:
//!  - `task`: a unit of review work presented to a worker, referencing one or
//!    more albums from the catalog.
//!  - `rank`: the 1-based position of a task within a worker's daily
//!    sequence (`game_number` on the wire).
//!  - `set`: a full batch of `daily_missions` tasks; a pack allows
//!    `number_of_set` batches per day.
//!  - `special task`: an admin-injected task whose amount exceeds the
//!    worker's balance, locking funds via `on_hold`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod auth;
pub mod catalog;
pub mod clock;
pub mod money;
pub mod notification;
pub mod pack;
pub mod settings;
pub mod task;
pub mod user;
pub mod wallet;

pub type UserId = u64;
pub type PackId = u64;
pub type ProductId = u64;
pub type HoldBandId = u64;
pub type TaskId = u64;
pub type NotificationId = u64;
pub type AdminLogId = u64;

pub use auth::*;
pub use catalog::*;
pub use clock::*;
pub use money::*;
pub use notification::*;
pub use pack::*;
pub use settings::*;
pub use task::*;
pub use user::*;
pub use wallet::*;

/// Links a signed-up worker to the worker whose referral code they used.
///
/// Keyed by the invited user; a user has at most one referrer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    pub user: UserId,
    pub referrer: UserId,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One-shot signup voucher used when no referrer is known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvitationCode {
    pub code: String,
    pub is_used: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("amount must not be negative")]
    NegativeAmount,

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("debit attempted while funds are still reserved on hold")]
    HoldStillReserved,

    #[error("invalid release amount")]
    InvalidRelease,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token missing or malformed")]
    Malformed,

    #[error("token expired")]
    Expired,

    #[error("invalid_session")]
    InvalidSession,

    #[error("token kind not valid for this operation")]
    WrongKind,

    #[error("credentials rejected")]
    BadCredentials,

    #[error("account is inactive")]
    Inactive,

    #[error("staff privileges required")]
    NotStaff,

    #[error("password hashing failed")]
    Hashing,
}
