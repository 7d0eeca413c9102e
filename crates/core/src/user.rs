use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Amount, UserId};

/// A worker (or staff) account.
///
/// Daily counters live here rather than on the wallet: they are reset by the
/// scheduler, while the wallet only ever moves through credit/debit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub phone: String,

    /// Argon2 PHC string of the login password.
    pub password_hash: String,
    /// Argon2 PHC string of the 4-character transactional password.
    pub transactional_password_hash: String,

    /// Shareable code other workers sign up with.
    pub referral_code: String,

    pub submissions_today: u32,
    pub sets_today: u32,
    pub today_profit: Amount,
    pub current_referral_bonus: Amount,

    pub is_active: bool,
    pub is_staff: bool,
    pub is_reg_bonus_credited: bool,
    pub is_min_balance_waived: bool,
    pub reg_bonus_amount: Amount,

    pub last_connection: Option<DateTime<Utc>>,

    /// Rotated on every worker-surface login; embedded in tokens as `sid`.
    pub session_id_user: Option<Uuid>,
    /// Rotated on every admin-surface login.
    pub session_id_admin: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: UserId,
        username: String,
        email: String,
        phone: String,
        password_hash: String,
        transactional_password_hash: String,
        referral_code: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            username,
            email,
            phone,
            password_hash,
            transactional_password_hash,
            referral_code,
            submissions_today: 0,
            sets_today: 0,
            today_profit: Decimal::ZERO,
            current_referral_bonus: Decimal::ZERO,
            is_active: true,
            is_staff: false,
            is_reg_bonus_credited: false,
            is_min_balance_waived: false,
            reg_bonus_amount: Decimal::ZERO,
            last_connection: None,
            session_id_user: None,
            session_id_admin: None,
            created_at: now,
        }
    }
}
