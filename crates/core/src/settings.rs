use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Site-wide knobs. Stored as a singleton row and loaded per transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Referral bonus as a percentage of earned commission.
    pub percentage_of_sponsors: Amount,
    /// Fallback registration bonus.
    pub bonus_when_registering: Amount,
    /// Fallback used when the pack does not define a minimum.
    pub minimum_balance_for_submissions: Amount,
    pub service_availability_start_time: String,
    pub service_availability_end_time: String,
    /// IANA timezone name governing the daily reset boundary.
    pub timezone: String,
    pub token_validity_period_hours: u64,
    pub customer_service_link: String,
    pub telegram_link: String,
    pub trc20_address: String,
    pub erc20_address: String,
    pub video: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            percentage_of_sponsors: Decimal::from(20),
            bonus_when_registering: Decimal::from(10),
            minimum_balance_for_submissions: Decimal::from(100),
            service_availability_start_time: "00:00".into(),
            service_availability_end_time: "23:59".into(),
            timezone: "US/Eastern".into(),
            token_validity_period_hours: 24,
            customer_service_link: String::new(),
            telegram_link: String::new(),
            trc20_address: String::new(),
            erc20_address: String::new(),
            video: String::new(),
        }
    }
}

/// Singleton row serializing the once-per-day reset pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyResetTracker {
    pub last_reset_time: DateTime<Utc>,
    pub reset_interval_hours: u32,
}

impl Default for DailyResetTracker {
    fn default() -> Self {
        Self {
            last_reset_time: Utc.timestamp_opt(0, 0).unwrap(),
            reset_interval_hours: 24,
        }
    }
}
