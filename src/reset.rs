//! Daily counter reset.
//!
//! Once per local day (most recent 00:00 in the configured timezone) every
//! worker's daily counters go back to zero. Workers holding a reserved
//! special task keep `submissions_today` so they resume at the same rank
//! the next day. The pass runs from a background loop and opportunistically
//! on request arrival; the tracker row serializes concurrent attempts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::prelude::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Seconds between background evaluations of the reset condition.
    pub check_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            check_interval_secs: 60,
        }
    }
}

#[derive(Clone)]
pub struct ResetScheduler {
    store: Store,
}

impl ResetScheduler {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Run a reset pass when one is due. Returns whether a pass ran.
    ///
    /// The check and the pass share one write transaction, so two
    /// concurrent callers cannot both observe a stale tracker.
    pub fn maybe_reset(&self, now: DateTime<Utc>) -> Result<bool, Error> {
        // cheap read-only probe first: request paths call this on every
        // arrival and must not contend on the writer
        {
            let reader = self.store.reader()?;
            let settings = reader.settings()?;
            let clock = Clock::from_name_or_default(&settings.timezone);

            if reader.reset_tracker()?.last_reset_time >= clock.local_midnight_utc(now) {
                return Ok(false);
            }
        }

        let writer = self.store.start_writer()?;

        let settings = writer.settings()?;
        let clock = Clock::from_name_or_default(&settings.timezone);
        let midnight = clock.local_midnight_utc(now);

        // re-check under the write transaction: another caller may have
        // completed the pass in between
        let mut tracker = writer.reset_tracker()?;

        if tracker.last_reset_time >= midnight {
            return Ok(false);
        }

        perform_reset(&writer)?;

        tracker.last_reset_time = midnight;
        writer.put_reset_tracker(&tracker)?;

        writer.commit()?;

        info!(%midnight, "daily counters reset");

        Ok(true)
    }

    /// Background loop: evaluate on a fixed cadence until cancelled.
    /// Failures log and retry on the next tick; they never tear the
    /// process down.
    pub async fn run(self, config: Config, cancel: CancellationToken) {
        let interval = std::time::Duration::from_secs(config.check_interval_secs.max(1));

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {
                    if let Err(err) = self.maybe_reset(Utc::now()) {
                        error!(%err, "daily reset pass failed");
                    }
                }
            }
        }
    }
}

fn perform_reset(writer: &StoreWriter) -> Result<(), Error> {
    let tasks = writer.tasks_all()?;

    for mut user in writer.users_all()? {
        let holds_reserved_special = tasks.iter().any(|t| {
            t.user == user.id && t.special_product && t.pending && !t.played && t.is_active
        });

        if holds_reserved_special {
            // keep submissions_today: the worker resumes at the same rank
            user.sets_today = 0;
        } else {
            user.submissions_today = 0;
            user.sets_today = 0;
            user.today_profit = Decimal::ZERO;
        }

        writer.put_user(&user)?;

        if let Some(mut wallet) = writer.wallet(user.id)? {
            wallet.salary = Decimal::ZERO;
            writer.put_wallet(&wallet)?;
        }
    }

    Ok(())
}
