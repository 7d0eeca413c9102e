use chrono::{DateTime, Duration, LocalResult, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Timezone-aware day boundary math for the reset scheduler and the
/// played-today queries.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    tz: Tz,
}

impl Clock {
    pub const DEFAULT_TIMEZONE: &'static str = "US/Eastern";

    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Parse an IANA timezone name; `None` when unknown.
    pub fn from_name(name: &str) -> Option<Self> {
        name.parse::<Tz>().ok().map(Self::new)
    }

    /// Falls back to the default zone when the configured name is invalid.
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name)
            .or_else(|| Self::from_name(Self::DEFAULT_TIMEZONE))
            .expect("default timezone is valid")
    }

    pub fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    /// The most recent local 00:00, expressed in UTC.
    pub fn local_midnight_utc(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let local_day = now.with_timezone(&self.tz).date_naive();
        let naive = local_day.and_time(NaiveTime::MIN);

        match self.tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
            // midnight can be skipped by a DST jump; take the first valid
            // instant after it
            LocalResult::None => self
                .tz
                .from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(now),
        }
    }

    /// `[start, end)` of the local day containing `now`, in UTC.
    pub fn day_bounds_utc(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = self.local_midnight_utc(now);
        let end = self.local_midnight_utc(now + Duration::days(1));
        (start, end)
    }

    /// Whether `at` falls within the local day containing `now`.
    pub fn is_same_local_day(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let (start, end) = self.day_bounds_utc(now);
        at >= start && at < end
    }
}
