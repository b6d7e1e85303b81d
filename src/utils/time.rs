use crate::utils::error::{Result, SyncError};
use chrono::{DateTime, SecondsFormat, TimeDelta, TimeZone, Utc};

/// Upper bound for `fetch.lookback_hours` (ten years).
pub const MAX_LOOKBACK_HOURS: u64 = 24 * 366 * 10;

/// Converts a Bullhorn epoch-millisecond timestamp into an ISO-8601 string
/// with an explicit `+00:00` offset.
///
/// Zero and absent values yield `None`; Bullhorn reports unset dates as `0`
/// or `null`, neither of which means 1970.
pub fn epoch_millis_to_iso(millis: Option<i64>) -> Option<String> {
    let millis = millis.filter(|m| *m != 0)?;
    let dt = Utc.timestamp_millis_opt(millis).single()?;
    Some(dt.to_rfc3339_opts(SecondsFormat::AutoSi, false))
}

pub fn iso_to_epoch_millis(iso: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(iso)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
}

/// Lower bound of a "last N hours" window, fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    since_millis: i64,
}

impl TimeWindow {
    pub fn last_hours(hours: u64, now: DateTime<Utc>) -> Result<Self> {
        let since = i64::try_from(hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .and_then(|lookback| now.checked_sub_signed(lookback))
            .ok_or_else(|| SyncError::InvalidConfigValueError {
                field: "fetch.lookback_hours".to_string(),
                value: hours.to_string(),
                reason: "Lookback reaches outside the representable date range".to_string(),
            })?;
        Ok(Self {
            since_millis: since.timestamp_millis(),
        })
    }

    pub fn since_millis(since_millis: i64) -> Self {
        Self { since_millis }
    }

    pub fn lower_bound_millis(&self) -> i64 {
        self.since_millis
    }

    pub fn contains(&self, millis: i64) -> bool {
        millis >= self.since_millis
    }
}
