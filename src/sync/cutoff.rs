use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use error_stack::{IntoReport, Report, ResultExt};

use crate::sync::SyncError;

/// Lower bound on the liked date; only items liked strictly after it are synced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cutoff(DateTime<Utc>);

impl Cutoff {
    pub fn admits(&self, added_at: &DateTime<Utc>) -> bool {
        *added_at > self.0
    }
}

impl FromStr for Cutoff {
    type Err = Report<SyncError>;

    /// Accepts an RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if let Ok(at) = DateTime::parse_from_rfc3339(value) {
            return Ok(Self(at.with_timezone(&Utc)));
        }
        let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .into_report()
            .change_context(SyncError)
            .attach_printable_lazy(|| format!("Invalid cutoff: {}", value))?;
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or(SyncError)
            .into_report()?;
        Ok(Self(Utc.from_utc_datetime(&midnight)))
    }
}

impl fmt::Display for Cutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::Secs, true))
    }
}

/// What the collector does once it meets the first item at or before the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutoffPolicy {
    /// Stop requesting pages. Relies on the feed being sorted newest first.
    #[default]
    StopPaging,
    /// Drop the rest of the current page but keep requesting (and re-checking)
    /// pages until the feed is exhausted.
    ScanAllPages,
}
