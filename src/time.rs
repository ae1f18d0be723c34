//! Mission time helpers
//!
//! Archive timestamps are CXC seconds: elapsed SI seconds since
//! 1998-01-01T00:00:00 TT. These helpers convert between CXC seconds and
//! human-readable UTC dates for logs, error messages and the command line.
//!
//! Leap seconds inserted after the epoch are accounted for from a fixed
//! table; dates beyond the last table entry assume no further leap seconds.

use crate::error::{Result, TlmError};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Date format used for display (`YYYY:DOY:HH:MM:SS.sss`)
pub const DATE_FORMAT: &str = "%Y:%j:%H:%M:%S%.3f";

/// TT - UTC at the epoch (32.184 s + 31 leap seconds)
const EPOCH_TT_MINUS_UTC_MS: i64 = 63_184;

/// UTC dates at which a leap second had just been inserted (year, month, day)
const LEAP_DATES: &[(i32, u32, u32)] = &[
    (1999, 1, 1),
    (2006, 1, 1),
    (2009, 1, 1),
    (2012, 7, 1),
    (2015, 7, 1),
    (2017, 1, 1),
];

fn epoch_utc() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1998, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt - Duration::milliseconds(EPOCH_TT_MINUS_UTC_MS))
        .unwrap_or_default()
}

fn naive_secs(dt: NaiveDateTime) -> f64 {
    (dt - epoch_utc()).num_milliseconds() as f64 / 1000.0
}

/// Number of leap seconds elapsed between the epoch and `cxc_secs`
fn leap_seconds_at(cxc_secs: f64) -> i64 {
    let mut count = 0;
    for (i, &(y, m, d)) in LEAP_DATES.iter().enumerate() {
        let Some(date) = NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(0, 0, 0))
        else {
            continue;
        };
        if cxc_secs >= naive_secs(date) + (i + 1) as f64 {
            count = i as i64 + 1;
        }
    }
    count
}

/// Convert CXC seconds to a UTC timestamp
pub fn cxc_to_datetime(cxc_secs: f64) -> NaiveDateTime {
    let leaps = leap_seconds_at(cxc_secs);
    let millis = ((cxc_secs - leaps as f64) * 1000.0).round() as i64;
    epoch_utc() + Duration::milliseconds(millis)
}

/// Convert CXC seconds to a `YYYY:DOY:HH:MM:SS.sss` date string
pub fn cxc_to_date(cxc_secs: f64) -> String {
    if !cxc_secs.is_finite() {
        return format!("{}", cxc_secs);
    }
    cxc_to_datetime(cxc_secs).format(DATE_FORMAT).to_string()
}

/// Convert a UTC timestamp to CXC seconds
pub fn datetime_to_cxc(dt: NaiveDateTime) -> f64 {
    let naive = naive_secs(dt);
    let mut leaps = 0;
    for (i, &(y, m, d)) in LEAP_DATES.iter().enumerate() {
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(0, 0, 0)) {
            if dt >= date {
                leaps = i + 1;
            }
        }
    }
    naive + leaps as f64
}

/// Parse a date string or raw CXC seconds.
///
/// Accepted forms: `2019:123:12:00:00.000`, `2019:123`, `2019-05-03T12:00:00`,
/// `2019-05-03` and plain floating-point seconds.
pub fn parse_time(text: &str) -> Result<f64> {
    let text = text.trim();
    if let Ok(secs) = text.parse::<f64>() {
        return Ok(secs);
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y:%j:%H:%M:%S%.f",
        "%Y:%j:%H:%M:%S",
        "%Y:%j:%H:%M",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Ok(datetime_to_cxc(dt));
        }
    }
    for fmt in ["%Y:%j", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Ok(datetime_to_cxc(dt));
            }
        }
    }

    Err(TlmError::Config(format!("Unrecognized time format: '{}'", text)))
}
