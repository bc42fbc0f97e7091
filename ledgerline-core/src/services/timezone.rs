//! Date parsing and wall-clock reinterpretation between zones

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    SubsecRound, TimeZone, Timelike, Utc,
};
use chrono_tz::Tz;
use serde::Serialize;

use crate::domain::result::{Error, Result};
use crate::domain::Value;

/// Zone-less date-time layouts, read as wall-clock time in the runtime zone
const LOCAL_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Zone-less date layouts, read as midnight in the runtime zone
const LOCAL_DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y/%m/%d"];

/// Where a batch's dates appear to have been anchored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneOrigin {
    /// Every date is midnight in the runtime zone
    AllLocalMidnight,
    /// Every date is midnight in UTC
    AllUtcMidnight,
    /// Anything else; dates are left alone
    Mixed,
}

impl ZoneOrigin {
    /// Zone the dates were read in, or `None` when they should not be moved
    pub fn source_zone(&self, runtime_zone: Tz) -> Option<Tz> {
        match self {
            ZoneOrigin::AllLocalMidnight => Some(runtime_zone),
            ZoneOrigin::AllUtcMidnight => Some(Tz::UTC),
            ZoneOrigin::Mixed => None,
        }
    }
}

pub fn is_midnight_in(ts: &DateTime<Utc>, tz: Tz) -> bool {
    let time = ts.with_timezone(&tz).time();
    time.hour() == 0 && time.minute() == 0 && time.second() == 0 && time.nanosecond() == 0
}

/// Classify a column of dates. Local midnight is checked first, so a batch
/// that is midnight in both zones counts as local.
pub fn classify_midnights(dates: &[DateTime<Utc>], runtime_zone: Tz) -> ZoneOrigin {
    if dates.iter().all(|d| is_midnight_in(d, runtime_zone)) {
        ZoneOrigin::AllLocalMidnight
    } else if dates.iter().all(|d| is_midnight_in(d, Tz::UTC)) {
        ZoneOrigin::AllUtcMidnight
    } else {
        ZoneOrigin::Mixed
    }
}

/// Resolve a wall-clock time in `tz` to an instant.
///
/// Ambiguous times (fall back) take the earlier instant. Times inside a
/// spring-forward gap are read with the offset in force before the gap,
/// which lands them the length of the gap later on the clock.
pub fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(a, b) => a.min(b).with_timezone(&Utc),
        LocalResult::None => {
            let before = tz
                .offset_from_utc_datetime(&(naive - Duration::days(1)))
                .fix()
                .local_minus_utc();
            Utc.from_utc_datetime(&(naive - Duration::seconds(i64::from(before))))
        }
    }
}

/// Keep the wall-clock reading of `ts` in `from`, re-anchored in `to`
pub fn transplant(ts: &DateTime<Utc>, from: Tz, to: Tz) -> DateTime<Utc> {
    resolve_local(to, ts.with_timezone(&from).naive_local())
}

/// Parse raw date text into an instant.
///
/// Explicit offsets win. A bare `YYYY-MM-DD` is UTC midnight. Every other
/// recognised layout is wall-clock time in `runtime_zone`.
pub fn parse_timestamp(text: &str, runtime_zone: Tz) -> Result<DateTime<Utc>> {
    let s = text.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(s, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }

    for format in LOCAL_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(resolve_local(runtime_zone, naive));
        }
    }
    for format in LOCAL_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Ok(resolve_local(runtime_zone, date.and_time(NaiveTime::MIN)));
        }
    }

    Err(Error::parse(format!("Invalid date '{}'", text)))
}

/// Parse a batch cell: timestamps pass through, numbers are epoch milliseconds.
///
/// Sheet dates hold whole milliseconds, so finer digits are dropped.
pub fn parse_value(value: &Value, runtime_zone: Tz) -> Result<DateTime<Utc>> {
    let ts = match value {
        Value::Timestamp(ts) => *ts,
        Value::Number(ms) if ms.is_finite() => Utc
            .timestamp_millis_opt(*ms as i64)
            .single()
            .ok_or_else(|| Error::parse(format!("Invalid date '{}'", value)))?,
        Value::Text(s) => parse_timestamp(s, runtime_zone)?,
        _ => return Err(Error::parse(format!("Invalid date '{}'", value))),
    };
    Ok(ts.trunc_subsecs(3))
}

/// First of the month, at midnight in `store_zone`, of the store-zone day of `ts`
pub fn month_start(ts: &DateTime<Utc>, store_zone: Tz) -> DateTime<Utc> {
    let day = ts.with_timezone(&store_zone).date_naive();
    let first = day.with_day(1).unwrap_or(day);
    resolve_local(store_zone, first.and_time(NaiveTime::MIN))
}

/// Most recent Sunday (the day itself when Sunday), at store-zone midnight
pub fn week_start(ts: &DateTime<Utc>, store_zone: Tz) -> DateTime<Utc> {
    let day = ts.with_timezone(&store_zone).date_naive();
    let sunday = day - Duration::days(i64::from(day.weekday().num_days_from_sunday()));
    resolve_local(store_zone, sunday.and_time(NaiveTime::MIN))
}
