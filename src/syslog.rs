//! Syslog timestamp parsing.
//!
//! Classic BSD syslog lines start with a fixed-width `Mmm dd HH:MM:SS`
//! timestamp (day space-padded, e.g. `Nov  6 09:16:35`) in host local time and
//! without a year. The year is taken from "now"; a result more than one day in
//! the future belongs to the previous year (a December line read in January).

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

/// Width of the leading timestamp field.
pub const SYSLOG_TIMESTAMP_LEN: usize = 15;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Parses the leading syslog timestamp of `line` into UTC epoch seconds.
///
/// `now` supplies both the timezone of the log and the reference year.
/// Returns `None` for anything that is not a valid timestamp, including local
/// times that do not exist (DST gap) in the given zone.
pub fn parse_syslog_timestamp<Tz: TimeZone>(line: &str, now: &DateTime<Tz>) -> Option<i64> {
    let field = line.get(..SYSLOG_TIMESTAMP_LEN)?;
    let (month, day, time) = split_fields(field)?;

    let tz = now.timezone();
    let year = now.year();

    let local = to_local(&tz, year, month, day, time)?;
    if local > now.clone() + Duration::days(1) {
        let previous = to_local(&tz, year - 1, month, day, time)?;
        return Some(previous.timestamp());
    }
    Some(local.timestamp())
}

fn split_fields(field: &str) -> Option<(u32, u32, NaiveTime)> {
    let mut parts = field.split_whitespace();
    let month_str = parts.next()?;
    let day_str = parts.next()?;
    let time_str = parts.next()?;
    if parts.next().is_some() {
        return None;
    }

    let month = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(month_str))? as u32
        + 1;
    let day = day_str.parse::<u32>().ok()?;
    let time = NaiveTime::parse_from_str(time_str, "%H:%M:%S").ok()?;
    Some((month, day, time))
}

fn to_local<Tz: TimeZone>(
    tz: &Tz,
    year: i32,
    month: u32,
    day: u32,
    time: NaiveTime,
) -> Option<DateTime<Tz>> {
    // Feb 29 only exists in leap years; an invalid date is a malformed line.
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    tz.from_local_datetime(&NaiveDateTime::new(date, time))
        .earliest()
}

/// Formats an epoch timestamp as a syslog timestamp in the given zone.
pub fn format_syslog_timestamp<Tz: TimeZone>(tz: &Tz, epoch: i64) -> Option<String>
where
    Tz::Offset: std::fmt::Display,
{
    let dt = tz.timestamp_opt(epoch, 0).single()?;
    Some(dt.format("%b %e %H:%M:%S").to_string())
}
