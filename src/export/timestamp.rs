//! Message timestamps: exact parsing of `ts` strings and human-readable labels.

use std::cmp::Ordering;
use time::{Date, Month, OffsetDateTime, UtcOffset, Weekday};

/// A parsed `ts` value, ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    /// Parse `"1717761600.123456"`. Fraction digits beyond nanoseconds are dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let (whole, fraction) = match trimmed.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (trimmed, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        let secs = if whole.is_empty() {
            0
        } else {
            whole.parse::<i64>().ok()?
        };
        let mut nanos: u32 = 0;
        for (idx, digit) in fraction.bytes().take(9).enumerate() {
            nanos += u32::from(digit - b'0') * 10u32.pow(8 - idx as u32);
        }
        Some(Self { secs, nanos })
    }

    pub fn secs(self) -> i64 {
        self.secs
    }

    /// The instant in the given offset, `None` when out of range.
    pub fn to_datetime(self, offset: UtcOffset) -> Option<OffsetDateTime> {
        let nanos = i128::from(self.secs) * 1_000_000_000 + i128::from(self.nanos);
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .ok()
            .map(|dt| dt.to_offset(offset))
    }
}

/// Compare two raw `ts` strings by numeric value. Unparseable values sort first.
pub fn compare_ts(a: &str, b: &str) -> Ordering {
    Timestamp::parse(a).cmp(&Timestamp::parse(b))
}

fn local(ts: &str, offset: UtcOffset) -> Option<OffsetDateTime> {
    Timestamp::parse(ts)?.to_datetime(offset)
}

fn month_abbrev(month: Month) -> &'static str {
    match month {
        Month::January => "Jan",
        Month::February => "Feb",
        Month::March => "Mar",
        Month::April => "Apr",
        Month::May => "May",
        Month::June => "Jun",
        Month::July => "Jul",
        Month::August => "Aug",
        Month::September => "Sep",
        Month::October => "Oct",
        Month::November => "Nov",
        Month::December => "Dec",
    }
}

fn month_name(month: Month) -> &'static str {
    match month {
        Month::January => "January",
        Month::February => "February",
        Month::March => "March",
        Month::April => "April",
        Month::May => "May",
        Month::June => "June",
        Month::July => "July",
        Month::August => "August",
        Month::September => "September",
        Month::October => "October",
        Month::November => "November",
        Month::December => "December",
    }
}

fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Monday => "Monday",
        Weekday::Tuesday => "Tuesday",
        Weekday::Wednesday => "Wednesday",
        Weekday::Thursday => "Thursday",
        Weekday::Friday => "Friday",
        Weekday::Saturday => "Saturday",
        Weekday::Sunday => "Sunday",
    }
}

fn clock(dt: OffsetDateTime) -> String {
    let hour = dt.hour();
    let (hour12, ampm) = if hour == 0 {
        (12, "am")
    } else if hour < 12 {
        (hour, "am")
    } else if hour == 12 {
        (12, "pm")
    } else {
        (hour - 12, "pm")
    };
    format!("{}:{:02}{}", hour12, dt.minute(), ampm)
}

enum RelativeDay {
    Today,
    Yesterday,
    Other(Date),
}

fn relative_day(date: Date, now: OffsetDateTime) -> RelativeDay {
    let today = now.date();
    if date == today {
        RelativeDay::Today
    } else if today.previous_day() == Some(date) {
        RelativeDay::Yesterday
    } else {
        RelativeDay::Other(date)
    }
}

/// Clock time of a message, e.g. `3:05pm`. Unparseable input is returned as-is.
pub fn format_time(ts: &str, offset: UtcOffset) -> String {
    match local(ts, offset) {
        Some(dt) => clock(dt),
        None => ts.to_string(),
    }
}

/// Full date and time, e.g. `Jun 7, 2025 3:05pm`.
pub fn format_timestamp(ts: &str, offset: UtcOffset) -> String {
    match local(ts, offset) {
        Some(dt) => format!(
            "{} {}, {} {}",
            month_abbrev(dt.month()),
            dt.day(),
            dt.year(),
            clock(dt)
        ),
        None => ts.to_string(),
    }
}

/// `Today at 3:05pm`, `Yesterday at 9:00am`, `Jun 7 at 3:05pm` or `Jun 7, 2024 at 3:05pm`.
///
/// "Today" is relative to `now`, in `now`'s offset.
pub fn format_date_time(ts: &str, now: OffsetDateTime) -> String {
    let Some(dt) = local(ts, now.offset()) else {
        return ts.to_string();
    };
    match relative_day(dt.date(), now) {
        RelativeDay::Today => format!("Today at {}", clock(dt)),
        RelativeDay::Yesterday => format!("Yesterday at {}", clock(dt)),
        RelativeDay::Other(date) if date.year() == now.year() => {
            format!("{} {} at {}", month_abbrev(date.month()), date.day(), clock(dt))
        }
        RelativeDay::Other(date) => format!(
            "{} {}, {} at {}",
            month_abbrev(date.month()),
            date.day(),
            date.year(),
            clock(dt)
        ),
    }
}

/// Day separator label: `Today`, `Yesterday`, `Saturday, June 7` or `Friday, June 7, 2024`.
pub fn format_date_marker(ts: &str, now: OffsetDateTime) -> String {
    let Some(dt) = local(ts, now.offset()) else {
        return ts.to_string();
    };
    match relative_day(dt.date(), now) {
        RelativeDay::Today => "Today".to_string(),
        RelativeDay::Yesterday => "Yesterday".to_string(),
        RelativeDay::Other(date) => {
            let base = format!(
                "{}, {} {}",
                weekday_name(date.weekday()),
                month_name(date.month()),
                date.day()
            );
            if date.year() == now.year() {
                base
            } else {
                format!("{base}, {}", date.year())
            }
        }
    }
}

/// Whether both timestamps fall on the same calendar day in `offset`.
pub fn is_same_day(a: &str, b: &str, offset: UtcOffset) -> bool {
    match (local(a, offset), local(b, offset)) {
        (Some(a), Some(b)) => a.date() == b.date(),
        _ => false,
    }
}
