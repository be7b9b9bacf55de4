use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::Event;

const DAY_MS: i64 = 24 * 3600 * 1000;
const WEEK_MS: i64 = 7 * DAY_MS;
const MILLIS_THRESHOLD: f64 = 1e12;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Year,
    #[default]
    Month,
    Week,
}

impl TimeUnit {
    pub const ALL: [Self; 3] = [Self::Year, Self::Month, Self::Week];

    pub fn label(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Week => "week",
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "week" => Ok(Self::Week),
            other => Err(format!("unknown time unit `{other}` (expected year, month or week)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    pub start_ms: i64,
    pub label: String,
}

/// Closed interval `[start_ms, end_ms]` in epoch milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl WindowRange {
    pub fn contains(self, timestamp_ms: i64) -> bool {
        timestamp_ms >= self.start_ms && timestamp_ms <= self.end_ms
    }
}

/// Parses a timestamp from a JSON value into epoch milliseconds.
///
/// Strings may be RFC 3339, date-times with a `%z` offset, naive date-times at minute or
/// second precision (read as UTC), `YYYY-MM-DD`, `YYYY-MM`, `YYYY`, or numeric with more than
/// four integer digits. Numbers above 1e12 are taken as milliseconds, anything else as seconds.
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_f64().and_then(numeric_timestamp),
        Value::String(text) => parse_timestamp_str(text),
        _ => None,
    }
}

pub fn parse_timestamp_str(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }

    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.timestamp_millis());
        }
    }

    // A trailing `Z` on an otherwise naive timestamp means UTC.
    let naive = text.strip_suffix(['Z', 'z']).unwrap_or(text);
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }

    if let Some(date) = parse_calendar_date(text) {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc().timestamp_millis());
    }

    if integer_digits(text) <= MAX_YEAR_DIGITS {
        return None;
    }
    text.parse::<f64>().ok().and_then(numeric_timestamp)
}

const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const MAX_YEAR_DIGITS: usize = 4;

/// `YYYY-MM-DD`, `YYYY-MM` or a bare `YYYY`, each read as the first instant of the period.
fn parse_calendar_date(text: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }

    let mut parts = text.split('-');
    let year = parts.next().filter(|part| is_year(part))?.parse().ok()?;
    let month = match parts.next() {
        Some(part) if (1..=2).contains(&part.len()) => part.parse().ok()?,
        Some(_) => return None,
        None => 1,
    };
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, 1)
}

fn is_year(text: &str) -> bool {
    text.len() == MAX_YEAR_DIGITS && text.bytes().all(|byte| byte.is_ascii_digit())
}

/// Digits before the decimal point, ignoring a leading sign.
fn integer_digits(text: &str) -> usize {
    text.trim_start_matches(['-', '+'])
        .split('.')
        .next()
        .map_or(0, |whole| whole.bytes().filter(u8::is_ascii_digit).count())
}

fn numeric_timestamp(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }

    let millis = if value > MILLIS_THRESHOLD {
        value
    } else {
        value * 1000.0
    };

    if millis.abs() > i64::MAX as f64 {
        return None;
    }
    Some(millis.round() as i64)
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|moment| moment.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn format_date(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|moment| moment.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

/// Sorted, parsed timestamps of the given events; unparseable ones are skipped.
pub fn collect_timestamps<'a>(events: impl IntoIterator<Item = &'a Event>) -> Vec<i64> {
    let mut timestamps = events
        .into_iter()
        .filter_map(|event| event.timestamp_ms)
        .filter(|&timestamp| DateTime::<Utc>::from_timestamp_millis(timestamp).is_some())
        .collect::<Vec<_>>();
    timestamps.sort_unstable();
    timestamps
}

fn utc_date_ms(year: i32, month: u32, day: u32) -> Option<i64> {
    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc().timestamp_millis())
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month >= 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

fn any_within(sorted: &[i64], start: i64, end: i64) -> bool {
    let first = sorted.partition_point(|&timestamp| timestamp < start);
    sorted.get(first).is_some_and(|&timestamp| timestamp <= end)
}

/// Buckets of the given granularity that contain at least one timestamp, ascending by start.
pub fn build_time_buckets(timestamps: &[i64], unit: TimeUnit) -> Vec<TimeBucket> {
    let mut sorted = timestamps
        .iter()
        .copied()
        .filter(|&timestamp| DateTime::<Utc>::from_timestamp_millis(timestamp).is_some())
        .collect::<Vec<_>>();
    sorted.sort_unstable();

    let (Some(&min), Some(&max)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    let (Some(first), Some(last)) = (
        DateTime::<Utc>::from_timestamp_millis(min),
        DateTime::<Utc>::from_timestamp_millis(max),
    ) else {
        return Vec::new();
    };

    let mut buckets = Vec::new();
    match unit {
        TimeUnit::Year => {
            for year in first.year()..=last.year() {
                let (Some(start), Some(next)) = (utc_date_ms(year, 1, 1), utc_date_ms(year + 1, 1, 1))
                else {
                    break;
                };
                if any_within(&sorted, start, next - 1) {
                    buckets.push(TimeBucket {
                        start_ms: start,
                        label: year.to_string(),
                    });
                }
            }
        }
        TimeUnit::Month => {
            let (mut year, mut month) = (first.year(), first.month());
            while (year, month) <= (last.year(), last.month()) {
                let (next_year, following) = next_month(year, month);
                let (Some(start), Some(next)) =
                    (utc_date_ms(year, month, 1), utc_date_ms(next_year, following, 1))
                else {
                    break;
                };
                if any_within(&sorted, start, next - 1) {
                    buckets.push(TimeBucket {
                        start_ms: start,
                        label: format!("{year}-{month:02}"),
                    });
                }
                (year, month) = (next_year, following);
            }
        }
        TimeUnit::Week => {
            let day = first.date_naive();
            let monday = day - chrono::Duration::days(i64::from(day.weekday().num_days_from_monday()));
            let Some(mut week_start) = monday
                .and_hms_opt(0, 0, 0)
                .map(|midnight| midnight.and_utc().timestamp_millis())
            else {
                return buckets;
            };

            while week_start <= max {
                let week_end = week_start + WEEK_MS - 1;
                if any_within(&sorted, week_start, week_end) {
                    let Some(start) = DateTime::<Utc>::from_timestamp_millis(week_start) else {
                        break;
                    };
                    let year = start.year();
                    let year_start = utc_date_ms(year, 1, 1).unwrap_or(week_start);
                    let week_number = (week_start - year_start).div_euclid(DAY_MS) / 7 + 1;
                    buckets.push(TimeBucket {
                        start_ms: week_start,
                        label: format!("{year}-W{week_number}"),
                    });
                }
                week_start += WEEK_MS;
            }
        }
    }

    buckets
}

/// Clamps a slider index into `[0, bucket_count - 1]`.
pub fn clamp_bucket_index(index: usize, bucket_count: usize) -> usize {
    index.min(bucket_count.saturating_sub(1))
}

/// Inclusive end of the bucket at `index`: the next bucket's start minus one, or the end of
/// the calendar unit for the last bucket.
pub fn window_end(buckets: &[TimeBucket], index: usize, unit: TimeUnit) -> Option<i64> {
    let bucket = buckets.get(index)?;
    if let Some(next) = buckets.get(index + 1) {
        return Some(next.start_ms - 1);
    }

    let start = DateTime::<Utc>::from_timestamp_millis(bucket.start_ms)?;
    let end = match unit {
        TimeUnit::Year => utc_date_ms(start.year() + 1, 1, 1)? - 1,
        TimeUnit::Month => {
            let (year, month) = next_month(start.year(), start.month());
            utc_date_ms(year, month, 1)? - 1
        }
        TimeUnit::Week => bucket.start_ms + WEEK_MS - 1,
    };
    Some(end)
}

/// Window for a (clamped) bucket index; `None` when there are no buckets.
pub fn window_for_index(buckets: &[TimeBucket], index: usize, unit: TimeUnit) -> Option<WindowRange> {
    if buckets.is_empty() {
        return None;
    }
    let index = clamp_bucket_index(index, buckets.len());
    Some(WindowRange {
        start_ms: buckets[index].start_ms,
        end_ms: window_end(buckets, index, unit)?,
    })
}
