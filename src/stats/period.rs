//! Reporting periods and bucket timelines
//!
//! A period selector plus an injected wall-clock time resolve to a
//! [`Timeline`]: the half-open time window records must fall into and the
//! canonical, gap-free sequence of bucket labels the series are aligned to.
//! The window is aligned to the first and last bucket, so every in-scope
//! timestamp keys to exactly one label and the series always sum to the
//! filtered total.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike};

/// Caller-selected reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
    #[default]
    Overall,
}

impl Period {
    /// Parse a period selector.
    ///
    /// Unknown or empty selectors fall back to `Overall`, the same behavior
    /// as a missing query parameter.
    pub fn parse(selector: &str) -> Self {
        match selector {
            "day" => Period::Day,
            "week" => Period::Week,
            "month" => Period::Month,
            "year" => Period::Year,
            _ => Period::Overall,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::Overall => "overall",
        }
    }
}

/// Bucket granularity, one per period kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Granularity {
    Hour,
    Day,
    Month,
    Year,
}

impl Granularity {
    fn key_format(&self) -> &'static str {
        match self {
            Granularity::Hour => "%H:00",
            Granularity::Day => "%Y-%m-%d",
            Granularity::Month => "%Y-%m",
            Granularity::Year => "%Y",
        }
    }
}

/// Fixed bucket timeline for one period.
///
/// `labels` covers the whole window including empty buckets. A record is in
/// scope when `lower_bound <= timestamp < upper_bound`; [`Timeline::bucket_key`]
/// maps every in-scope timestamp to one of `labels`.
pub struct Timeline<Tz: TimeZone> {
    pub lower_bound: i64,
    pub upper_bound: i64,
    pub labels: Vec<String>,
    granularity: Granularity,
    tz: Tz,
}

impl<Tz: TimeZone> Timeline<Tz>
where
    Tz::Offset: fmt::Display,
{
    /// Resolve the timeline for `period` anchored at the injected `now`.
    ///
    /// `earliest` is the minimum timestamp across the FULL record set. It
    /// only matters for `Overall`, whose year range starts at the oldest
    /// record rather than at a window bound; passing the filtered subset's
    /// minimum would silently shrink the timeline.
    pub fn resolve(period: Period, now: &DateTime<Tz>, earliest: Option<i64>) -> Self {
        let tz = now.timezone();
        match period {
            Period::Day => {
                let start = start_of_day(now);
                Timeline {
                    lower_bound: start,
                    upper_bound: start + 86_400,
                    labels: (0..24).map(|hour| format!("{hour:02}:00")).collect(),
                    granularity: Granularity::Hour,
                    tz,
                }
            }
            Period::Week => Self::daily(now, 7),
            Period::Month => Self::daily(now, 30),
            Period::Year => {
                let months = month_sequence(now, 12);
                let (first_year, first_month) = months[0];
                let lower = start_of_month(&tz, first_year, first_month)
                    .unwrap_or_else(|| now.timestamp() - 365 * 86_400);
                let (next_year, next_month) = month_after(now.year(), now.month());
                let upper = start_of_month(&tz, next_year, next_month).unwrap_or(i64::MAX);
                Timeline {
                    lower_bound: lower,
                    upper_bound: upper,
                    labels: months
                        .iter()
                        .map(|(year, month)| format!("{year:04}-{month:02}"))
                        .collect(),
                    granularity: Granularity::Month,
                    tz,
                }
            }
            Period::Overall => {
                let current = now.year();
                let first = earliest
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .map(|dt| dt.with_timezone(&tz).year())
                    .unwrap_or(current)
                    .min(current);
                let upper = start_of_month(&tz, current + 1, 1).unwrap_or(i64::MAX);
                Timeline {
                    lower_bound: 0,
                    upper_bound: upper,
                    labels: (first..=current).map(|year| format!("{year:04}")).collect(),
                    granularity: Granularity::Year,
                    tz,
                }
            }
        }
    }

    /// Daily buckets for the `count` calendar days ending today, oldest first.
    fn daily(now: &DateTime<Tz>, count: i64) -> Self {
        let oldest = now.clone() - Duration::days(count - 1);
        Timeline {
            lower_bound: start_of_day(&oldest),
            upper_bound: start_of_day(now) + 86_400,
            labels: (0..count)
                .rev()
                .map(|back| {
                    (now.clone() - Duration::days(back))
                        .format("%Y-%m-%d")
                        .to_string()
                })
                .collect(),
            granularity: Granularity::Day,
            tz: now.timezone(),
        }
    }

    /// Bucket label for a record timestamp, in this timeline's granularity.
    pub fn bucket_key(&self, timestamp: i64) -> String {
        match DateTime::from_timestamp(timestamp, 0) {
            Some(dt) => dt
                .with_timezone(&self.tz)
                .format(self.granularity.key_format())
                .to_string(),
            None => String::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Epoch second of local midnight on `dt`'s calendar day.
fn start_of_day<Tz: TimeZone>(dt: &DateTime<Tz>) -> i64 {
    dt.timestamp() - i64::from(dt.num_seconds_from_midnight())
}

/// Epoch second of local midnight on the first of the given month, when that
/// instant exists in the zone.
fn start_of_month<Tz: TimeZone>(tz: &Tz, year: i32, month: u32) -> Option<i64> {
    tz.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .earliest()
        .map(|dt| dt.timestamp())
}

/// The `count` (year, month) pairs ending with `now`'s month, oldest first.
fn month_sequence<Tz: TimeZone>(now: &DateTime<Tz>, count: i32) -> Vec<(i32, u32)> {
    let total = now.year() * 12 + now.month0() as i32;
    (0..count)
        .rev()
        .map(|back| {
            let index = total - back;
            (index.div_euclid(12), (index.rem_euclid(12) + 1) as u32)
        })
        .collect()
}

fn month_after(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}
