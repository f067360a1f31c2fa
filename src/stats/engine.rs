//! The aggregation engine
//!
//! [`compute_stats`] is a pure function over an in-memory record snapshot:
//! it holds no state between calls, reads no global clock, and identical
//! inputs with an identical injected `now` produce identical results. The
//! caller (API handler, CLI) owns the store and the clock.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, TimeZone};

use crate::stats::classifier;
use crate::stats::models::{StatsFilter, StatsResult, VisitRecord};
use crate::stats::period::{Period, Timeline};

/// Compute the full statistics for one query.
///
/// `records` is the raw snapshot including crawler traffic. Crawlers are
/// dropped first, then the period window and the optional drill-down filter
/// are applied; every count in the result is taken over the surviving set.
/// `now` anchors the period window.
pub fn compute_stats<Tz>(
    records: &[VisitRecord],
    period: Period,
    filter: Option<&StatsFilter>,
    now: &DateTime<Tz>,
) -> StatsResult
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    // The overall timeline starts at the oldest record of the WHOLE set,
    // not of the filtered subset, so leading empty years stay visible.
    let earliest = records.iter().map(|r| r.timestamp).min();
    let timeline = Timeline::resolve(period, now, earliest);

    let survivors: Vec<&VisitRecord> = records
        .iter()
        .filter(|r| !classifier::is_crawler(&r.user_agent))
        .filter(|r| timeline.lower_bound <= r.timestamp && r.timestamp < timeline.upper_bound)
        .filter(|r| filter.map_or(true, |f| matches_filter(r, f)))
        .collect();

    let total_visits = survivors.len() as u64;
    let (unique_visitors, recurring_visitors) =
        visitor_counts(survivors.iter().map(|r| r.ip.as_str()));

    // One pass to group survivors by bucket key; the canonical labels then
    // drive the series so missing buckets become explicit zero entries.
    let mut buckets: HashMap<String, Vec<&str>> = HashMap::new();
    for record in &survivors {
        buckets
            .entry(timeline.bucket_key(record.timestamp))
            .or_default()
            .push(record.ip.as_str());
    }

    let mut visits_series = Vec::with_capacity(timeline.len());
    let mut unique_series = Vec::with_capacity(timeline.len());
    let mut recurring_series = Vec::with_capacity(timeline.len());
    for label in &timeline.labels {
        match buckets.get(label) {
            Some(ips) => {
                // Recurrence is scoped to the bucket, not carried across
                let (unique, recurring) = visitor_counts(ips.iter().copied());
                visits_series.push(ips.len() as u64);
                unique_series.push(unique);
                recurring_series.push(recurring);
            }
            None => {
                visits_series.push(0);
                unique_series.push(0);
                recurring_series.push(0);
            }
        }
    }

    let mut by_language: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_url: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_browser: BTreeMap<String, u64> = BTreeMap::new();
    for record in &survivors {
        *by_language
            .entry(classifier::readable_language(&record.language))
            .or_insert(0) += 1;
        *by_url.entry(record.url.clone()).or_insert(0) += 1;
        *by_browser
            .entry(classifier::browser_name(&record.user_agent))
            .or_insert(0) += 1;
    }

    StatsResult {
        total_visits,
        unique_visitors,
        recurring_visitors,
        bucket_labels: timeline.labels,
        visits_series,
        unique_series,
        recurring_series,
        by_language,
        by_url,
        by_browser,
    }
}

fn matches_filter(record: &VisitRecord, filter: &StatsFilter) -> bool {
    match filter {
        StatsFilter::Language(value) => classifier::readable_language(&record.language) == *value,
        StatsFilter::Url(value) => record.url == *value,
        StatsFilter::Browser(value) => classifier::browser_name(&record.user_agent) == *value,
    }
}

/// Distinct visitor count and count of visitors seen more than once.
fn visitor_counts<'a>(ips: impl Iterator<Item = &'a str>) -> (u64, u64) {
    let mut seen: HashMap<&str, u64> = HashMap::new();
    for ip in ips {
        *seen.entry(ip).or_insert(0) += 1;
    }

    let unique = seen.len() as u64;
    let recurring = seen.values().filter(|&&count| count > 1).count() as u64;
    (unique, recurring)
}
