//! Data models for visit statistics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;

/// A single recorded page visit.
///
/// Write-once: captured at request time and never mutated afterwards. The
/// engine only derives views from records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct VisitRecord {
    /// Unix timestamp of the visit, set once at capture time
    pub timestamp: i64,

    /// Client address, used as the visitor identity proxy
    pub ip: String,

    /// Raw User-Agent header
    pub user_agent: String,

    /// Requested path
    pub url: String,

    /// Raw Referer header, or "Direct" when absent
    pub referrer: String,

    /// Raw Accept-Language header
    pub language: String,
}

/// Drill-down filter applied on top of the period window.
///
/// The dimension set is closed on purpose: dimension names are parsed at the
/// query boundary and unknown names are rejected there, instead of a
/// string-keyed filter silently matching everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsFilter {
    /// Match on the classified language name, e.g. "English"
    Language(String),
    /// Match on the raw visited path, case-sensitive, no normalization
    Url(String),
    /// Match on the browser family name, e.g. "Firefox"
    Browser(String),
}

impl StatsFilter {
    pub fn parse(dimension: &str, value: &str) -> Result<Self, QueryError> {
        match dimension {
            "language" => Ok(StatsFilter::Language(value.to_string())),
            "url" => Ok(StatsFilter::Url(value.to_string())),
            "browser" => Ok(StatsFilter::Browser(value.to_string())),
            other => Err(QueryError::UnknownDimension(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown filter dimension '{0}', expected one of: language, url, browser")]
    UnknownDimension(String),

    #[error("filter dimension and value must be supplied together")]
    IncompleteFilter,
}

/// Full statistics output for one query.
///
/// Recomputed from scratch on every call and never persisted. The series
/// vectors are index-aligned with `bucket_labels` and cover the whole period,
/// empty buckets included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsResult {
    pub total_visits: u64,

    /// Distinct `ip` values across the filtered record set
    pub unique_visitors: u64,

    /// Distinct `ip` values appearing more than once in the filtered set
    pub recurring_visitors: u64,

    pub bucket_labels: Vec<String>,
    pub visits_series: Vec<u64>,
    pub unique_series: Vec<u64>,
    pub recurring_series: Vec<u64>,

    pub by_language: BTreeMap<String, u64>,
    pub by_url: BTreeMap<String, u64>,
    pub by_browser: BTreeMap<String, u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_parse() {
        assert_eq!(
            StatsFilter::parse("language", "English").unwrap(),
            StatsFilter::Language("English".to_string())
        );
        assert_eq!(
            StatsFilter::parse("url", "/pricing").unwrap(),
            StatsFilter::Url("/pricing".to_string())
        );
        assert_eq!(
            StatsFilter::parse("browser", "Firefox").unwrap(),
            StatsFilter::Browser("Firefox".to_string())
        );
    }

    #[test]
    fn test_filter_parse_rejects_unknown_dimension() {
        let err = StatsFilter::parse("country", "US").unwrap_err();
        assert!(matches!(err, QueryError::UnknownDimension(d) if d == "country"));
    }
}
