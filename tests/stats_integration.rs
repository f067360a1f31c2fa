//! Integration tests for the statistics pipeline
//!
//! These tests run the full path a query takes in production: records are
//! persisted through the SQLite store, loaded back as a snapshot, and fed to
//! the aggregation engine with an injected clock.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use tally::stats::{compute_stats, Period, StatsFilter, VisitRecord};
use tally::storage::{SqliteStore, VisitStore};

const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                      (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

fn query_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap()
}

fn visit(timestamp: i64, ip: &str, user_agent: &str, url: &str, language: &str) -> VisitRecord {
    VisitRecord {
        timestamp,
        ip: ip.to_string(),
        user_agent: user_agent.to_string(),
        url: url.to_string(),
        referrer: "Direct".to_string(),
        language: language.to_string(),
    }
}

async fn memory_store() -> Arc<dyn VisitStore> {
    let store = SqliteStore::new("sqlite::memory:", 5).await.unwrap();
    store.init().await.unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn test_stats_over_stored_records() {
    let store = memory_store().await;
    let now = query_time();
    let t = now.timestamp();

    store
        .append_batch(&[
            visit(t, "1.1.1.1", FIREFOX, "/", "en-US,en;q=0.9"),
            visit(t + 10, "1.1.1.1", FIREFOX, "/", "en-US,en;q=0.9"),
            visit(t + 20, "2.2.2.2", CHROME, "/pricing", "fr-FR"),
            visit(t + 30, "66.249.66.1", GOOGLEBOT, "/", "en"),
        ])
        .await
        .unwrap();

    let records = store.load_all().await.unwrap();
    assert_eq!(records.len(), 4, "crawler visits are still stored");

    let stats = compute_stats(&records, Period::Day, None, &now);

    // The crawler is stored but never counted
    assert_eq!(stats.total_visits, 3);
    assert_eq!(stats.unique_visitors, 2);
    assert_eq!(stats.recurring_visitors, 1);
    assert_eq!(stats.bucket_labels.len(), 24);
    assert_eq!(stats.visits_series.iter().sum::<u64>(), stats.total_visits);
    assert_eq!(stats.by_language.get("English"), Some(&2));
    assert_eq!(stats.by_language.get("French"), Some(&1));
    assert_eq!(stats.by_browser.get("Firefox"), Some(&2));
    assert_eq!(stats.by_browser.get("Chrome"), Some(&1));
}

#[tokio::test]
async fn test_drilldown_filter_restricts_every_count() {
    let store = memory_store().await;
    let now = query_time();
    let t = now.timestamp();

    store
        .append_batch(&[
            visit(t, "1.1.1.1", FIREFOX, "/pricing", "en"),
            visit(t + 5, "1.1.1.1", FIREFOX, "/pricing", "en"),
            visit(t + 10, "2.2.2.2", CHROME, "/docs", "en"),
        ])
        .await
        .unwrap();

    let records = store.load_all().await.unwrap();
    let filter = StatsFilter::Url("/pricing".to_string());
    let stats = compute_stats(&records, Period::Day, Some(&filter), &now);

    assert_eq!(stats.total_visits, 2);
    assert_eq!(stats.unique_visitors, 1);
    assert_eq!(stats.recurring_visitors, 1);
    assert_eq!(stats.by_url.len(), 1);
    assert_eq!(stats.by_browser.get("Chrome"), None);
    assert_eq!(stats.visits_series.iter().sum::<u64>(), 2);
}

#[tokio::test]
async fn test_empty_store_yields_zeroed_result() {
    let store = memory_store().await;
    let records = store.load_all().await.unwrap();

    for (period, buckets) in [
        (Period::Day, 24),
        (Period::Week, 7),
        (Period::Month, 30),
        (Period::Year, 12),
        (Period::Overall, 1),
    ] {
        let stats = compute_stats(&records, period, None, &query_time());
        assert_eq!(stats.total_visits, 0);
        assert_eq!(stats.bucket_labels.len(), buckets);
        assert!(stats.visits_series.iter().all(|&v| v == 0));
        assert!(stats.by_language.is_empty());
    }
}

#[tokio::test]
async fn test_result_serializes_to_parallel_arrays() {
    let store = memory_store().await;
    let now = query_time();

    store
        .append(&visit(now.timestamp(), "1.1.1.1", FIREFOX, "/", "en"))
        .await
        .unwrap();

    let records = store.load_all().await.unwrap();
    let stats = compute_stats(&records, Period::Week, None, &now);

    let json: serde_json::Value = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["total_visits"], 1);
    assert_eq!(json["bucket_labels"].as_array().unwrap().len(), 7);
    assert_eq!(json["visits_series"].as_array().unwrap().len(), 7);
    assert_eq!(json["unique_series"].as_array().unwrap().len(), 7);
    assert_eq!(json["recurring_series"].as_array().unwrap().len(), 7);
    assert_eq!(json["by_language"]["English"], 1);
    assert_eq!(json["by_url"]["/"], 1);
    assert_eq!(json["by_browser"]["Firefox"], 1);
}

#[tokio::test]
async fn test_overall_year_range_comes_from_oldest_stored_record() {
    let store = memory_store().await;
    let now = query_time();

    let old = Utc.with_ymd_and_hms(2020, 11, 2, 9, 30, 0).unwrap();
    store
        .append_batch(&[
            visit(old.timestamp(), "1.1.1.1", FIREFOX, "/", "en"),
            visit(now.timestamp(), "2.2.2.2", CHROME, "/", "de"),
        ])
        .await
        .unwrap();

    let records = store.load_all().await.unwrap();
    let stats = compute_stats(&records, Period::Overall, None, &now);

    assert_eq!(
        stats.bucket_labels,
        vec!["2020", "2021", "2022", "2023", "2024"]
    );
    assert_eq!(stats.visits_series, vec![1, 0, 0, 0, 1]);
    assert_eq!(stats.visits_series.iter().sum::<u64>(), stats.total_visits);
}
