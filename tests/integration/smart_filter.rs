//! S3-style scenario (spec §8): smart_filter is the dominant optimization.
//! Over 100 PDP URLs where 85 have a recent, good-quality Tracker entry, only
//! the remaining 15 should come back for re-scraping.

use propscout_core::Tracker;

#[tokio::test]
async fn smart_filter_reduces_a_mostly_fresh_corpus_to_the_stale_remainder() {
    let tracker = Tracker::open(":memory:").await.unwrap();

    let urls: Vec<String> = (0..100).map(|i| format!("https://www.example-realty.test/pdpid-{i}")).collect();

    for url in &urls[0..85] {
        tracker.record_result(url, true, 90.0).await.unwrap();
    }
    // The remaining 15 have never been scraped; they stay NEW.

    let (included, summary) = tracker.smart_filter(&urls, 60.0, 30).await.unwrap();

    assert_eq!(included.len(), 15);
    assert_eq!(summary.skip_good, 85);
    assert_eq!(summary.new, 15);
    assert!((summary.reduction_pct() - 85.0).abs() < 1e-9);
}

#[tokio::test]
async fn stale_entries_older_than_ttl_are_included_even_with_good_quality() {
    let tracker = Tracker::open(":memory:").await.unwrap();
    let url = "https://www.example-realty.test/pdpid-stale".to_string();
    tracker.record_result(&url, true, 95.0).await.unwrap();

    // A 0-day TTL makes any already-recorded entry immediately stale.
    let (included, summary) = tracker.smart_filter(&[url.clone()], 60.0, 0).await.unwrap();

    assert_eq!(included, vec![url]);
    assert_eq!(summary.stale, 1);
}

#[tokio::test]
async fn failed_extractions_are_always_retried_regardless_of_quality() {
    let tracker = Tracker::open(":memory:").await.unwrap();
    let url = "https://www.example-realty.test/pdpid-failed".to_string();
    tracker.record_result(&url, false, 0.0).await.unwrap();

    let (included, summary) = tracker.smart_filter(&[url.clone()], 60.0, 30).await.unwrap();

    assert_eq!(included, vec![url]);
    assert_eq!(summary.failed_extraction, 1);
}
