mod migrations;
mod types;

pub use migrations::{apply_migrations, Migration, MIGRATIONS};
pub use types::{SmartFilterLabel, SmartFilterSummary, TrackerEntry};

use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::{debug, info};

/// Tracking parameters the drift-prone known-host query params are stripped
/// by name, matching the original scraper's click-tracking query keys.
const TRACKING_PARAMS: &[&str] = &["utm_source", "utm_medium", "utm_campaign", "ref", "gclid", "fbclid"];

/// Lowercases scheme+host, strips tracking query params, drops trailing
/// slash and fragment. Deterministic across runs and platforms (spec §8 #1).
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(raw) else {
        return raw.trim().to_string();
    };

    let scheme = parsed.scheme().to_lowercase();
    let host = parsed.host_str().unwrap_or("").to_lowercase();
    let _ = parsed.set_scheme(&scheme);

    let retained: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }

    let mut normalized = format!("{scheme}://{host}{path}");
    if !retained.is_empty() {
        let query = retained.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&");
        normalized.push('?');
        normalized.push_str(&query);
    }
    normalized
}

/// Stable 64-bit hash of the normalized URL, used as the dedup primary key.
pub fn hash_url(normalized: &str) -> String {
    format!("{:016x}", xxhash_rust::xxh3::xxh3_64(normalized.as_bytes()))
}

pub struct Tracker {
    pool: SqlitePool,
}

impl Tracker {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path != Path::new(":memory:") {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        let url = if path == Path::new(":memory:") {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite://{}?mode=rwc", path.display())
        };
        let pool = SqlitePoolOptions::new().connect(&url).await?;
        apply_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn is_scraped(&self, url: &str) -> Result<bool> {
        let hash = hash_url(&normalize_url(url));
        let row: Option<(i64,)> = sqlx::query_as("SELECT scrape_count FROM tracker_entries WHERE url_hash = ?")
            .bind(&hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Records the outcome of a scrape attempt, upserting by url_hash (spec
    /// §4.5 contract, §8 testable property 7 relies on this only being called
    /// for confirmed, non-stale-session results).
    pub async fn record_result(&self, url: &str, success: bool, quality_score: f64) -> Result<()> {
        let normalized = normalize_url(url);
        let hash = hash_url(&normalized);
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO tracker_entries
                (url_hash, property_url, first_seen_at, last_scraped_at, data_quality_score, extraction_success, scrape_count)
            VALUES (?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(url_hash) DO UPDATE SET
                last_scraped_at = excluded.last_scraped_at,
                data_quality_score = excluded.data_quality_score,
                extraction_success = excluded.extraction_success,
                scrape_count = scrape_count + 1
            "#,
        )
        .bind(&hash)
        .bind(&normalized)
        .bind(now)
        .bind(now)
        .bind(quality_score)
        .bind(success)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn lookup(&self, url_hash: &str) -> Result<Option<TrackerEntry>> {
        let row = sqlx::query_as::<_, TrackerEntry>(
            "SELECT url_hash, property_url, first_seen_at, last_scraped_at, data_quality_score, extraction_success, scrape_count
             FROM tracker_entries WHERE url_hash = ?",
        )
        .bind(url_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Decides, per spec §4.5, which of `urls` should be (re-)scraped. Returns
    /// the included URLs plus a bucket-count summary for logging.
    pub async fn smart_filter(&self, urls: &[String], quality_threshold: f64, ttl_days: i64) -> Result<(Vec<String>, SmartFilterSummary)> {
        let mut included = Vec::new();
        let mut summary = SmartFilterSummary::default();
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(ttl_days);

        for url in urls {
            let normalized = normalize_url(url);
            let hash = hash_url(&normalized);
            let label = match self.lookup(&hash).await? {
                None => SmartFilterLabel::New,
                Some(entry) if !entry.extraction_success => SmartFilterLabel::FailedExtraction,
                Some(entry) if entry.data_quality_score < quality_threshold => SmartFilterLabel::LowQuality,
                Some(entry) if entry.last_scraped_at < cutoff => SmartFilterLabel::Stale,
                Some(_) => SmartFilterLabel::SkipGood,
            };
            summary.record(label);
            if label.should_include() {
                included.push(url.clone());
            } else {
                debug!(%url, "smart_filter: {}", label.as_str());
            }
        }

        info!(
            new = summary.new,
            failed_extraction = summary.failed_extraction,
            low_quality = summary.low_quality,
            stale = summary.stale,
            skip_good = summary.skip_good,
            reduction_pct = summary.reduction_pct(),
            "smart_filter summary"
        );

        Ok((included, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_tracking_params_and_trailing_slash() {
        let a = normalize_url("HTTPS://Example.com/property/123/?utm_source=fb&page=2");
        assert_eq!(a, "https://example.com/property/123?page=2");
    }

    #[test]
    fn hash_is_deterministic() {
        let n = normalize_url("https://example.com/a");
        assert_eq!(hash_url(&n), hash_url(&n));
    }

    #[tokio::test]
    async fn smart_filter_skips_good_recent_entries() {
        let tracker = Tracker::open(":memory:").await.unwrap();
        let url = "https://example.com/pdpid-1".to_string();
        tracker.record_result(&url, true, 90.0).await.unwrap();

        let (included, summary) = tracker.smart_filter(&[url], 60.0, 30).await.unwrap();
        assert!(included.is_empty());
        assert_eq!(summary.skip_good, 1);
    }

    #[tokio::test]
    async fn smart_filter_includes_unseen_urls() {
        let tracker = Tracker::open(":memory:").await.unwrap();
        let url = "https://example.com/pdpid-new".to_string();
        let (included, summary) = tracker.smart_filter(&[url.clone()], 60.0, 30).await.unwrap();
        assert_eq!(included, vec![url]);
        assert_eq!(summary.new, 1);
    }

    #[tokio::test]
    async fn smart_filter_includes_low_quality_entries() {
        let tracker = Tracker::open(":memory:").await.unwrap();
        let url = "https://example.com/pdpid-lowq".to_string();
        tracker.record_result(&url, true, 20.0).await.unwrap();
        let (included, summary) = tracker.smart_filter(&[url], 60.0, 30).await.unwrap();
        assert_eq!(included.len(), 1);
        assert_eq!(summary.low_quality, 1);
    }
}
