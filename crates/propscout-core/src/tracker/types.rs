use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-URL history row (spec §3.2). Updated on every PDP attempt.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackerEntry {
    pub url_hash: String,
    pub property_url: String,
    pub first_seen_at: DateTime<Utc>,
    pub last_scraped_at: DateTime<Utc>,
    pub data_quality_score: f64,
    pub extraction_success: bool,
    pub scrape_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartFilterLabel {
    New,
    FailedExtraction,
    LowQuality,
    Stale,
    SkipGood,
}

impl SmartFilterLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            SmartFilterLabel::New => "NEW",
            SmartFilterLabel::FailedExtraction => "FAILED-EXTRACTION",
            SmartFilterLabel::LowQuality => "LOW-QUALITY",
            SmartFilterLabel::Stale => "STALE",
            SmartFilterLabel::SkipGood => "SKIP-GOOD",
        }
    }

    pub fn should_include(self) -> bool {
        !matches!(self, SmartFilterLabel::SkipGood)
    }
}

/// Bucket counts for one smart_filter invocation (spec §4.5).
#[derive(Debug, Clone, Default)]
pub struct SmartFilterSummary {
    pub new: u64,
    pub failed_extraction: u64,
    pub low_quality: u64,
    pub stale: u64,
    pub skip_good: u64,
}

impl SmartFilterSummary {
    pub fn record(&mut self, label: SmartFilterLabel) {
        match label {
            SmartFilterLabel::New => self.new += 1,
            SmartFilterLabel::FailedExtraction => self.failed_extraction += 1,
            SmartFilterLabel::LowQuality => self.low_quality += 1,
            SmartFilterLabel::Stale => self.stale += 1,
            SmartFilterLabel::SkipGood => self.skip_good += 1,
        }
    }

    pub fn total_considered(&self) -> u64 {
        self.new + self.failed_extraction + self.low_quality + self.stale + self.skip_good
    }

    pub fn total_included(&self) -> u64 {
        self.new + self.failed_extraction + self.low_quality + self.stale
    }

    /// Percentage of considered URLs that were skipped, i.e. the throughput
    /// win smart-filtering delivers.
    pub fn reduction_pct(&self) -> f64 {
        let total = self.total_considered();
        if total == 0 {
            return 0.0;
        }
        (self.skip_good as f64 / total as f64) * 100.0
    }
}
