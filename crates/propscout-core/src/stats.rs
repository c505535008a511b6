use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Controls sort-order of listings, stopping criteria, and whether tracker
/// filtering applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScrapingMode {
    Full,
    Incremental,
    Conservative,
    DateRange,
    Custom,
}

impl ScrapingMode {
    /// Non-FULL modes sort listings newest-first and use the incremental
    /// stop predicate (spec §4.6 step 2).
    pub fn sorts_newest_first(self) -> bool {
        !matches!(self, ScrapingMode::Full)
    }

    pub fn uses_tracker_filtering(self) -> bool {
        !matches!(self, ScrapingMode::Full)
    }
}

impl std::str::FromStr for ScrapingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "FULL" => Ok(ScrapingMode::Full),
            "INCREMENTAL" => Ok(ScrapingMode::Incremental),
            "CONSERVATIVE" => Ok(ScrapingMode::Conservative),
            "DATE_RANGE" | "DATERANGE" => Ok(ScrapingMode::DateRange),
            "CUSTOM" => Ok(ScrapingMode::Custom),
            other => Err(format!("unrecognized scraping mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterStats {
    pub total: u64,
    pub filtered: u64,
    pub excluded: u64,
}

impl FilterStats {
    pub fn record_pass(&mut self) {
        self.total += 1;
        self.filtered += 1;
    }

    pub fn record_exclusion(&mut self) {
        self.total += 1;
        self.excluded += 1;
    }

    /// Testable property #4: total = filtered + excluded.
    pub fn is_consistent(&self) -> bool {
        self.total == self.filtered + self.excluded
    }
}

/// Per-run counters, finalized by the Coordinator at the end of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub mode: ScrapingMode,
    pub pages_scraped: u32,
    pub properties_found: u64,
    pub properties_saved: u64,
    pub individual_properties_scraped: u64,
    pub incremental_stopped: bool,
    pub stop_reason: Option<String>,
    pub filter_stats: FilterStats,
}

impl SessionStats {
    pub fn new(session_id: u64, mode: ScrapingMode) -> Self {
        Self {
            session_id,
            start_time: Utc::now(),
            end_time: None,
            mode,
            pages_scraped: 0,
            properties_found: 0,
            properties_saved: 0,
            individual_properties_scraped: 0,
            incremental_stopped: false,
            stop_reason: None,
            filter_stats: FilterStats::default(),
        }
    }

    pub fn finalize(&mut self) {
        self.end_time = Some(Utc::now());
    }
}
