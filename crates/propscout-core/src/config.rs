use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Rate-limit and threshold values are configuration data, never constants
/// baked into leaf components (spec design note: "rate-limit as data, not
/// code"). `RuntimeConfig::default()` holds the spec's stated defaults;
/// `merge` overlays per-call overrides supplied by the CLI or a library
/// caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub page_delay_min_secs: f64,
    pub page_delay_max_secs: f64,

    pub pdp_batch_size: usize,
    pub pdp_concurrency: usize,
    pub pdp_jitter_min_secs: f64,
    pub pdp_jitter_max_secs: f64,
    pub pdp_inter_batch_min_secs: f64,
    pub pdp_inter_batch_max_secs: f64,
    pub pdp_worker_timeout_secs: u64,
    pub max_url_failures: u32,
    pub max_retries: u32,

    pub quality_threshold: f64,
    pub ttl_days: i64,

    pub cooldown_hard_base_secs: u64,
    pub cooldown_soft_base_secs: u64,
    pub cooldown_max_secs: u64,
    pub segment_cooldown_base_secs: u64,
    pub segment_cooldown_max_secs: u64,
    pub segment_cooldown_attempt_cap_secs: u64,

    pub consecutive_failure_budget: u32,
    pub min_cards_per_page: usize,

    pub incremental_stop_threshold_pct: f64,
    pub incremental_stop_hysteresis_pct: f64,

    pub individual_pages: bool,
    pub force_rescrape: bool,
    pub randomize_viewport: bool,
    pub block_resources: bool,
    pub headless: bool,
    pub simulate_human_gestures: bool,

    pub export_formats: HashSet<ExportFormat>,
    pub output_dir: String,
    pub browser_binary_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Spreadsheet,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "spreadsheet" | "xlsx" => Ok(ExportFormat::Spreadsheet),
            other => Err(format!("unrecognized export format: {other}")),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        let mut export_formats = HashSet::new();
        export_formats.insert(ExportFormat::Csv);
        export_formats.insert(ExportFormat::Json);

        Self {
            page_delay_min_secs: 1.5,
            page_delay_max_secs: 4.0,

            pdp_batch_size: 20,
            pdp_concurrency: 1,
            pdp_jitter_min_secs: 0.2,
            pdp_jitter_max_secs: 0.9,
            pdp_inter_batch_min_secs: 3.0,
            pdp_inter_batch_max_secs: 6.0,
            pdp_worker_timeout_secs: 45,
            max_url_failures: 3,
            max_retries: 3,

            quality_threshold: 60.0,
            ttl_days: 30,

            cooldown_hard_base_secs: 120,
            cooldown_soft_base_secs: 45,
            cooldown_max_secs: 900,
            segment_cooldown_base_secs: 90,
            segment_cooldown_max_secs: 900,
            segment_cooldown_attempt_cap_secs: 15,

            consecutive_failure_budget: 5,
            min_cards_per_page: 10,

            incremental_stop_threshold_pct: 65.0,
            incremental_stop_hysteresis_pct: 40.0,

            individual_pages: false,
            force_rescrape: false,
            randomize_viewport: false,
            block_resources: false,
            headless: true,
            simulate_human_gestures: false,

            export_formats,
            output_dir: "output".to_string(),
            browser_binary_path: None,
        }
    }
}

/// Per-field override; `None` leaves the default/previously merged value in place.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfigOverrides {
    pub pdp_batch_size: Option<usize>,
    pub pdp_concurrency: Option<usize>,
    pub quality_threshold: Option<f64>,
    pub ttl_days: Option<i64>,
    pub individual_pages: Option<bool>,
    pub force_rescrape: Option<bool>,
    pub headless: Option<bool>,
    pub export_formats: Option<HashSet<ExportFormat>>,
    pub output_dir: Option<String>,
    pub browser_binary_path: Option<String>,
}

impl RuntimeConfig {
    pub fn merge(mut self, overrides: RuntimeConfigOverrides) -> Self {
        if let Some(v) = overrides.pdp_batch_size {
            self.pdp_batch_size = v;
        }
        if let Some(v) = overrides.pdp_concurrency {
            self.pdp_concurrency = v;
        }
        if let Some(v) = overrides.quality_threshold {
            self.quality_threshold = v;
        }
        if let Some(v) = overrides.ttl_days {
            self.ttl_days = v;
        }
        if let Some(v) = overrides.individual_pages {
            self.individual_pages = v;
        }
        if let Some(v) = overrides.force_rescrape {
            self.force_rescrape = v;
        }
        if let Some(v) = overrides.headless {
            self.headless = v;
        }
        if let Some(v) = overrides.export_formats {
            self.export_formats = v;
        }
        if let Some(v) = overrides.output_dir {
            self.output_dir = v;
        }
        if let Some(v) = overrides.browser_binary_path {
            self.browser_binary_path = Some(v);
        }
        self
    }
}
