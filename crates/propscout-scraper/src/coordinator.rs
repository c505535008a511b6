use crate::anti_detection::AntiDetectionController;
use crate::browser::{BrowserOptions, BrowserSession};
use crate::date_text::{HeuristicDateParser, PostingDateParser};
use crate::error::{Result, ScrapeError};
use crate::pdp_engine::{scrape_pdps, BatchQualityMetrics};
use crate::traversal::traverse;
use chrono::{DateTime, Utc};
use propscout_core::{Exporter, FilterConfig, PropertyRecord, RuntimeConfig, ScrapingMode, SessionStats, Tracker};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> u64 {
    SESSION_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Everything the Coordinator handed back to its caller (spec §4.8 contract):
/// the final merged records, the paths written by the exporter, and the
/// session's final stats.
pub struct CoordinatorOutcome {
    pub records: Vec<PropertyRecord>,
    pub export_paths: Vec<PathBuf>,
    pub stats: SessionStats,
}

/// Orchestrates a full run: start session, run traversal, pipe to the PDP
/// engine, finalize, export (spec §4.8 contract). `tracker_path` is `None`
/// when Tracker persistence is disabled; `previous_high_water` seeds the
/// incremental stop predicate from the last completed run (spec §4.6, §9
/// high-water-mark glossary entry).
pub async fn run_session(
    city: &str,
    mode: ScrapingMode,
    max_pages: u32,
    config: RuntimeConfig,
    filters: FilterConfig,
    tracker_path: Option<PathBuf>,
    previous_high_water: Option<DateTime<Utc>>,
) -> Result<CoordinatorOutcome> {
    let session_id = next_session_id();
    let mut stats = SessionStats::new(session_id, mode);
    info!(session_id, city, ?mode, max_pages, "coordinator: starting session");

    if !config.output_dir.is_empty() {
        std::fs::create_dir_all(&config.output_dir)
            .map_err(|e| ScrapeError::Config(format!("cannot create output directory {}: {e}", config.output_dir)))?;
    }

    let tracker = match tracker_path {
        Some(path) => Some(Arc::new(Tracker::open(&path).await.map_err(|e| ScrapeError::Config(format!("tracker store unavailable: {e}")))?)),
        None => None,
    };

    let user_agent_pool_seed = crate::user_agents::USER_AGENTS[0].to_string();
    let browser_options = BrowserOptions {
        headless: config.headless,
        randomize_viewport: config.randomize_viewport,
        block_resources: config.block_resources,
        eager_page_load: true,
        browser_binary_path: config.browser_binary_path.clone(),
        user_agent: user_agent_pool_seed,
    };

    let mut browser_session = BrowserSession::new(browser_options);
    browser_session.start().await?;
    let browser = Arc::new(Mutex::new(browser_session));
    let anti_detection = Arc::new(AntiDetectionController::new());
    let date_parser: Box<dyn PostingDateParser> = Box::new(HeuristicDateParser);

    let traversal_result = {
        let browser_guard = browser.clone();
        let anti_detection_guard = anti_detection.clone();
        traverse(
            &*browser_guard,
            &*anti_detection_guard,
            date_parser.as_ref(),
            city,
            mode,
            max_pages,
            &config,
            &filters,
            previous_high_water,
            &mut stats,
        )
        .await
    };

    let traversal_outcome = match traversal_result {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(error = %e, "coordinator: traversal failed, finalizing with whatever was gathered so far");
            browser.lock().await.quit().await.ok();
            stats.finalize();
            return Err(e);
        }
    };

    let mut buffer = traversal_outcome.records;

    if config.individual_pages {
        let candidate_urls: Vec<String> = buffer
            .iter()
            .filter(|r| !r.url.trim().is_empty())
            .map(|r| r.url.clone())
            .collect();

        if candidate_urls.is_empty() {
            info!("coordinator: individual_pages requested but no non-empty PDP URLs were collected");
        } else {
            let outcome = scrape_pdps(
                browser.clone(),
                anti_detection.clone(),
                tracker.clone(),
                &mut buffer,
                candidate_urls,
                config.clone(),
                city,
                traversal_outcome.last_listing_url.clone(),
            )
            .await;

            stats.individual_properties_scraped = outcome.merged_count as u64;
            log_pdp_completeness_summary(&outcome.batch_metrics);
            // Tracker writes happen per-URL inside scrape_pdps/attempt_url, right
            // after each PDP attempt resolves, not here: this point only sees the
            // merged buffer, which also holds listing-only and smart-filter
            // skip-good records that were never actually fetched this run.
        }
    }

    // Post-PDP validation sweep: records that became invalid after merge are dropped (spec §4.8 step 5).
    let before = buffer.len();
    buffer.retain(|r| r.has_minimum_content(r.is_premium));
    let dropped = before - buffer.len();
    if dropped > 0 {
        warn!(dropped, "coordinator: post-PDP validation sweep dropped records that became invalid after merge");
    }

    let export_formats = config.export_formats.clone();
    let output_dir = PathBuf::from(&config.output_dir);
    let mode_label = format!("{mode:?}").to_lowercase();

    browser.lock().await.quit().await.ok();

    stats.properties_saved = buffer.len() as u64;
    stats.finalize();

    let export_paths = Exporter::export(&buffer, &stats, &export_formats, &output_dir, &mode_label)?;

    info!(
        session_id,
        pages_scraped = stats.pages_scraped,
        properties_saved = stats.properties_saved,
        individual_properties_scraped = stats.individual_properties_scraped,
        incremental_stopped = stats.incremental_stopped,
        "coordinator: session finalized"
    );

    Ok(CoordinatorOutcome {
        records: buffer,
        export_paths,
        stats,
    })
}

fn log_pdp_completeness_summary(batch_metrics: &[BatchQualityMetrics]) {
    if batch_metrics.is_empty() {
        return;
    }
    let total: f64 = batch_metrics.iter().map(|m| m.avg_quality_score * m.batch_size as f64).sum();
    let count: usize = batch_metrics.iter().map(|m| m.batch_size).sum();
    if count == 0 {
        return;
    }
    info!(
        batches = batch_metrics.len(),
        overall_avg_quality = total / count as f64,
        "coordinator: PDP phase field-completeness summary"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_pdp_completeness_summary_handles_empty_metrics() {
        // Should not panic on an empty slice (no PDP batches ran).
        log_pdp_completeness_summary(&[]);
    }
}
