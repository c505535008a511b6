use crate::anti_detection::AntiDetectionController;
use crate::browser::{is_restart_trigger, BrowserSession};
use crate::extractor::extract_pdp;
use propscout_core::{cooldown::segment_key, CooldownTracker, PropertyRecord, RuntimeConfig, Tracker, Validator};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Per-batch average field-completeness metrics, logged at each batch
/// boundary (spec §4.7 stage 4).
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct BatchQualityMetrics {
    pub batch_size: usize,
    pub avg_quality_score: f64,
    pub success_count: usize,
}

pub struct PdpEngineOutcome {
    pub merged_count: usize,
    pub batch_metrics: Vec<BatchQualityMetrics>,
}

/// Outcome of one worker's attempt at a single URL.
enum AttemptOutcome {
    Success(PropertyRecord),
    SoftFailure,
    HardFailure,
    SkippedStaleSession,
}

/// State shared across concurrent PDP workers within a batch. Workers
/// contend on `browser` for the duration of a single navigate+extract cycle
/// rather than each owning their own tab, matching the single-shared-browser
/// default concurrency model (spec §5 cyclic-reference resolution).
struct SharedWorkerState {
    anti_detection: Arc<AntiDetectionController>,
    cooldowns: Mutex<CooldownTracker>,
    last_listing_url: Mutex<Option<String>>,
    config: RuntimeConfig,
    city: String,
    session_at_start: u64,
    tracker: Option<Arc<Tracker>>,
}

/// Accepts a batch of PDP URLs, applies smart filtering, and dispatches to
/// workers (sequential or bounded-concurrent) with cooldown/backoff
/// discipline (spec §4.7 contract). `buffer` is the listing-phase record set,
/// updated in place by url_hash as PDP results arrive.
#[allow(clippy::too_many_arguments)]
pub async fn scrape_pdps(
    browser: Arc<Mutex<BrowserSession>>,
    anti_detection: Arc<AntiDetectionController>,
    tracker: Option<Arc<Tracker>>,
    buffer: &mut Vec<PropertyRecord>,
    urls: Vec<String>,
    config: RuntimeConfig,
    city: &str,
    referer_seed: Option<String>,
) -> PdpEngineOutcome {
    let candidate_urls = if config.force_rescrape {
        info!("pdp_engine: force_rescrape set, skipping smart filter");
        urls
    } else if let Some(tracker) = tracker.as_deref() {
        match tracker.smart_filter(&urls, config.quality_threshold, config.ttl_days).await {
            Ok((included, summary)) => {
                info!(
                    new = summary.new,
                    failed_extraction = summary.failed_extraction,
                    low_quality = summary.low_quality,
                    stale = summary.stale,
                    skip_good = summary.skip_good,
                    reduction_pct = summary.reduction_pct(),
                    "pdp_engine: smart_filter reduced {} URLs to {}",
                    urls.len(),
                    included.len()
                );
                included
            }
            Err(e) => {
                warn!(error = %e, "pdp_engine: smart_filter failed, scraping all candidates");
                urls
            }
        }
    } else {
        urls
    };

    let session_at_start = browser.lock().await.session_id();

    let shared = Arc::new(SharedWorkerState {
        anti_detection,
        cooldowns: Mutex::new(CooldownTracker::new()),
        last_listing_url: Mutex::new(referer_seed),
        config: config.clone(),
        city: city.to_string(),
        session_at_start,
        tracker,
    });

    let mut batch_metrics = Vec::new();
    let mut merged_count = 0usize;

    for (batch_index, batch) in candidate_urls.chunks(config.pdp_batch_size).enumerate() {
        info!(batch = batch_index + 1, size = batch.len(), "pdp_engine: dispatching batch");

        let concurrency = config.pdp_concurrency.max(1).min(batch.len().max(1));
        let batch_records = if concurrency <= 1 {
            let mut records = Vec::new();
            for url in batch {
                let outcome = attempt_url(&browser, &shared, url).await;
                if let AttemptOutcome::Success(record) = outcome {
                    records.push(record);
                }
            }
            records
        } else {
            dispatch_concurrent_batch(&browser, &shared, batch, concurrency, batch_index).await
        };

        if !batch_records.is_empty() {
            let metrics = compute_batch_metrics(&batch_records);
            info!(
                batch = batch_index + 1,
                avg_quality = metrics.avg_quality_score,
                successes = metrics.success_count,
                "pdp_engine: batch quality metrics"
            );
            batch_metrics.push(metrics);
        }

        for pdp_record in batch_records {
            if let Some(existing) = buffer.iter_mut().find(|r| r.url_hash == pdp_record.url_hash) {
                existing.merge_pdp(pdp_record);
            } else {
                buffer.push(pdp_record);
            }
            merged_count += 1;
        }

        let is_last_batch = (batch_index + 1) * config.pdp_batch_size >= candidate_urls.len();
        if !is_last_batch {
            let mut rng = rand::thread_rng();
            let secs = rng.gen_range(config.pdp_inter_batch_min_secs..=config.pdp_inter_batch_max_secs);
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        }
    }

    PdpEngineOutcome { merged_count, batch_metrics }
}

/// Runs up to `concurrency` workers at once, each contending on the shared
/// browser mutex for its navigate+extract critical section. A stale-session
/// result (the browser restarted under us) drains the remaining tasks in
/// this batch rather than starting new ones (spec §4.7 stage 5).
async fn dispatch_concurrent_batch(
    browser: &Arc<Mutex<BrowserSession>>,
    shared: &Arc<SharedWorkerState>,
    batch: &[String],
    concurrency: usize,
    batch_index: usize,
) -> Vec<PropertyRecord> {
    let mut records = Vec::new();
    let mut pending = batch.iter().cloned();
    let mut in_flight = JoinSet::new();

    for url in pending.by_ref().take(concurrency) {
        let browser = browser.clone();
        let shared = shared.clone();
        in_flight.spawn(async move { attempt_url(&browser, &shared, &url).await });
    }

    let mut aborted = false;
    while let Some(joined) = in_flight.join_next().await {
        match joined {
            Ok(AttemptOutcome::Success(record)) => records.push(record),
            Ok(AttemptOutcome::SkippedStaleSession) => {
                if !aborted {
                    warn!(batch = batch_index + 1, "pdp_engine: stale session detected mid-batch, draining in-flight workers");
                    aborted = true;
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "pdp_engine: worker task panicked"),
        }

        if aborted {
            continue;
        }
        if let Some(url) = pending.next() {
            let browser = browser.clone();
            let shared = shared.clone();
            in_flight.spawn(async move { attempt_url(&browser, &shared, &url).await });
        }
    }

    records
}

/// Writes a Tracker result for one URL-level outcome under the session that
/// was live at batch start. A worker whose browser has since restarted
/// (`session_at_start` stale) must not write, since its `outcome` no longer
/// reflects the current run (spec §8 #7).
async fn record_tracker_result(shared: &SharedWorkerState, browser: &Arc<Mutex<BrowserSession>>, url: &str, success: bool, quality: f64) {
    let Some(tracker) = shared.tracker.as_deref() else { return };
    if browser.lock().await.session_id() != shared.session_at_start {
        return;
    }
    if let Err(e) = tracker.record_result(url, success, quality).await {
        warn!(url, error = %e, "pdp_engine: failed to record tracker result");
    }
}

async fn attempt_url(browser: &Arc<Mutex<BrowserSession>>, shared: &SharedWorkerState, url: &str) -> AttemptOutcome {
    let config = &shared.config;
    let cooldowns = &shared.cooldowns;
    let segment = segment_key(url);

    {
        let c = cooldowns.lock().await;
        if c.url_in_cooldown(url) {
            debug!(url, "pdp_engine: url in cooldown, skipping");
            return AttemptOutcome::SoftFailure;
        }
        if c.segment_in_cooldown(&segment) {
            drop(c);
            let remaining = cooldowns.lock().await.segment_remaining(&segment);
            let wait = remaining.min(Duration::from_secs(config.segment_cooldown_attempt_cap_secs));
            debug!(segment, wait_secs = wait.as_secs_f64(), "pdp_engine: segment in cooldown, waiting bounded portion");
            tokio::time::sleep(wait).await;
            if cooldowns.lock().await.segment_in_cooldown(&segment) {
                return AttemptOutcome::SoftFailure;
            }
        }
    }

    if cooldowns.lock().await.url_failure_count(url) >= config.max_url_failures {
        return AttemptOutcome::SoftFailure;
    }

    for attempt in 0..config.max_retries {
        let jitter = {
            let mut rng = rand::thread_rng();
            rng.gen_range(config.pdp_jitter_min_secs..=config.pdp_jitter_max_secs)
        };
        tokio::time::sleep(Duration::from_secs_f64(jitter)).await;

        let mut guard = browser.lock().await;
        if guard.session_id() != shared.session_at_start {
            return AttemptOutcome::SkippedStaleSession;
        }

        if config.simulate_human_gestures {
            let _ = guard.simulate_human_gesture().await;
        }

        let referer = shared.last_listing_url.lock().await.clone();
        let navigate_result = tokio::time::timeout(
            Duration::from_secs(config.pdp_worker_timeout_secs),
            guard.navigate(url, referer.as_deref()),
        )
        .await;

        let outcome = match navigate_result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(url, attempt, error = %e, "pdp_engine: navigation failed");
                if is_restart_trigger(&e.to_string()) {
                    let _ = guard.restart().await;
                }
                drop(guard);
                record_hard_failure(cooldowns, url, &segment, config).await;
                continue;
            }
            Err(_) => {
                warn!(url, attempt, "pdp_engine: worker wall-clock timeout");
                drop(guard);
                record_hard_failure(cooldowns, url, &segment, config).await;
                continue;
            }
        };
        drop(guard);

        if shared.anti_detection.inspect(&outcome.html, &outcome.title, &outcome.final_url) {
            record_hard_failure(cooldowns, url, &segment, config).await;
            shared
                .anti_detection
                .handle_detection(|| async {
                    let _ = browser.lock().await.restart().await;
                })
                .await;
            if cooldowns.lock().await.url_failure_count(url) >= config.max_url_failures {
                record_tracker_result(shared, browser, url, false, 0.0).await;
                return AttemptOutcome::HardFailure;
            }
            continue;
        }

        let fields = extract_pdp(&outcome.html, url, &shared.city);
        let has_title_or_price = !fields.raw.title.trim().is_empty() || !fields.raw.price_text.trim().is_empty();

        if !has_title_or_price {
            record_soft_failure(cooldowns, url, config).await;
            record_tracker_result(shared, browser, url, false, 0.0).await;
            if attempt + 1 < config.max_retries {
                let backoff = Duration::from_secs_f64(2f64.powi(attempt as i32));
                tokio::time::sleep(backoff).await;
                continue;
            }
            return AttemptOutcome::SoftFailure;
        }

        let mut record = Validator::validate_and_clean(fields.raw, 0, 0, shared.session_at_start);
        if !fields.description.is_empty() {
            record.extended_fields.insert("description".to_string(), fields.description);
        }
        if !fields.builder_name.is_empty() {
            record.extended_fields.insert("builder_name".to_string(), fields.builder_name);
        }
        if !fields.amenities.is_empty() {
            record.extended_fields.insert("amenities".to_string(), fields.amenities.join(", "));
        }
        if !fields.specifications.is_empty() {
            record.extended_fields.insert("specifications".to_string(), fields.specifications.join(", "));
        }

        cooldowns.lock().await.record_success(url, &segment);
        *shared.last_listing_url.lock().await = Some(url.to_string());
        record_tracker_result(shared, browser, url, true, record.data_quality_score).await;
        return AttemptOutcome::Success(record);
    }

    record_tracker_result(shared, browser, url, false, 0.0).await;
    AttemptOutcome::HardFailure
}

async fn record_hard_failure(cooldowns: &Mutex<CooldownTracker>, url: &str, segment: &str, config: &RuntimeConfig) {
    let mut c = cooldowns.lock().await;
    c.record_url_failure(
        url,
        true,
        Duration::from_secs(config.cooldown_hard_base_secs),
        Duration::from_secs(config.cooldown_soft_base_secs),
        Duration::from_secs(config.cooldown_max_secs),
    );
    c.record_segment_failure(segment, Duration::from_secs(config.segment_cooldown_base_secs), Duration::from_secs(config.segment_cooldown_max_secs));
}

async fn record_soft_failure(cooldowns: &Mutex<CooldownTracker>, url: &str, config: &RuntimeConfig) {
    let mut c = cooldowns.lock().await;
    c.record_url_failure(
        url,
        false,
        Duration::from_secs(config.cooldown_hard_base_secs),
        Duration::from_secs(config.cooldown_soft_base_secs),
        Duration::from_secs(config.cooldown_max_secs),
    );
}

fn compute_batch_metrics(records: &[PropertyRecord]) -> BatchQualityMetrics {
    let total: f64 = records.iter().map(|r| r.data_quality_score).sum();
    BatchQualityMetrics {
        batch_size: records.len(),
        avg_quality_score: if records.is_empty() { 0.0 } else { total / records.len() as f64 },
        success_count: records.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use propscout_core::RawFields;

    fn sample_record(quality: f64) -> PropertyRecord {
        let mut r = Validator::validate_and_clean(RawFields::default(), 0, 0, 1);
        r.data_quality_score = quality;
        r
    }

    #[test]
    fn compute_batch_metrics_averages_quality() {
        let records = vec![sample_record(0.4), sample_record(0.8)];
        let metrics = compute_batch_metrics(&records);
        assert_eq!(metrics.batch_size, 2);
        assert_eq!(metrics.success_count, 2);
        assert!((metrics.avg_quality_score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn compute_batch_metrics_handles_empty_batch() {
        let metrics = compute_batch_metrics(&[]);
        assert_eq!(metrics.batch_size, 0);
        assert_eq!(metrics.avg_quality_score, 0.0);
    }

    #[tokio::test]
    async fn record_hard_failure_also_cools_down_the_segment() {
        let cooldowns = Mutex::new(CooldownTracker::new());
        let config = RuntimeConfig::default();
        record_hard_failure(&cooldowns, "https://example.test/pdp-1", "pdp", &config).await;
        let c = cooldowns.lock().await;
        assert!(c.url_in_cooldown("https://example.test/pdp-1"));
        assert!(c.segment_in_cooldown("pdp"));
    }

    #[tokio::test]
    async fn record_soft_failure_cools_the_url_but_not_the_segment() {
        let cooldowns = Mutex::new(CooldownTracker::new());
        let config = RuntimeConfig::default();
        record_soft_failure(&cooldowns, "https://example.test/pdp-2", &config).await;
        let c = cooldowns.lock().await;
        assert!(c.url_in_cooldown("https://example.test/pdp-2"));
        assert!(!c.segment_in_cooldown("pdp"));
    }
}
