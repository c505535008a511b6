use crate::anti_detection::AntiDetectionController;
use crate::browser::{is_restart_trigger, BrowserSession};
use crate::city_slugs::resolve_slug;
use crate::date_text::PostingDateParser;
use crate::error::Result;
use crate::extractor::{extract_card, locate_cards};
use chrono::{DateTime, Utc};
use propscout_core::{FilterConfig, PropertyRecord, RuntimeConfig, ScrapingMode, SessionStats, Validator};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Path suffix the portal appends to `/property-for-sale-in-<slug>` listing
/// URLs (spec §6 target site contract). Kept as a single named constant per
/// the DOM-extractor pluggability design note rather than inlined below.
const LISTING_PATH_SUFFIX: &str = "ppfs";

const SORT_DATE_DESC_PARAM: &str = "sort=date_desc";

fn base_host() -> Url {
    Url::parse("https://www.example-realty.test").expect("static base host parses")
}

fn listing_url(city_slug: &str, page: u32, sort_newest_first: bool) -> String {
    let mut url = base_host();
    url.set_path(&format!("/property-for-sale-in-{city_slug}-{LISTING_PATH_SUFFIX}"));

    let mut query_parts = Vec::new();
    if page > 1 {
        query_parts.push(format!("page={page}"));
    }
    if sort_newest_first {
        query_parts.push(SORT_DATE_DESC_PARAM.to_string());
    }
    if !query_parts.is_empty() {
        url.set_query(Some(&query_parts.join("&")));
    }
    url.to_string()
}

/// Outcome of one traversal run (spec §4.6 contract). `last_listing_url` is
/// handed to the PDP engine so its first Referer looks organic (spec §4.7
/// stage 3 "Navigate").
pub struct TraversalOutcome {
    pub records: Vec<PropertyRecord>,
    pub last_listing_url: Option<String>,
}

/// Per-page sample used by the incremental stop predicate.
fn old_posting_pct(records: &[PropertyRecord], top_k: usize, previous_high_water: DateTime<Utc>) -> Option<f64> {
    let mut dated: Vec<DateTime<Utc>> = records.iter().filter_map(|r| r.posting_date_parsed).collect();
    dated.truncate(top_k.min(dated.len()));
    if dated.is_empty() {
        return None;
    }
    let older = dated.iter().filter(|d| **d < previous_high_water).count();
    Some((older as f64 / dated.len() as f64) * 100.0)
}

/// Iterates paginated listing URLs, extracting cards and deciding when to
/// stop based on posting age (spec §4.6 contract).
#[allow(clippy::too_many_arguments)]
pub async fn traverse(
    browser: &Mutex<BrowserSession>,
    anti_detection: &AntiDetectionController,
    date_parser: &dyn PostingDateParser,
    city: &str,
    mode: ScrapingMode,
    max_pages: u32,
    config: &RuntimeConfig,
    filters: &FilterConfig,
    previous_high_water: Option<DateTime<Utc>>,
    stats: &mut SessionStats,
) -> Result<TraversalOutcome> {
    let city_slug = resolve_slug(city);
    let sort_newest_first = mode.sorts_newest_first();
    let base_url = base_host();

    let mut records = Vec::new();
    let mut consecutive_failures: u32 = 0;
    let mut previous_page_old_pct: Option<f64> = None;
    let mut last_listing_url: Option<String> = None;

    for page in 1..=max_pages {
        let page_url = listing_url(&city_slug, page, sort_newest_first);
        let mut load_ok = false;
        let mut html = String::new();

        'attempt: for attempt in 0..3 {
            let navigate_result = browser.lock().await.navigate(&page_url, None).await;
            match navigate_result {
                Ok(outcome) => {
                    if anti_detection.inspect(&outcome.html, &outcome.title, &outcome.final_url) {
                        anti_detection
                            .handle_detection(|| async {
                                let _ = browser.lock().await.restart().await;
                            })
                            .await;
                        continue 'attempt;
                    }
                    html = outcome.html;
                    load_ok = true;
                    anti_detection.reset_failures();
                    break 'attempt;
                }
                Err(e) => {
                    warn!(page, attempt, error = %e, "traversal: navigation failed");
                    anti_detection.record_failure();
                    if is_restart_trigger(&e.to_string()) {
                        let _ = browser.lock().await.restart().await;
                    }
                }
            }
        }

        if !load_ok {
            consecutive_failures += 1;
            if consecutive_failures > config.consecutive_failure_budget {
                stats.stop_reason = Some(format!("aborted: {consecutive_failures} consecutive page failures"));
                warn!(page, "traversal: consecutive failure budget exhausted, aborting run");
                break;
            }
            continue;
        }

        let (card_htmls, selector_used) = locate_cards(&html, config.min_cards_per_page);
        if card_htmls.is_empty() {
            consecutive_failures += 1;
            warn!(page, "traversal: zero cards found on page, treating as hard failure");
            if consecutive_failures > config.consecutive_failure_budget {
                stats.stop_reason = Some(format!("aborted: {consecutive_failures} consecutive page failures"));
                break;
            }
            continue;
        }
        consecutive_failures = 0;
        if card_htmls.len() < config.min_cards_per_page {
            warn!(page, count = card_htmls.len(), selector = selector_used, "traversal: fewer cards than expected, continuing");
        }

        stats.pages_scraped += 1;
        let mut page_records = Vec::with_capacity(card_htmls.len());

        for (position, card_html) in card_htmls.iter().enumerate() {
            let extracted = extract_card(card_html, &base_url, city, &[city_slug.clone()]);
            stats.properties_found += 1;

            let mut record = Validator::validate_and_clean(extracted.raw, page, position as u32, stats.session_id);

            let primary_parsed = date_parser.parse(&record.posting_date_raw, Utc::now());
            let secondary_parsed = extracted
                .secondary_posting_date_text
                .as_deref()
                .and_then(|t| date_parser.parse(t, Utc::now()));

            record.posting_date_parsed = match (primary_parsed, secondary_parsed) {
                (Some(a), Some(b)) => {
                    if a != b {
                        debug!(primary = %a, secondary = %b, url = %record.url, "traversal: dual posting-date elements disagree, using earlier timestamp as canonical");
                    }
                    Some(a.min(b))
                }
                (Some(a), None) => Some(a),
                (None, Some(b)) => Some(b),
                (None, None) => None,
            };
            if let Some(secondary_text) = extracted.secondary_posting_date_text {
                record.extended_fields.insert("secondary_posting_date_raw".to_string(), secondary_text);
            }

            if !record.has_minimum_content(record.is_premium) {
                continue;
            }
            if !Validator::apply_filters(&record, filters, &mut stats.filter_stats) {
                continue;
            }

            stats.properties_saved += 1;
            page_records.push(record);
        }

        last_listing_url = Some(page_url.clone());

        let mut stop_now = false;
        if mode != ScrapingMode::Full {
            if let Some(high_water) = previous_high_water {
                if let Some(pct) = old_posting_pct(&page_records, 20, high_water) {
                    let stopped = pct >= config.incremental_stop_threshold_pct
                        && previous_page_old_pct.map(|p| p >= config.incremental_stop_hysteresis_pct).unwrap_or(page == 1);
                    if stopped {
                        stats.incremental_stopped = true;
                        stats.stop_reason = Some(format!("old_postings: {pct:.1}% of page {page} predate previous high-water mark"));
                        info!(page, pct, "traversal: incremental stop triggered");
                        stop_now = true;
                    }
                    previous_page_old_pct = Some(pct);
                }
            }
        }
        records.append(&mut page_records);
        if stop_now {
            break;
        }

        if page < max_pages {
            let delay = anti_detection.choose_delay(page, config.page_delay_min_secs, config.page_delay_max_secs);
            tokio::time::sleep(delay).await;
        }
    }

    Ok(TraversalOutcome { records, last_listing_url })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_url_uses_bare_path_on_page_one() {
        let url = listing_url("new-delhi", 1, false);
        assert!(url.ends_with("property-for-sale-in-new-delhi-ppfs"));
        assert!(!url.contains('?'));
    }

    #[test]
    fn listing_url_adds_page_param_and_sort_param() {
        let url = listing_url("pune", 3, true);
        assert!(url.contains("page=3"));
        assert!(url.contains("sort=date_desc"));
    }

    #[test]
    fn old_posting_pct_counts_only_parsed_dates() {
        use chrono::TimeZone;
        let high_water = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut old = sample_record();
        old.posting_date_parsed = Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        let mut unparsed = sample_record();
        unparsed.posting_date_parsed = None;
        let records = vec![old, unparsed];
        let pct = old_posting_pct(&records, 20, high_water).unwrap();
        assert_eq!(pct, 100.0);
    }

    fn sample_record() -> PropertyRecord {
        Validator::validate_and_clean(propscout_core::RawFields::default(), 1, 0, 1)
    }
}
