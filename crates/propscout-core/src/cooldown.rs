use std::collections::HashMap;
use std::time::{Duration, Instant};

/// One tracked entity's failure count and cooldown expiry.
#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    consecutive_failures: u32,
    cooldown_until: Option<Instant>,
}

/// In-memory per-URL and per-segment failure/cooldown state (spec §3.5).
/// Both maps are reset for an entity on its next successful scrape.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    urls: HashMap<String, Entry>,
    segments: HashMap<String, Entry>,
}

/// cooldown_until = now + min(base * 2^(failures-1), max)
fn backoff(failures: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u64.saturating_pow(failures.saturating_sub(1));
    let scaled = base.saturating_mul(factor as u32);
    scaled.min(max)
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url_in_cooldown(&self, url: &str) -> bool {
        self.urls
            .get(url)
            .and_then(|e| e.cooldown_until)
            .map(|until| Instant::now() < until)
            .unwrap_or(false)
    }

    pub fn segment_in_cooldown(&self, segment: &str) -> bool {
        self.segments
            .get(segment)
            .and_then(|e| e.cooldown_until)
            .map(|until| Instant::now() < until)
            .unwrap_or(false)
    }

    /// Remaining cooldown on a segment, or zero if none/expired.
    pub fn segment_remaining(&self, segment: &str) -> Duration {
        self.segments
            .get(segment)
            .and_then(|e| e.cooldown_until)
            .map(|until| until.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    /// Records a failure for `url`, recomputing its cooldown with the hard or
    /// soft base per spec §4.7's backoff policy.
    pub fn record_url_failure(&mut self, url: &str, hard: bool, base_hard: Duration, base_soft: Duration, max: Duration) {
        let entry = self.urls.entry(url.to_string()).or_default();
        entry.consecutive_failures += 1;
        let base = if hard { base_hard } else { base_soft };
        entry.cooldown_until = Some(Instant::now() + backoff(entry.consecutive_failures, base, max));
    }

    pub fn record_segment_failure(&mut self, segment: &str, base: Duration, max: Duration) {
        let entry = self.segments.entry(segment.to_string()).or_default();
        entry.consecutive_failures += 1;
        entry.cooldown_until = Some(Instant::now() + backoff(entry.consecutive_failures, base, max));
    }

    /// Resets both failure count and cooldown for `url` on success, and clears
    /// the owning segment's cooldown too (spec §4.7 step 3 "On success").
    pub fn record_success(&mut self, url: &str, segment: &str) {
        self.urls.remove(url);
        self.segments.remove(segment);
    }

    pub fn url_failure_count(&self, url: &str) -> u32 {
        self.urls.get(url).map(|e| e.consecutive_failures).unwrap_or(0)
    }
}

/// Derives a coarse locality-level grouping key from a PDP URL, used only for
/// segment-level cooldown bucketing. Falls back to the host when no obvious
/// locality-looking path segment is present.
pub fn segment_key(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(candidate) = segments.find(|s| s.len() > 3 && s.contains('-')) {
                return candidate.to_lowercase();
            }
        }
        return parsed.host_str().unwrap_or("unknown").to_lowercase();
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_caps_at_max() {
        let d = backoff(10, Duration::from_secs(120), Duration::from_secs(900));
        assert_eq!(d, Duration::from_secs(900));
    }

    #[test]
    fn backoff_grows_exponentially_before_cap() {
        assert_eq!(backoff(1, Duration::from_secs(120), Duration::from_secs(900)), Duration::from_secs(120));
        assert_eq!(backoff(2, Duration::from_secs(120), Duration::from_secs(900)), Duration::from_secs(240));
        assert_eq!(backoff(3, Duration::from_secs(120), Duration::from_secs(900)), Duration::from_secs(480));
    }

    #[test]
    fn success_clears_both_maps() {
        let mut t = CooldownTracker::new();
        t.record_url_failure("u1", true, Duration::from_secs(120), Duration::from_secs(45), Duration::from_secs(900));
        t.record_segment_failure("seg1", Duration::from_secs(90), Duration::from_secs(900));
        assert!(t.url_in_cooldown("u1"));
        assert!(t.segment_in_cooldown("seg1"));
        t.record_success("u1", "seg1");
        assert!(!t.url_in_cooldown("u1"));
        assert!(!t.segment_in_cooldown("seg1"));
    }

    #[test]
    fn segment_key_prefers_hyphenated_locality_segment() {
        assert_eq!(segment_key("https://example.com/property-for-sale-in-santacruz-east-123"), "property-for-sale-in-santacruz-east-123");
    }
}
