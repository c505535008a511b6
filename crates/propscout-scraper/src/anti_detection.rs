use crate::selectors::{BOILERPLATE_ABOUT_TITLE, DETECTION_KEYWORDS};
use crate::user_agents::USER_AGENTS;
use rand::Rng;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Path fragments the portal uses to redirect suspected automation to its
/// boilerplate "about" page (spec §4.1, §6).
const ABOUT_PATH_FRAGMENTS: &[&str] = &["/about", "about-us"];

/// Thread-safe recovery state, serialized by a mutex so the listing loop and
/// PDP workers can't race on the detection ladder (spec §4.1).
struct State {
    detection_count: u32,
    last_detection_at: Option<Instant>,
    consecutive_failures: u32,
    user_agent_index: usize,
}

/// Detects adversarial responses and executes graduated recovery. Session-id
/// authority lives on the Browser Session (spec §9): this controller only
/// drives the `restart` closure it is handed and lets the browser bump its
/// own counter.
pub struct AntiDetectionController {
    state: Mutex<State>,
}

impl Default for AntiDetectionController {
    fn default() -> Self {
        Self::new()
    }
}

impl AntiDetectionController {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                detection_count: 0,
                last_detection_at: None,
                consecutive_failures: 0,
                user_agent_index: 0,
            }),
        }
    }

    /// True iff `html`/`title`/`current_url` match any known redirect
    /// pattern, detection keyword, or the vendor's boilerplate about-page
    /// title (spec §4.1 contract).
    pub fn inspect(&self, html: &str, title: &str, current_url: &str) -> bool {
        let html_lower = html.to_lowercase();
        let url_lower = current_url.to_lowercase();
        let title_lower = title.to_lowercase();

        if ABOUT_PATH_FRAGMENTS.iter().any(|f| url_lower.contains(f)) {
            return true;
        }
        if title_lower.trim() == BOILERPLATE_ABOUT_TITLE {
            return true;
        }
        DETECTION_KEYWORDS.iter().any(|kw| html_lower.contains(kw) || url_lower.contains(kw))
    }

    pub fn record_failure(&self) {
        self.state.lock().unwrap().consecutive_failures += 1;
    }

    pub fn reset_failures(&self) {
        self.state.lock().unwrap().consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().unwrap().consecutive_failures
    }

    pub fn total_detections(&self) -> u32 {
        self.state.lock().unwrap().detection_count
    }

    /// Advances the UA pointer and returns the now-current user agent.
    pub fn rotate_user_agent(&self) -> &'static str {
        let mut state = self.state.lock().unwrap();
        state.user_agent_index = (state.user_agent_index + 1) % USER_AGENTS.len();
        USER_AGENTS[state.user_agent_index]
    }

    pub fn current_user_agent(&self) -> &'static str {
        let state = self.state.lock().unwrap();
        USER_AGENTS[state.user_agent_index % USER_AGENTS.len()]
    }

    /// Jittered inter-page/inter-request delay, widened by recent detections,
    /// consecutive failures and session longevity (spec §4.1 contract,
    /// ported from `calculate_enhanced_delay`).
    pub fn choose_delay(&self, page_index: u32, base_min: f64, base_max: f64) -> Duration {
        let state = self.state.lock().unwrap();
        let mut delay = rand::thread_rng().gen_range(base_min..=base_max);

        if let Some(last) = state.last_detection_at {
            if last.elapsed() < Duration::from_secs(300) {
                delay *= 1.5;
            }
        }
        if state.consecutive_failures > 0 {
            delay *= 1.0 + state.consecutive_failures as f64 * 0.3;
        }
        if page_index > 10 {
            delay *= 1.2;
        }
        if page_index > 20 {
            delay *= 1.3;
        }

        Duration::from_secs_f64(delay.max(0.0))
    }

    /// Records a detection event, picks a recovery strategy from the
    /// 3-tier ladder based on the session's total detections so far, sleeps,
    /// and invokes `restart` (spec §4.1 recovery ladder). `restart` is
    /// expected to bump the session-id.
    pub async fn handle_detection<F, Fut>(&self, restart: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        let sleep_secs = {
            let mut state = self.state.lock().unwrap();
            state.detection_count += 1;
            state.last_detection_at = Some(Instant::now());
            let count = state.detection_count;

            warn!(detection_count = count, "anti-detection: bot detection event, executing recovery");

            if count <= 2 {
                let secs = (45 + count * 15).min(90);
                state.user_agent_index = (state.user_agent_index + 1) % USER_AGENTS.len();
                secs as u64
            } else if count <= 4 {
                (120 + count * 30) as u64
            } else {
                warn!("anti-detection: persistent bot detection, operator intervention recommended");
                300
            }
        };

        tokio::time::sleep(Duration::from_secs(sleep_secs)).await;
        restart().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_detects_known_keywords() {
        let c = AntiDetectionController::new();
        assert!(c.inspect("<html>Please complete the captcha</html>", "Security Check", "https://example.com/x"));
    }

    #[test]
    fn inspect_detects_about_page_title() {
        let c = AntiDetectionController::new();
        assert!(c.inspect("<html></html>", "About Us", "https://example.com/about"));
    }

    #[test]
    fn inspect_passes_clean_page() {
        let c = AntiDetectionController::new();
        assert!(!c.inspect("<html>2 BHK Apartment for sale</html>", "Property Listing", "https://example.com/pdpid-1"));
    }

    #[test]
    fn detection_count_never_decreases() {
        let c = AntiDetectionController::new();
        assert_eq!(c.total_detections(), 0);
    }

    #[tokio::test]
    async fn handle_detection_invokes_restart() {
        let c = AntiDetectionController::new();
        let restarted = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let restarted2 = restarted.clone();
        tokio::time::pause();
        let handle = tokio::spawn(async move {
            c.handle_detection(|| async move {
                restarted2.store(true, std::sync::atomic::Ordering::SeqCst);
            })
            .await;
            c
        });
        tokio::time::advance(Duration::from_secs(120)).await;
        let c = handle.await.unwrap();
        assert!(restarted.load(std::sync::atomic::Ordering::SeqCst));
        assert_eq!(c.total_detections(), 1);
    }
}
