use chromiumoxide::browser::{Browser, BrowserConfigBuilder, HeadlessMode};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams as NetworkEnableParams, SetBlockedUrLsParams, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::SetLifecycleEventsEnabledParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{Result, ScrapeError};

/// Selectors whose presence indicates a PDP/listing page has settled enough
/// to extract from (spec §4.2 navigate wait policy).
const CRITICAL_SELECTORS: &[&str] = &["h1", ".price-value", ".srp-card__price", ".mb-srp__card__price--amount"];

/// JS injected into every page to hide the automation fingerprint the
/// CDP-launched browser otherwise exposes (spec §4.2 stealth contract),
/// grounded on the teacher pack's `browser_setup::apply_stealth_measures`
/// webdriver-property override.
const HIDE_WEBDRIVER_JS: &str = r"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined
    });
";

/// URL-pattern glob rules for `Network.setBlockedURLs`: static media/fonts
/// that don't affect field extraction, plus known analytics/tracking hosts
/// (spec §4.2 resource-blocking contract).
const BLOCKED_RESOURCE_PATTERNS: &[&str] = &[
    "*.png",
    "*.jpg",
    "*.jpeg",
    "*.gif",
    "*.webp",
    "*.svg",
    "*.ico",
    "*.woff",
    "*.woff2",
    "*.ttf",
    "*.otf",
    "*.mp4",
    "*.webm",
    "*.avi",
    "*google-analytics.com*",
    "*googletagmanager.com*",
    "*doubleclick.net*",
    "*facebook.net*",
    "*hotjar.com*",
    "*segment.io*",
    "*.ads.com*",
];

/// Low-level error substrings that should trigger a browser restart and
/// retry of the current URL (spec §4.2 failure semantics).
const RESTART_TRIGGERS: &[&str] = &[
    "connection refused",
    "session deleted",
    "window closed",
    "chrome not reachable",
    "dns",
    "network error",
    "timeout",
    "target closed",
    "websocket",
];

pub fn is_restart_trigger(err: &str) -> bool {
    let lower = err.to_lowercase();
    RESTART_TRIGGERS.iter().any(|t| lower.contains(t))
}

/// Installs a request-interception rule denying images/fonts/media and a
/// small set of known third-party analytics hosts (spec §4.2). Best-effort:
/// a failure here should not abort the navigation.
async fn install_resource_blocking(page: &Page) -> Result<()> {
    let _ = page.execute(NetworkEnableParams::default()).await;
    let patterns: Vec<String> = BLOCKED_RESOURCE_PATTERNS.iter().map(|p| p.to_string()).collect();
    let params = SetBlockedUrLsParams::builder()
        .urls(patterns)
        .build()
        .map_err(|e| ScrapeError::Browser(e.to_string()))?;
    page.execute(params).await.map_err(|e| ScrapeError::Browser(e.to_string()))?;
    Ok(())
}

/// Launch-time options, kept as data per the "rate-limit as data" design note
/// rather than hard-coded in this module.
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub randomize_viewport: bool,
    pub block_resources: bool,
    pub eager_page_load: bool,
    pub browser_binary_path: Option<String>,
    pub user_agent: String,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            randomize_viewport: false,
            block_resources: false,
            eager_page_load: true,
            browser_binary_path: None,
            user_agent: crate::user_agents::USER_AGENTS[0].to_string(),
        }
    }
}

/// Result of a single navigation (spec §4.2 contract).
pub struct NavigateOutcome {
    pub final_url: String,
    pub html: String,
    pub title: String,
    pub load_ok: bool,
}

/// Owns a single headless browser instance. Rebuildable on demand via
/// `restart`, which emits a new session-id that external observers (the PDP
/// dispatcher, in particular) use to invalidate in-flight work (spec §4.2,
/// §9 cyclic-reference resolution).
pub struct BrowserSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    options: BrowserOptions,
    session_id: AtomicU64,
}

impl BrowserSession {
    pub fn new(options: BrowserOptions) -> Self {
        Self {
            browser: None,
            handler: None,
            options,
            session_id: AtomicU64::new(1),
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id.load(Ordering::SeqCst)
    }

    /// Creates a headless browser with stealth launch flags (spec §4.2
    /// contract), grounded on the teacher pack's
    /// `browser_setup::launch_browser` stealth-argument set.
    pub async fn start(&mut self) -> Result<()> {
        let (width, height) = if self.options.randomize_viewport {
            let mut rng = rand::thread_rng();
            (rng.gen_range(1440..=1920), rng.gen_range(810..=1080))
        } else {
            (1920, 1080)
        };

        let mut builder = BrowserConfigBuilder::default()
            .window_size(width, height)
            .arg(format!("--user-agent={}", self.options.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-notifications")
            .arg("--disable-popup-blocking")
            .arg("--disable-background-networking")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-renderer-backgrounding")
            .arg("--hide-scrollbars")
            .arg("--mute-audio");

        if self.options.eager_page_load {
            builder = builder.arg("--page-load-strategy=eager");
        }
        if self.options.headless {
            builder = builder.headless_mode(HeadlessMode::default());
        } else {
            builder = builder.with_head();
        }
        if let Some(bin) = &self.options.browser_binary_path {
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .build()
            .map_err(|e| ScrapeError::Browser(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Browser(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        self.browser = Some(browser);
        self.handler = Some(handler_task);
        info!("browser session started");
        Ok(())
    }

    fn browser(&mut self) -> Result<&mut Browser> {
        self.browser.as_mut().ok_or_else(|| ScrapeError::Browser("browser not started".to_string()))
    }

    /// Navigates to `url`, optionally setting Referer for just this
    /// navigation, waits for one of the critical selectors up to 3s and
    /// falls back to a 1s settle, then returns the final URL, HTML, title
    /// and whether the load succeeded (spec §4.2 contract).
    pub async fn navigate(&mut self, url: &str, referer: Option<&str>) -> Result<NavigateOutcome> {
        let page = self.new_page(referer).await?;

        let goto_result = page.goto(url).await;
        if let Err(e) = goto_result {
            return Err(ScrapeError::Browser(e.to_string()));
        }

        let settled = self.wait_for_critical_selector(&page).await;
        if !settled {
            tokio::time::sleep(Duration::from_millis(1000)).await;
        }

        let html = page.content().await.unwrap_or_default();
        let final_url = page.url().await.ok().flatten().unwrap_or_else(|| url.to_string());
        let title = page.get_title().await.ok().flatten().unwrap_or_default();

        let _ = page.close().await;

        Ok(NavigateOutcome {
            final_url,
            html,
            title,
            load_ok: true,
        })
    }

    async fn new_page(&mut self, referer: Option<&str>) -> Result<Page> {
        let browser = self.browser()?;
        let page = browser.new_page("about:blank").await.map_err(|e| ScrapeError::Browser(e.to_string()))?;

        let _ = page.evaluate(HIDE_WEBDRIVER_JS).await;

        if self.options.block_resources {
            if let Err(e) = install_resource_blocking(&page).await {
                warn!(error = %e, "browser: failed to install resource blocking for page");
            }
        }

        if let Some(referer) = referer {
            let headers = chromiumoxide::cdp::browser_protocol::network::Headers::new(serde_json::json!({ "Referer": referer }));
            let params = SetExtraHttpHeadersParams::builder()
                .headers(headers)
                .build()
                .map_err(|e| ScrapeError::Browser(e.to_string()))?;
            let _ = page.execute(params).await;
        }
        let _ = page.execute(SetLifecycleEventsEnabledParams::new(true)).await;

        Ok(page)
    }

    async fn wait_for_critical_selector(&self, page: &Page) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        while tokio::time::Instant::now() < deadline {
            for selector in CRITICAL_SELECTORS {
                if page.find_element(*selector).await.is_ok() {
                    return true;
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        false
    }

    /// Small mouse/scroll perturbation before sensitive navigations, to make
    /// the session look less purely programmatic (spec §4.2 contract).
    pub async fn simulate_human_gesture(&mut self) -> Result<()> {
        let browser = self.browser()?;
        let pages = browser.pages().await.map_err(|e| ScrapeError::Browser(e.to_string()))?;
        if let Some(page) = pages.first() {
            let mut rng = rand::thread_rng();
            let dx = rng.gen_range(50.0..300.0);
            let dy = rng.gen_range(50.0..300.0);
            let _ = page
                .evaluate(format!("window.scrollBy({{top: {dy}, left: {dx}, behavior: 'auto'}})"))
                .await;
        }
        Ok(())
    }

    /// Release resources.
    pub async fn quit(&mut self) -> Result<()> {
        if let Some(mut browser) = self.browser.take() {
            let _ = browser.close().await;
            let _ = browser.wait().await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        Ok(())
    }

    /// quit + start, emitting a new session-id that external observers use
    /// to invalidate in-flight work (spec §4.2, §8 testable property 7).
    pub async fn restart(&mut self) -> Result<u64> {
        warn!("browser session restarting");
        self.quit().await?;
        self.start().await?;
        Ok(self.session_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn set_user_agent(&mut self, ua: &str) {
        self.options.user_agent = ua.to_string();
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_triggers_match_known_errors() {
        assert!(is_restart_trigger("Error: connection refused"));
        assert!(is_restart_trigger("chrome not reachable"));
        assert!(is_restart_trigger("dns lookup failed"));
        assert!(!is_restart_trigger("element not found"));
    }

    #[test]
    fn default_viewport_is_1920x1080() {
        let opts = BrowserOptions::default();
        assert!(!opts.randomize_viewport);
    }
}
