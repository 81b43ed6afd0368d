//! Scrape configuration: timeouts, pacing, and browser identity.

use serde::{Deserialize, Serialize};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
                                  AppleWebKit/537.36 (KHTML, like Gecko) \
                                  Chrome/126.0.0.0 Safari/537.36";

/// Timeouts, scroll pacing, and browser settings shared by every page.
///
/// The browsing context is configured once from this and is read-only
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    /// Hard ceiling for a single navigation.
    pub nav_timeout_ms: u64,
    /// Per-field read ceiling. Kept short so one missing element cannot
    /// stall a card loop.
    pub text_timeout_ms: u64,
    /// Scroll steps taken after each numbered results page loads.
    pub page_scroll_steps: u32,
    /// Pause after each scroll step.
    pub scroll_delay_ms: u64,
    /// Upper bound of the random extra pause after each scroll step.
    pub scroll_jitter_ms: u64,
    /// Pause between infinite-scroll rounds while waiting for the card count
    /// to settle.
    pub deep_scroll_delay_ms: u64,
    /// Absolute cap on infinite-scroll rounds, stable or not.
    pub deep_scroll_ceiling: u32,
    /// Pause after each scroll step on a detail page.
    pub detail_scroll_delay_ms: u64,
    /// Pause after each detail-page visit during enrichment.
    pub enrich_pacing_ms: u64,
    /// Upper bound of the random extra enrichment pause.
    pub enrich_jitter_ms: u64,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: String,
    pub headless: bool,
    /// Log browser network traffic.
    pub debug: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            nav_timeout_ms: 30_000,
            text_timeout_ms: 700,
            page_scroll_steps: 4,
            scroll_delay_ms: 400,
            scroll_jitter_ms: 150,
            deep_scroll_delay_ms: 500,
            deep_scroll_ceiling: 60,
            detail_scroll_delay_ms: 250,
            enrich_pacing_ms: 200,
            enrich_jitter_ms: 100,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: 1280,
            viewport_height: 900,
            locale: "en-US".to_string(),
            headless: true,
            debug: false,
        }
    }
}

impl ScrapeConfig {
    /// Defaults with `LOTSCAN_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(ms) = env_u64("LOTSCAN_NAV_TIMEOUT_MS") {
            config.nav_timeout_ms = ms;
        }
        if let Some(ms) = env_u64("LOTSCAN_TEXT_TIMEOUT_MS") {
            config.text_timeout_ms = ms;
        }
        if let Ok(ua) = std::env::var("LOTSCAN_USER_AGENT") {
            if !ua.trim().is_empty() {
                config.user_agent = ua;
            }
        }
        config
    }

    /// A configuration with every artificial delay removed.
    pub fn without_delays(mut self) -> Self {
        self.scroll_delay_ms = 0;
        self.scroll_jitter_ms = 0;
        self.deep_scroll_delay_ms = 0;
        self.detail_scroll_delay_ms = 0;
        self.enrich_pacing_ms = 0;
        self.enrich_jitter_ms = 0;
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse().ok()
}
