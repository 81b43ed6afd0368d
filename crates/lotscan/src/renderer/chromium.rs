//! Chromium-based renderer using chromiumoxide.

use super::{NavigationResult, RenderContext, Renderer, Scope};
use crate::config::ScrapeConfig;
use crate::error::{RenderError, RenderResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventRequestWillBeSent, EventResponseReceived, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, EventDomContentEventFired, NavigateParams,
};
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Hides the most common automation tell from page scripts.
const WEBDRIVER_MASK: &str =
    "Object.defineProperty(navigator,'webdriver',{get:()=>undefined});";

/// Poll interval while waiting for a selector to appear.
const QUERY_POLL_MS: u64 = 100;

/// Find the Chromium binary path.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("LOTSCAN_CHROMIUM_PATH") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".lotscan/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".lotscan/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".lotscan/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".lotscan/chromium/chrome-linux64/chrome"),
                home.join(".lotscan/chromium/chrome"),
            ]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    for name in ["google-chrome", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Chromium-based renderer.
///
/// One browser process, one shared context; every [`RenderContext`] it
/// hands out is a separate tab carrying the same user agent, locale and
/// init script.
pub struct ChromiumRenderer {
    browser: Mutex<Browser>,
    config: ScrapeConfig,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Launch Chromium configured from `config`. Failure here is fatal to a
    /// run.
    pub async fn launch(config: &ScrapeConfig) -> Result<Self> {
        let chrome_path = find_chromium()
            .context("Chromium not found. Set LOTSCAN_CHROMIUM_PATH or install Chrome.")?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(config.viewport_width, config.viewport_height)
            .viewport(Viewport {
                width: config.viewport_width,
                height: config.viewport_height,
                device_scale_factor: None,
                emulating_mobile: false,
                is_landscape: false,
                has_touch: false,
            })
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--lang={}", config.locale));
        builder = if config.headless {
            builder.arg("--headless=new")
        } else {
            builder.with_head()
        };
        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch Chromium")?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        Ok(Self {
            browser: Mutex::new(browser),
            config: config.clone(),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    async fn prepare_page(&self, page: &Page) -> RenderResult<()> {
        let mut ua = SetUserAgentOverrideParams::new(self.config.user_agent.clone());
        ua.accept_language = Some(self.config.locale.clone());
        page.set_user_agent(ua)
            .await
            .map_err(|e| RenderError::Unavailable(format!("failed to set user agent: {e}")))?;

        page.evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(WEBDRIVER_MASK))
            .await
            .map_err(|e| RenderError::Unavailable(format!("failed to add init script: {e}")))?;

        if self.config.debug {
            watch_network(page).await;
        }
        Ok(())
    }
}

/// Log request, response and failure events for one page at debug level.
async fn watch_network(page: &Page) {
    if let Ok(mut requests) = page.event_listener::<EventRequestWillBeSent>().await {
        tokio::spawn(async move {
            while let Some(ev) = requests.next().await {
                debug!("[REQ] {} {}", ev.request.method, ev.request.url);
            }
        });
    }
    if let Ok(mut responses) = page.event_listener::<EventResponseReceived>().await {
        tokio::spawn(async move {
            while let Some(ev) = responses.next().await {
                debug!("[RES] {} {}", ev.response.status, ev.response.url);
            }
        });
    }
    if let Ok(mut failures) = page.event_listener::<EventLoadingFailed>().await {
        tokio::spawn(async move {
            while let Some(ev) = failures.next().await {
                debug!("[REQ-FAIL] {:?} {}", ev.request_id, ev.error_text);
            }
        });
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> RenderResult<Box<dyn RenderContext>> {
        let page = {
            let browser = self.browser.lock().await;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| RenderError::Unavailable(format!("failed to create new page: {e}")))?
        };
        self.prepare_page(&page).await?;

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> RenderResult<()> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| RenderError::Unavailable(format!("failed to close browser: {e}")))?;
        let _ = browser.wait().await;
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium tab.
pub struct ChromiumContext {
    page: Page,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    async fn eval_string(&self, script: &str) -> RenderResult<Option<String>> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Query(format!("JS execution failed: {e}")))?;
        Ok(result
            .value()
            .and_then(|v| v.as_str())
            .map(str::to_string))
    }

    /// Re-run `script` until it yields a value or `timeout_ms` elapses.
    async fn poll(&self, script: &str, timeout_ms: u64) -> RenderResult<Option<String>> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, self.eval_string(script)).await {
                Ok(Ok(Some(value))) => return Ok(Some(value)),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Ok(None),
            }
            if Instant::now() + Duration::from_millis(QUERY_POLL_MS) >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(Duration::from_millis(QUERY_POLL_MS)).await;
        }
    }
}

/// JS expression for the element that `scope` roots a query at.
fn scope_js(scope: &Scope) -> String {
    match scope {
        Scope::Page => "document".to_string(),
        Scope::Nth { selector, index } => format!(
            "document.querySelectorAll({})[{index}]",
            js_string(selector)
        ),
    }
}

fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Script returning `read(el)` for the first `selector` match under `scope`,
/// or `null`.
fn query_script(scope: &Scope, selector: &str, read: &str) -> String {
    format!(
        "(() => {{ const root = {root}; if (!root) return null; \
         const el = root.querySelector({sel}); return el ? {read} : null; }})()",
        root = scope_js(scope),
        sel = js_string(selector),
    )
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> RenderResult<NavigationResult> {
        let start = Instant::now();

        // Waits for DOMContentLoaded only; late subresources never block.
        let page = &self.page;
        let loaded = async {
            let mut dom_ready = page
                .event_listener::<EventDomContentEventFired>()
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            let nav = page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| RenderError::Navigation(e.to_string()))?;
            if let Some(error) = nav.result.error_text.clone() {
                return Err(RenderError::Navigation(format!("{error} {url}")));
            }
            dom_ready.next().await;
            Ok(())
        };
        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), loaded).await;

        let load_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(())) => {
                let final_url = self
                    .page
                    .url()
                    .await
                    .unwrap_or_default()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult {
                    final_url,
                    status: None,
                    load_time_ms,
                })
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RenderError::Timeout {
                url: url.to_string(),
                timeout_ms,
            }),
        }
    }

    async fn count(&self, selector: &str) -> RenderResult<usize> {
        let script = format!("document.querySelectorAll({}).length", js_string(selector));
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Query(format!("JS execution failed: {e}")))?;
        Ok(result.value().and_then(|v| v.as_u64()).unwrap_or(0) as usize)
    }

    async fn text(
        &self,
        scope: &Scope,
        selector: &str,
        timeout_ms: u64,
    ) -> RenderResult<Option<String>> {
        let script = query_script(scope, selector, "el.textContent");
        self.poll(&script, timeout_ms).await
    }

    async fn attribute(
        &self,
        scope: &Scope,
        selector: &str,
        name: &str,
        timeout_ms: u64,
    ) -> RenderResult<Option<String>> {
        let read = format!("el.getAttribute({})", js_string(name));
        let script = query_script(scope, selector, &read);
        self.poll(&script, timeout_ms).await
    }

    async fn html(&self) -> RenderResult<String> {
        self.eval_string("document.documentElement.outerHTML")
            .await?
            .ok_or_else(|| RenderError::Query("page has no document element".into()))
    }

    async fn scroll(&self, delta_y: i64) -> RenderResult<()> {
        self.page
            .evaluate(format!("window.scrollBy(0, {delta_y})"))
            .await
            .map_err(|e| RenderError::Query(format!("scroll failed: {e}")))?;
        Ok(())
    }

    async fn close(self: Box<Self>) -> RenderResult<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        let _ = self.page.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_script_escapes_selectors() {
        let script = query_script(&Scope::nth("[data-cmp='inventoryListing']", 3), "a", "el.href");
        assert!(script.contains(r#"document.querySelectorAll("[data-cmp='inventoryListing']")[3]"#));
        assert!(script.contains(r#"root.querySelector("a")"#));
    }

    #[test]
    fn test_js_string_quotes() {
        assert_eq!(js_string(r#"a[href="x"]"#), r#""a[href=\"x\"]""#);
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigate_and_query() {
        let renderer = ChromiumRenderer::launch(&ScrapeConfig::default())
            .await
            .expect("failed to launch Chromium");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        ctx.navigate(
            "data:text/html,<div class='card'><h2>2015 Toyota Camry</h2><a href='/vdp/1'>x</a></div>",
            10_000,
        )
        .await
        .expect("navigation failed");

        assert_eq!(ctx.count("div.card").await.unwrap(), 1);
        let title = ctx
            .text(&Scope::nth("div.card", 0), "h2", 700)
            .await
            .unwrap();
        assert_eq!(title.as_deref(), Some("2015 Toyota Camry"));
        let missing = ctx.text(&Scope::Page, ".price", 200).await.unwrap();
        assert_eq!(missing, None);

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);
        renderer.shutdown().await.expect("shutdown failed");
    }
    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_navigate_does_not_wait_for_images() {
        let renderer = ChromiumRenderer::launch(&ScrapeConfig::default())
            .await
            .expect("failed to launch Chromium");
        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");

        // The image host is unroutable, so the load event never fires in time.
        let nav = ctx
            .navigate(
                "data:text/html,<h1>2015 Toyota Camry</h1><img src='http://10.255.255.1/car.jpg'>",
                5_000,
            )
            .await
            .expect("navigation should finish at DOMContentLoaded");
        assert!(nav.load_time_ms < 5_000);
        let title = ctx.text(&Scope::Page, "h1", 700).await.unwrap();
        assert_eq!(title.as_deref(), Some("2015 Toyota Camry"));

        ctx.close().await.expect("close failed");
        renderer.shutdown().await.expect("shutdown failed");
    }
}
