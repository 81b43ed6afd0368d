//! Scripted in-memory renderer for unit tests.

use super::{dom, NavigationResult, RenderContext, Renderer, Scope};
use crate::error::{RenderError, RenderResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serves canned markup for any URL containing a registered pattern.
#[derive(Clone, Default)]
pub(crate) struct FixtureRenderer {
    pages: Arc<Mutex<Vec<Route>>>,
    visits: Arc<Mutex<Vec<String>>>,
    /// Answers for upcoming `count` calls: `Some(n)` reports `n`, `None`
    /// fails the query. Once drained, counts come from the markup.
    counts: Arc<Mutex<VecDeque<Option<usize>>>>,
    scrolls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    opened: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct Route {
    pattern: String,
    html: String,
    delay: Duration,
    times_out: bool,
}

impl FixtureRenderer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn page(self, pattern: &str, html: &str) -> Self {
        self.route(pattern, html, Duration::ZERO, false)
    }

    /// Loads after `delay`. A navigation deadline shorter than the delay
    /// times out with the markup already in place.
    pub(crate) fn slow_page(self, pattern: &str, html: &str, delay: Duration) -> Self {
        self.route(pattern, html, delay, false)
    }

    /// Navigation reports a timeout but the markup is still "rendered".
    pub(crate) fn timeout_page(self, pattern: &str, html: &str) -> Self {
        self.route(pattern, html, Duration::ZERO, true)
    }

    pub(crate) fn counts(self, script: impl IntoIterator<Item = Option<usize>>) -> Self {
        self.counts.lock().unwrap().extend(script);
        self
    }

    fn route(self, pattern: &str, html: &str, delay: Duration, times_out: bool) -> Self {
        self.pages.lock().unwrap().push(Route {
            pattern: pattern.to_string(),
            html: html.to_string(),
            delay,
            times_out,
        });
        self
    }

    pub(crate) fn visits(&self) -> Vec<String> {
        self.visits.lock().unwrap().clone()
    }

    pub(crate) fn scrolls(&self) -> usize {
        self.scrolls.load(Ordering::Relaxed)
    }

    pub(crate) fn opened(&self) -> usize {
        self.opened.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Renderer for FixtureRenderer {
    async fn new_context(&self) -> RenderResult<Box<dyn RenderContext>> {
        self.active.fetch_add(1, Ordering::Relaxed);
        self.opened.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(FixturePage {
            renderer: self.clone(),
            html: String::new(),
        }))
    }

    async fn shutdown(&self) -> RenderResult<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }
}

struct FixturePage {
    renderer: FixtureRenderer,
    html: String,
}

#[async_trait]
impl RenderContext for FixturePage {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> RenderResult<NavigationResult> {
        self.renderer.visits.lock().unwrap().push(url.to_string());
        self.html.clear();
        let route = self
            .renderer
            .pages
            .lock()
            .unwrap()
            .iter()
            .find(|r| url.contains(&r.pattern))
            .cloned();

        let Some(route) = route else {
            return Err(RenderError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED {url}")));
        };
        let deadline = Duration::from_millis(timeout_ms);
        let timed_out = route.times_out || route.delay > deadline;
        tokio::time::sleep(route.delay.min(deadline)).await;
        self.html = route.html;
        if timed_out {
            return Err(RenderError::Timeout {
                url: url.to_string(),
                timeout_ms,
            });
        }
        Ok(NavigationResult {
            final_url: url.to_string(),
            status: Some(200),
            load_time_ms: route.delay.as_millis() as u64,
        })
    }

    async fn count(&self, selector: &str) -> RenderResult<usize> {
        let scripted = self.renderer.counts.lock().unwrap().pop_front();
        match scripted {
            Some(Some(n)) => Ok(n),
            Some(None) => Err(RenderError::Query(format!("scripted failure for {selector}"))),
            None => dom::count(&self.html, selector),
        }
    }

    async fn text(&self, scope: &Scope, selector: &str, _: u64) -> RenderResult<Option<String>> {
        dom::text(&self.html, scope, selector)
    }

    async fn attribute(
        &self,
        scope: &Scope,
        selector: &str,
        name: &str,
        _: u64,
    ) -> RenderResult<Option<String>> {
        dom::attribute(&self.html, scope, selector, name)
    }

    async fn html(&self) -> RenderResult<String> {
        Ok(self.html.clone())
    }

    async fn scroll(&self, _: i64) -> RenderResult<()> {
        self.renderer.scrolls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn close(self: Box<Self>) -> RenderResult<()> {
        self.renderer.active.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}
