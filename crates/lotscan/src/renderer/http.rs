//! Browser-less renderer: plain HTTP GET, queries answered from the raw
//! document.
//!
//! Sites that render results client-side show no cards here, which is where
//! the structured-data fallback earns its keep. Scrolling is a no-op.

use super::{dom, NavigationResult, RenderContext, Renderer, Scope};
use crate::config::ScrapeConfig;
use crate::error::{RenderError, RenderResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// HTTP-only renderer backed by reqwest.
pub struct HttpRenderer {
    client: reqwest::Client,
    active_count: Arc<AtomicUsize>,
}

impl HttpRenderer {
    pub fn new(config: &ScrapeConfig) -> RenderResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    async fn new_context(&self) -> RenderResult<Box<dyn RenderContext>> {
        self.active_count.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(HttpContext {
            client: self.client.clone(),
            html: String::new(),
            active_count: Arc::clone(&self.active_count),
        }))
    }

    async fn shutdown(&self) -> RenderResult<()> {
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// One "page": the last document fetched.
pub struct HttpContext {
    client: reqwest::Client,
    html: String,
    active_count: Arc<AtomicUsize>,
}

#[async_trait]
impl RenderContext for HttpContext {
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> RenderResult<NavigationResult> {
        let start = Instant::now();
        let timeout = Duration::from_millis(timeout_ms);
        self.html.clear();

        let client = self.client.clone();
        let fetch = async move {
            let resp = client.get(url).send().await?;
            let status = resp.status().as_u16();
            let final_url = resp.url().to_string();
            let body = resp.text().await?;
            Ok::<_, reqwest::Error>((status, final_url, body))
        };

        match tokio::time::timeout(timeout, fetch).await {
            Ok(Ok((status, final_url, body))) => {
                self.html = body;
                Ok(NavigationResult {
                    final_url,
                    status: Some(status),
                    load_time_ms: start.elapsed().as_millis() as u64,
                })
            }
            Ok(Err(e)) if e.is_timeout() => Err(RenderError::Timeout {
                url: url.to_string(),
                timeout_ms,
            }),
            Ok(Err(e)) => Err(RenderError::Navigation(e.to_string())),
            Err(_) => Err(RenderError::Timeout {
                url: url.to_string(),
                timeout_ms,
            }),
        }
    }

    async fn count(&self, selector: &str) -> RenderResult<usize> {
        dom::count(&self.html, selector)
    }

    async fn text(
        &self,
        scope: &Scope,
        selector: &str,
        _timeout_ms: u64,
    ) -> RenderResult<Option<String>> {
        dom::text(&self.html, scope, selector)
    }

    async fn attribute(
        &self,
        scope: &Scope,
        selector: &str,
        name: &str,
        _timeout_ms: u64,
    ) -> RenderResult<Option<String>> {
        dom::attribute(&self.html, scope, selector, name)
    }

    async fn html(&self) -> RenderResult<String> {
        Ok(self.html.clone())
    }

    async fn scroll(&self, _delta_y: i64) -> RenderResult<()> {
        Ok(())
    }

    async fn close(self: Box<Self>) -> RenderResult<()> {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        Ok(())
    }
}
