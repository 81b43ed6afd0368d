//! Renderer abstraction for page loading and DOM queries.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over the
//! page engine: Chromium via chromiumoxide for live sites, or a plain HTTP
//! fetch answered from the static document.

pub mod chromium;
pub mod dom;
pub mod http;

#[cfg(test)]
pub(crate) mod fixture;

use crate::error::RenderResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use chromium::ChromiumRenderer;
pub use http::HttpRenderer;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// HTTP status code, when the engine exposes it.
    pub status: Option<u16>,
    /// Time taken to load the page in milliseconds.
    pub load_time_ms: u64,
}

/// Where a selector query is rooted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// The whole document.
    Page,
    /// The `index`-th element matching `selector`, typically a result card.
    Nth { selector: String, index: usize },
}

impl Scope {
    pub fn nth(selector: &str, index: usize) -> Self {
        Self::Nth {
            selector: selector.to_string(),
            index,
        }
    }
}

/// A page engine that hands out independent pages over one shared
/// browsing context.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a new page. The caller owns it and must close it.
    async fn new_context(&self) -> RenderResult<Box<dyn RenderContext>>;
    /// Shut down the engine.
    async fn shutdown(&self) -> RenderResult<()>;
    /// Number of currently open pages.
    fn active_contexts(&self) -> usize;
}

/// A single page.
///
/// Query methods return the first match only. `Ok(None)` means nothing
/// matched (or the match had no text/attribute) before the timeout.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate, failing with `RenderError::Timeout` past `timeout_ms`.
    async fn navigate(&mut self, url: &str, timeout_ms: u64) -> RenderResult<NavigationResult>;
    /// Number of elements matching `selector`.
    async fn count(&self, selector: &str) -> RenderResult<usize>;
    /// `textContent` of the first `selector` match under `scope`.
    async fn text(&self, scope: &Scope, selector: &str, timeout_ms: u64)
        -> RenderResult<Option<String>>;
    /// Attribute `name` of the first `selector` match under `scope`.
    async fn attribute(
        &self,
        scope: &Scope,
        selector: &str,
        name: &str,
        timeout_ms: u64,
    ) -> RenderResult<Option<String>>;
    /// Full page markup.
    async fn html(&self) -> RenderResult<String>;
    /// Scroll the viewport by `delta_y` pixels.
    async fn scroll(&self, delta_y: i64) -> RenderResult<()>;
    /// Close this page.
    async fn close(self: Box<Self>) -> RenderResult<()>;
}
