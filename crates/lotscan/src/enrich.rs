//! Detail-page enrichment.
//!
//! Visits a listing's detail page and fills in whichever of price, mileage,
//! title and year are still missing. Known values are never replaced.

use crate::config::ScrapeConfig;
use crate::error::{RenderError, ScrapeError};
use crate::parse::{parse_miles, parse_price, parse_year};
use crate::progress::{Progress, ProgressEventKind};
use crate::renderer::{RenderContext, Renderer, Scope};
use crate::scrapers::{first_text, navigate_tolerant, scroll};
use crate::types::Listing;
use std::sync::Arc;
use tracing::{debug, warn};

const TITLE: &str = "h1, h2";
const SCROLL_STEPS: u32 = 2;

/// Price and mileage selectors for a detail page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetailSelectors {
    pub price: &'static str,
    pub miles: &'static str,
}

/// Pick detail-page selectors by the domain found in `url`.
pub fn detail_selectors(url: &str) -> DetailSelectors {
    if url.contains("cars.com") {
        DetailSelectors {
            price: "[data-test='vdp-price'], .vehicle-info__price-display, .primary-price",
            miles: "[data-test='mileage'], .mileage, .vehicle-mileage",
        }
    } else if url.contains("autotrader.com") {
        DetailSelectors {
            price: "[data-cmp='stylePrice'], [data-cmp='firstPrice'], [data-cmp='price']",
            miles: "[data-cmp='odometer'], [data-cmp='mileage']",
        }
    } else {
        DetailSelectors {
            price: "h1, h2, .price, [class*='price']",
            miles: ".mileage, [class*='mileage']",
        }
    }
}

/// Fields recovered from a detail page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub title: Option<String>,
    pub price: Option<u64>,
    pub miles: Option<u64>,
    pub year: Option<i32>,
}

/// Merge `found` into `listing`. Each field keeps its existing value when
/// one is present; only absent fields take the newly found value.
pub fn backfill(mut listing: Listing, found: DetailFields) -> Listing {
    listing.title = listing.title.or(found.title);
    listing.price = listing.price.or(found.price);
    listing.miles = listing.miles.or(found.miles);
    listing.year = listing.year.or(found.year);
    listing
}

pub struct Enricher {
    config: Arc<ScrapeConfig>,
    progress: Progress,
}

impl Enricher {
    pub fn new(config: Arc<ScrapeConfig>, progress: Progress) -> Self {
        Self { config, progress }
    }

    /// Enrich one listing on a fresh page from `renderer`.
    ///
    /// The page is closed whether or not the visit succeeds. A listing
    /// without a URL is returned unchanged.
    pub async fn enrich(
        &self,
        renderer: &dyn Renderer,
        listing: &Listing,
    ) -> Result<Listing, ScrapeError> {
        let Some(url) = listing.url.as_deref() else {
            return Ok(listing.clone());
        };
        let mut page = renderer.new_context().await?;
        let visited = self.visit(page.as_mut(), url, listing).await;
        if let Err(e) = page.close().await {
            warn!("failed to close detail page for {url}: {e}");
        }
        Ok(backfill(listing.clone(), visited?))
    }

    async fn visit(
        &self,
        page: &mut dyn RenderContext,
        url: &str,
        listing: &Listing,
    ) -> Result<DetailFields, RenderError> {
        debug!("visiting detail page {url}");
        self.progress.emit(ProgressEventKind::DetailVisiting {
            url: url.to_string(),
        });
        navigate_tolerant(page, url, self.config.nav_timeout_ms, &self.progress).await?;
        scroll(page, SCROLL_STEPS, self.config.detail_scroll_delay_ms, 0).await?;
        let html = page.html().await?;

        let sels = detail_selectors(url);
        let timeout = self.config.text_timeout_ms;
        let mut found = DetailFields::default();

        if listing.price.is_none() {
            found.price = first_text(page, &Scope::Page, &[sels.price], timeout)
                .await
                .as_deref()
                .and_then(parse_price);
        }
        if listing.miles.is_none() {
            found.miles = first_text(page, &Scope::Page, &[sels.miles], timeout)
                .await
                .as_deref()
                .and_then(parse_miles);
        }
        if listing.title.is_none() {
            found.title = first_text(page, &Scope::Page, &[TITLE], timeout).await;
        }
        if listing.year.is_none() {
            let title = listing.title.as_deref().or(found.title.as_deref());
            found.year = title.and_then(parse_year).or_else(|| parse_year(&html));
        }

        // Selectors missed; scan the whole markup.
        if listing.price.or(found.price).is_none() {
            found.price = parse_price(&html);
        }
        if listing.miles.or(found.miles).is_none() {
            found.miles = parse_miles(&html);
        }
        Ok(found)
    }
}
