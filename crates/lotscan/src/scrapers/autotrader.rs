//! Autotrader: a single infinite-scroll results page.

use super::{
    dedupe_and_trim, enforce_year, first_attr, first_text, navigate_tolerant, scroll,
    structured_listings, validate, SourceScraper,
};
use crate::config::ScrapeConfig;
use crate::error::{RenderError, ScrapeError};
use crate::parse::{parse_miles, parse_price, parse_year};
use crate::progress::{Progress, ProgressEventKind};
use crate::renderer::{RenderContext, Scope};
use crate::types::{Listing, SearchParams, Source};
use crate::urls::absolutize;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const CARDS: &str = "[data-cmp='inventoryListing'], div.inventory-listing";
const TITLE: &[&str] = &["[data-cmp='subheading']", "[data-cmp='heading']"];
const LINK: &[&str] = &["a"];
const PRICE: &[&str] = &["[data-cmp='price']", ".first-price", ".price"];
const MILES: &[&str] = &["[data-cmp='mileage']", ".mileage", ".item-card-specifications"];

/// Cards inspected per unit of result cap; many are ads or off-year.
const CARD_SCAN_FACTOR: usize = 5;

pub struct Autotrader {
    config: Arc<ScrapeConfig>,
    progress: Progress,
    origin: String,
}

impl Autotrader {
    pub fn new(config: Arc<ScrapeConfig>, progress: Progress) -> Self {
        Self {
            config,
            progress,
            origin: Source::Autotrader.origin().to_string(),
        }
    }

    /// Point the scraper at another origin (a mirror or a test server).
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.trim_end_matches('/').to_string();
        self
    }

    pub fn search_url(&self, params: &SearchParams) -> String {
        let make_code = params.make.to_uppercase().replace(' ', "");
        let model_code = params.model.to_uppercase().replace(' ', "_");
        let base = format!("{}/cars-for-sale/all-cars", self.origin);
        let mut url = match Url::parse(&base) {
            Ok(url) => url,
            Err(_) => return base,
        };
        url.query_pairs_mut()
            .append_pair("searchRadius", &params.radius.to_string())
            .append_pair("zip", &params.zip)
            .append_pair("makeCodeList", &make_code)
            .append_pair("modelCodeList", &format!("{make_code}_{model_code}"))
            .append_pair("startYear", &params.year.to_string())
            .append_pair("endYear", &params.year.to_string())
            .append_pair("marketExtension", "include")
            .append_pair("isNewSearch", "true");
        url.to_string()
    }

    /// Scroll until the card count holds steady for `stable_rounds`
    /// consecutive rounds, or the round ceiling is hit.
    async fn deep_scroll(&self, page: &dyn RenderContext, stable_rounds: u32) -> Result<(), RenderError> {
        let mut last: Option<usize> = None;
        let mut stable = 0;
        let mut rounds = 0;
        while stable < stable_rounds && rounds < self.config.deep_scroll_ceiling {
            scroll(page, 1, self.config.deep_scroll_delay_ms, self.config.scroll_jitter_ms).await?;
            rounds += 1;
            let n = page.count(CARDS).await.unwrap_or(0);
            if last == Some(n) {
                stable += 1;
            } else {
                stable = 0;
                last = Some(n);
            }
        }
        debug!("autotrader deep scroll settled after {rounds} rounds");
        Ok(())
    }

    /// Read visible cards into `rows`. On error, rows read so far stay.
    async fn scrape_cards(
        &self,
        page: &dyn RenderContext,
        cap: usize,
        rows: &mut Vec<Listing>,
    ) -> Result<(), RenderError> {
        let n = page.count(CARDS).await?;
        info!("autotrader cards after deep scroll: {n}");
        self.progress.emit(ProgressEventKind::CardsFound {
            source: Source::Autotrader,
            page: 1,
            count: n,
        });

        let timeout = self.config.text_timeout_ms;
        for i in 0..n.min(cap.saturating_mul(CARD_SCAN_FACTOR)) {
            let card = Scope::nth(CARDS, i);
            let title = first_text(page, &card, TITLE, timeout).await;
            let link = first_attr(page, &card, LINK, "href", timeout).await;
            let price_text = first_text(page, &card, PRICE, timeout).await;
            let miles_text = first_text(page, &card, MILES, timeout).await;

            rows.push(Listing {
                source: Source::Autotrader,
                year: title.as_deref().and_then(parse_year),
                price: price_text.as_deref().and_then(parse_price),
                miles: miles_text.as_deref().and_then(parse_miles),
                url: link.and_then(|href| absolutize(&self.origin, &href)),
                title,
                location: None,
                dealer: None,
            });

            if (i + 1) % 10 == 0 {
                self.progress.emit(ProgressEventKind::CardsProcessed {
                    source: Source::Autotrader,
                    page: 1,
                    processed: i + 1,
                    total: n,
                });
            }
            if rows.len() >= cap {
                break;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl SourceScraper for Autotrader {
    fn source(&self) -> Source {
        Source::Autotrader
    }

    async fn scrape(
        &self,
        page: &mut dyn RenderContext,
        params: &SearchParams,
    ) -> Result<Vec<Listing>, ScrapeError> {
        validate(params)?;
        let cap = params.max_results;
        let url = self.search_url(params);
        info!("autotrader navigating: {url}");
        self.progress.emit(ProgressEventKind::Navigating {
            source: Source::Autotrader,
            page: 1,
            url: url.clone(),
        });
        navigate_tolerant(page, &url, self.config.nav_timeout_ms, &self.progress).await?;

        self.deep_scroll(page, params.scroll_rounds).await?;

        let mut rows = Vec::new();
        if let Err(e) = self.scrape_cards(page, cap, &mut rows).await {
            warn!("autotrader DOM scrape error: {e}");
            self.progress.emit(ProgressEventKind::CardScrapeFailed {
                source: Source::Autotrader,
                page: 1,
                error: e.to_string(),
            });
        }

        if rows.len() < cap {
            info!("autotrader falling back to embedded JSON");
            self.progress.emit(ProgressEventKind::StructuredFallback {
                source: Source::Autotrader,
                page: 1,
            });
            let html = page.html().await?;
            let room = cap - rows.len();
            rows.extend(
                structured_listings(&html, Source::Autotrader, &self.origin)
                    .into_iter()
                    .take(room),
            );
        }

        let rows = enforce_year(rows, params.year, Some(Source::Autotrader), &self.progress);
        let rows = dedupe_and_trim(rows, cap);
        info!("autotrader returning {} rows", rows.len());
        self.progress.emit(ProgressEventKind::ScraperFinished {
            source: Source::Autotrader,
            rows: rows.len(),
        });
        Ok(rows)
    }
}
