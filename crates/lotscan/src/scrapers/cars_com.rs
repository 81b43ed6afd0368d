//! Cars.com: numbered result pages.

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
use crate::urls::{absolutize, normalize};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const CARDS: &str = "div.vehicle-card, article.vehicle-card";
const TITLE: &[&str] = &["h2.title", "h2.vehicle-card-title"];
const LINK: &[&str] = &["a.vehicle-card-link", "a"];
const PRICE: &[&str] = &["[data-test='vehicleCardPriceAmount']", ".primary-price"];
const MILES: &[&str] = &["[data-test='vehicleMileage']", ".mileage", ".vehicle-mileage"];

const PAGE_SIZE: u32 = 20;

pub struct CarsCom {
    config: Arc<ScrapeConfig>,
    progress: Progress,
    origin: String,
}

/// Rows collected across pages plus the normalized URLs already taken.
struct Collected {
    rows: Vec<Listing>,
    seen: HashSet<String>,
}

impl Collected {
    /// Keep `row` if it has a URL not seen before, storing the normalized
    /// form.
    fn offer(&mut self, mut row: Listing) -> bool {
        let Some(norm) = row.url.as_deref().and_then(normalize) else {
            return false;
        };
        if !self.seen.insert(norm.clone()) {
            return false;
        }
        row.url = Some(norm);
        self.rows.push(row);
        true
    }
}

impl CarsCom {
    pub fn new(config: Arc<ScrapeConfig>, progress: Progress) -> Self {
        Self {
            config,
            progress,
            origin: Source::CarsCom.origin().to_string(),
        }
    }

    /// Point the scraper at another origin (a mirror or a test server).
    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.trim_end_matches('/').to_string();
        self
    }

    pub fn search_url(&self, params: &SearchParams, page_no: u32) -> String {
        let make = params.make.to_lowercase().replace(' ', "");
        let model = params.model.to_lowercase().replace(' ', "_");
        let base = format!("{}/shopping/results/", self.origin);
        let mut url = match Url::parse(&base) {
            Ok(url) => url,
            Err(_) => return base,
        };
        let year = params.year.to_string();
        url.query_pairs_mut()
            .append_pair("stock_type", "used")
            .append_pair("makes[]", &make)
            .append_pair("models[]", &format!("{make}-{model}"))
            .append_pair("years[]", &year)
            .append_pair("year_min", &year)
            .append_pair("year_max", &year)
            .append_pair("maximum_distance", &params.radius.to_string())
            .append_pair("zip", &params.zip)
            .append_pair("page", &page_no.to_string())
            .append_pair("page_size", &PAGE_SIZE.to_string());
        url.to_string()
    }

    /// Read one page's cards. Returns the number of cards on the page.
    async fn scrape_cards(
        &self,
        page: &dyn RenderContext,
        page_no: u32,
        cap: usize,
        collected: &mut Collected,
    ) -> Result<usize, RenderError> {
        let n = page.count(CARDS).await?;
        info!("cars.com page {page_no} DOM cards: {n}");
        self.progress.emit(ProgressEventKind::CardsFound {
            source: Source::CarsCom,
            page: page_no,
            count: n,
        });

        let timeout = self.config.text_timeout_ms;
        for i in 0..n {
            let card = Scope::nth(CARDS, i);
            let title = first_text(page, &card, TITLE, timeout).await;
            let link = first_attr(page, &card, LINK, "href", timeout).await;
            let price_text = first_text(page, &card, PRICE, timeout).await;
            let miles_text = first_text(page, &card, MILES, timeout).await;

            collected.offer(Listing {
                source: Source::CarsCom,
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
                    source: Source::CarsCom,
                    page: page_no,
                    processed: i + 1,
                    total: n,
                });
            }
            if collected.rows.len() >= cap {
                break;
            }
        }
        Ok(n)
    }
}

#[async_trait]
impl SourceScraper for CarsCom {
    fn source(&self) -> Source {
        Source::CarsCom
    }

    async fn scrape(
        &self,
        page: &mut dyn RenderContext,
        params: &SearchParams,
    ) -> Result<Vec<Listing>, ScrapeError> {
        validate(params)?;
        let cap = params.max_results;
        let mut collected = Collected {
            rows: Vec::new(),
            seen: HashSet::new(),
        };

        for page_no in 1..=params.max_pages {
            let url = self.search_url(params, page_no);
            info!("cars.com navigating page {page_no}: {url}");
            self.progress.emit(ProgressEventKind::Navigating {
                source: Source::CarsCom,
                page: page_no,
                url: url.clone(),
            });
            navigate_tolerant(page, &url, self.config.nav_timeout_ms, &self.progress).await?;
            scroll(
                page,
                self.config.page_scroll_steps,
                self.config.scroll_delay_ms,
                self.config.scroll_jitter_ms,
            )
            .await?;

            match self.scrape_cards(page, page_no, cap, &mut collected).await {
                Ok(0) if page_no > 1 => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("cars.com DOM scrape error on page {page_no}: {e}");
                    self.progress.emit(ProgressEventKind::CardScrapeFailed {
                        source: Source::CarsCom,
                        page: page_no,
                        error: e.to_string(),
                    });
                }
            }
            if collected.rows.len() >= cap {
                break;
            }

            if collected.rows.is_empty() {
                info!("cars.com page {page_no} falling back to embedded JSON");
                self.progress.emit(ProgressEventKind::StructuredFallback {
                    source: Source::CarsCom,
                    page: page_no,
                });
                let html = page.html().await?;
                for row in structured_listings(&html, Source::CarsCom, &self.origin) {
                    collected.offer(row);
                    if collected.rows.len() >= cap {
                        break;
                    }
                }
                if collected.rows.len() >= cap {
                    break;
                }
            }
        }

        let rows = enforce_year(collected.rows, params.year, Some(Source::CarsCom), &self.progress);
        let rows = dedupe_and_trim(rows, cap);
        info!("cars.com returning {} rows", rows.len());
        self.progress.emit(ProgressEventKind::ScraperFinished {
            source: Source::CarsCom,
            rows: rows.len(),
        });
        Ok(rows)
    }
}
