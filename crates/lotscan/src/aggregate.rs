//! Cross-source aggregation: run scrapers, merge, enrich, rank.

use crate::config::ScrapeConfig;
use crate::enrich::Enricher;
use crate::error::ScrapeError;
use crate::progress::{Progress, ProgressEventKind};
use crate::renderer::Renderer;
use crate::scrapers::{self, dedupe_and_trim, enforce_year, pause, SourceScraper};
use crate::types::{Listing, SearchParams, Source};
use futures::future::join_all;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

/// Enrichment progress is reported every this many visits.
const ENRICH_REPORT_EVERY: usize = 5;

/// Runs a set of source scrapers over one renderer and merges their output.
pub struct Aggregator {
    renderer: Arc<dyn Renderer>,
    config: Arc<ScrapeConfig>,
    progress: Progress,
    scrapers: Vec<Box<dyn SourceScraper>>,
}

impl Aggregator {
    /// An aggregator over every supported marketplace.
    pub fn new(renderer: Arc<dyn Renderer>, config: Arc<ScrapeConfig>, progress: Progress) -> Self {
        let scrapers = Source::ALL
            .iter()
            .map(|&s| scrapers::for_source(s, config.clone(), progress.clone()))
            .collect();
        Self {
            renderer,
            config,
            progress,
            scrapers,
        }
    }

    /// Restrict the run to `sources`.
    pub fn with_sources(mut self, sources: &[Source]) -> Self {
        self.scrapers = sources
            .iter()
            .map(|&s| scrapers::for_source(s, self.config.clone(), self.progress.clone()))
            .collect();
        self
    }

    /// Replace the scraper set outright.
    pub fn with_scrapers(mut self, scrapers: Vec<Box<dyn SourceScraper>>) -> Self {
        self.scrapers = scrapers;
        self
    }

    /// Scrape every source concurrently, merge and dedupe the rows,
    /// optionally enrich incomplete ones, then filter and rank.
    ///
    /// A failing scraper contributes no rows; it never fails the run.
    pub async fn aggregate(&self, params: &SearchParams, enrich: bool) -> Vec<Listing> {
        let rows = self.scrape_all(params).await;
        let mut rows = dedupe_and_trim(rows, usize::MAX);

        if enrich {
            rows = self.enrich_all(rows).await;
            rows = enforce_year(rows, params.year, None, &self.progress);
        }

        rows.retain(|r| r.url.is_some());
        sort_listings(&mut rows);
        info!("run complete: {} rows", rows.len());
        self.progress
            .emit(ProgressEventKind::RunComplete { rows: rows.len() });
        rows
    }

    async fn scrape_all(&self, params: &SearchParams) -> Vec<Listing> {
        info!("starting {} scraper tasks", self.scrapers.len());
        let runs = self.scrapers.iter().map(|scraper| async move {
            let source = scraper.source();
            let mut page = match self.renderer.new_context().await {
                Ok(page) => page,
                Err(e) => return (source, None, Err(ScrapeError::from(e))),
            };
            let result = scraper.scrape(page.as_mut(), params).await;
            (source, Some(page), result)
        });
        let outcomes = join_all(runs).await;

        let mut rows = Vec::new();
        let mut pages = Vec::new();
        for (source, page, result) in outcomes {
            pages.extend(page);
            match result {
                Ok(found) => rows.extend(found),
                Err(e) => {
                    warn!("{source} task error: {e}");
                    self.progress.emit(ProgressEventKind::ScraperFailed {
                        source,
                        error: e.to_string(),
                    });
                }
            }
        }

        for page in pages {
            if let Err(e) = page.close().await {
                warn!("failed to close scraper page: {e}");
            }
        }
        rows
    }

    /// Visit detail pages one at a time. Complete rows are left alone and a
    /// failed visit keeps the row as it was.
    async fn enrich_all(&self, rows: Vec<Listing>) -> Vec<Listing> {
        let total = rows.len();
        info!("enriching {total} rows via detail pages");
        self.progress
            .emit(ProgressEventKind::EnrichmentStarted { total });
        let enricher = Enricher::new(self.config.clone(), self.progress.clone());

        let mut out = Vec::with_capacity(total);
        for (i, row) in rows.into_iter().enumerate() {
            if row.is_complete() {
                out.push(row);
                continue;
            }
            match enricher.enrich(self.renderer.as_ref(), &row).await {
                Ok(enriched) => out.push(enriched),
                Err(e) => {
                    let url = row.url.clone().unwrap_or_default();
                    warn!("enrich error for {url}: {e}");
                    self.progress
                        .emit(ProgressEventKind::EnrichmentFailed {
                            url,
                            error: e.to_string(),
                        });
                    out.push(row);
                }
            }
            let done = i + 1;
            if done % ENRICH_REPORT_EVERY == 0 {
                self.progress
                    .emit(ProgressEventKind::EnrichmentProgress { done, total });
            }
            let jitter = rand::thread_rng().gen_range(0..=self.config.enrich_jitter_ms);
            pause(self.config.enrich_pacing_ms + jitter).await;
        }
        out
    }
}

/// Rank by price, then mileage. Unknown values sort after every known one
/// and equal keys keep their relative order.
pub fn sort_listings(rows: &mut [Listing]) {
    rows.sort_by_key(Listing::rank_key);
}
