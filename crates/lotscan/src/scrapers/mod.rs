//! Per-marketplace scrapers and the helpers they share.
//!
//! Every scraper follows the same contract: load its search results, expose
//! as many cards as it can, read each card field from an ordered list of
//! selector candidates, fall back to embedded JSON when the cards come up
//! short, then apply the exact-year filter, dedupe by normalized URL and
//! truncate to the result cap.

pub mod autotrader;
pub mod cars_com;

pub use autotrader::Autotrader;
pub use cars_com::CarsCom;

use crate::coerce::coerce;
use crate::config::ScrapeConfig;
use crate::error::{RenderError, ScrapeError};
use crate::progress::{Progress, ProgressEventKind};
use crate::renderer::{RenderContext, Scope};
use crate::structured::listing_candidates;
use crate::types::{Listing, SearchParams, Source};
use crate::urls::normalize;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Pixels per synthetic scroll step.
const SCROLL_DELTA: i64 = 1600;

/// A marketplace scraper.
#[async_trait]
pub trait SourceScraper: Send + Sync {
    fn source(&self) -> Source;

    /// Scrape up to `params.max_results` listings using `page`, which the
    /// caller owns and closes.
    async fn scrape(
        &self,
        page: &mut dyn RenderContext,
        params: &SearchParams,
    ) -> Result<Vec<Listing>, ScrapeError>;
}

/// Build the scraper for `source`.
pub fn for_source(
    source: Source,
    config: Arc<ScrapeConfig>,
    progress: Progress,
) -> Box<dyn SourceScraper> {
    match source {
        Source::Autotrader => Box::new(Autotrader::new(config, progress)),
        Source::CarsCom => Box::new(CarsCom::new(config, progress)),
    }
}

pub(crate) fn validate(params: &SearchParams) -> Result<(), ScrapeError> {
    if params.make.trim().is_empty() || params.model.trim().is_empty() {
        return Err(ScrapeError::InvalidParams("make and model are required".into()));
    }
    if params.max_results == 0 {
        return Err(ScrapeError::InvalidParams("result cap must be positive".into()));
    }
    Ok(())
}

/// Navigate, treating a timeout as "carry on with what loaded".
pub(crate) async fn navigate_tolerant(
    page: &mut dyn RenderContext,
    url: &str,
    timeout_ms: u64,
    progress: &Progress,
) -> Result<(), RenderError> {
    match page.navigate(url, timeout_ms).await {
        Ok(_) => Ok(()),
        Err(e) if e.is_timeout() => {
            warn!("{e}; continuing with current page state");
            progress.emit(ProgressEventKind::NavigationTimedOut {
                url: url.to_string(),
            });
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Scroll `steps` times with a jittered pause after each step.
pub(crate) async fn scroll(
    page: &dyn RenderContext,
    steps: u32,
    delay_ms: u64,
    jitter_ms: u64,
) -> Result<(), RenderError> {
    for _ in 0..steps {
        page.scroll(SCROLL_DELTA).await?;
        let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
        pause(delay_ms + jitter).await;
    }
    Ok(())
}

pub(crate) async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Text of the first selector that yields non-blank text, trimmed.
///
/// Misses and query errors are expected and silently skipped.
pub(crate) async fn first_text(
    page: &dyn RenderContext,
    scope: &Scope,
    selectors: &[&str],
    timeout_ms: u64,
) -> Option<String> {
    for sel in selectors {
        if let Ok(Some(text)) = page.text(scope, sel, timeout_ms).await {
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

/// Attribute of the first selector that yields a non-empty value.
pub(crate) async fn first_attr(
    page: &dyn RenderContext,
    scope: &Scope,
    selectors: &[&str],
    name: &str,
    timeout_ms: u64,
) -> Option<String> {
    for sel in selectors {
        if let Ok(Some(value)) = page.attribute(scope, sel, name, timeout_ms).await {
            if !value.is_empty() {
                return Some(value);
            }
        }
    }
    None
}

/// Listings coerced from the page's embedded JSON.
pub(crate) fn structured_listings(html: &str, source: Source, base_url: &str) -> Vec<Listing> {
    listing_candidates(html)
        .iter()
        .map(|raw| coerce(raw, source, base_url))
        .collect()
}

/// Keep only listings whose year is exactly `year`.
///
/// An empty result is reported as an advisory, never as an error.
pub fn enforce_year(
    rows: Vec<Listing>,
    year: i32,
    source: Option<Source>,
    progress: &Progress,
) -> Vec<Listing> {
    let filtered: Vec<Listing> = rows.into_iter().filter(|r| r.year == Some(year)).collect();
    if filtered.is_empty() {
        info!("no exact year {year} results; widen the radius or try another zip/year");
        progress.emit(ProgressEventKind::NoYearMatches { source, year });
    }
    filtered
}

/// Drop URL-less and repeated listings, rewrite each URL to its normalized
/// form, and stop at `cap`. First occurrence wins.
pub fn dedupe_and_trim(rows: Vec<Listing>, cap: usize) -> Vec<Listing> {
    let mut seen = HashSet::new();
    let mut unique = Vec::new();
    for mut row in rows {
        if unique.len() >= cap {
            break;
        }
        let Some(norm) = row.url.as_deref().and_then(normalize) else {
            continue;
        };
        if !seen.insert(norm.clone()) {
            continue;
        }
        row.url = Some(norm);
        unique.push(row);
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::channel;

    fn listing(url: Option<&str>, year: Option<i32>) -> Listing {
        let mut l = Listing::new(Source::CarsCom);
        l.url = url.map(str::to_string);
        l.year = year;
        l
    }

    #[test]
    fn test_dedupe_first_wins_and_normalizes() {
        let mut a = listing(Some("https://x.com/v/1?src=a"), Some(2015));
        a.price = Some(1);
        let mut b = listing(Some("https://x.com/v/1#photos"), Some(2015));
        b.price = Some(2);
        let c = listing(None, Some(2015));
        let d = listing(Some("https://x.com/v/2"), Some(2015));

        let out = dedupe_and_trim(vec![a, b, c, d], 10);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].price, Some(1));
        assert_eq!(out[0].url.as_deref(), Some("https://x.com/v/1"));
        assert_eq!(out[1].url.as_deref(), Some("https://x.com/v/2"));
    }

    #[test]
    fn test_dedupe_truncates_to_cap() {
        let rows = (0..5)
            .map(|i| listing(Some(&format!("https://x.com/v/{i}")), None))
            .collect();
        assert_eq!(dedupe_and_trim(rows, 3).len(), 3);
    }

    #[test]
    fn test_enforce_year_exact_match() {
        let progress = Progress::disabled();
        let rows = vec![
            listing(Some("https://x.com/1"), Some(2015)),
            listing(Some("https://x.com/2"), Some(2016)),
            listing(Some("https://x.com/3"), None),
        ];
        let out = enforce_year(rows, 2015, None, &progress);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].url.as_deref(), Some("https://x.com/1"));
    }

    #[test]
    fn test_enforce_year_empty_emits_advisory() {
        let (tx, mut rx) = channel();
        let progress = Progress::new(tx);
        let out = enforce_year(
            vec![listing(Some("https://x.com/1"), Some(2014))],
            2015,
            Some(Source::CarsCom),
            &progress,
        );
        assert!(out.is_empty());
        assert_eq!(
            rx.try_recv().unwrap().event,
            ProgressEventKind::NoYearMatches {
                source: Some(Source::CarsCom),
                year: 2015
            }
        );
    }

    #[test]
    fn test_validate() {
        let mut params = SearchParams::default();
        assert!(validate(&params).is_ok());
        params.max_results = 0;
        assert!(matches!(validate(&params), Err(ScrapeError::InvalidParams(_))));
    }
}
