// Copyright 2026 Lotscan Contributors
// SPDX-License-Identifier: MIT

//! Progress event types and broadcast channel for run telemetry.
//!
//! Scrapers, the enrichment worker and the aggregator report what they are
//! doing through a [`Progress`] handle instead of printing. Events flow
//! through a `tokio::sync::broadcast` channel to any subscriber (the CLI
//! progress printer, tests). When nobody subscribes, events are dropped.

use crate::types::Source;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A progress event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Monotonically increasing sequence number, shared across all tasks.
    pub seq: u64,
    /// The kind of progress event.
    pub event: ProgressEventKind,
}

/// The specific kind of progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEventKind {
    /// A scraper is loading a results page.
    Navigating {
        source: Source,
        page: u32,
        url: String,
    },
    /// Navigation hit its deadline; scraping continues on the partial page.
    NavigationTimedOut { url: String },
    /// Cards visible on a results page.
    CardsFound {
        source: Source,
        page: u32,
        count: usize,
    },
    /// Emitted every ten cards.
    CardsProcessed {
        source: Source,
        page: u32,
        processed: usize,
        total: usize,
    },
    /// Card extraction failed partway; rows collected so far are kept.
    CardScrapeFailed {
        source: Source,
        page: u32,
        error: String,
    },
    /// Card scraping came up short; mining embedded JSON instead.
    StructuredFallback { source: Source, page: u32 },
    /// The exact-year filter removed every row. Advisory, not an error.
    NoYearMatches { source: Option<Source>, year: i32 },
    ScraperFinished { source: Source, rows: usize },
    /// A scraper task failed; its source contributes no rows.
    ScraperFailed { source: Source, error: String },
    EnrichmentStarted { total: usize },
    DetailVisiting { url: String },
    /// Emitted every five listings.
    EnrichmentProgress { done: usize, total: usize },
    /// One detail visit failed; the listing is kept as it was.
    EnrichmentFailed { url: String, error: String },
    RunComplete { rows: usize },
}

impl std::fmt::Display for ProgressEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Navigating { source, page, url } => {
                write!(f, "[{}] Navigating page {page}: {url}", source.tag())
            }
            Self::NavigationTimedOut { url } => {
                write!(f, "[NAV] Navigation timed out; continuing: {url}")
            }
            Self::CardsFound {
                source,
                page,
                count,
            } => write!(f, "[{}] Page {page} cards: {count}", source.tag()),
            Self::CardsProcessed {
                source,
                page,
                processed,
                total,
            } => write!(
                f,
                "[{}] Page {page}: processed {processed}/{total} cards",
                source.tag()
            ),
            Self::CardScrapeFailed {
                source,
                page,
                error,
            } => write!(f, "[{}] DOM scrape error on page {page}: {error}", source.tag()),
            Self::StructuredFallback { source, page } => write!(
                f,
                "[{}] Page {page} falling back to embedded JSON",
                source.tag()
            ),
            Self::NoYearMatches { source, year } => {
                let tag = source.map(|s| s.tag()).unwrap_or("FILTER");
                write!(
                    f,
                    "[{tag}] No exact year {year} results. Increase --radius or try another ZIP/year."
                )
            }
            Self::ScraperFinished { source, rows } => {
                write!(f, "[{}] Returning {rows} rows", source.tag())
            }
            Self::ScraperFailed { source, error } => {
                write!(f, "[{}] Task error: {error}", source.tag())
            }
            Self::EnrichmentStarted { total } => {
                write!(f, "[MAIN] Enriching {total} rows via detail pages...")
            }
            Self::DetailVisiting { url } => write!(f, "[VDP] Visiting: {url}"),
            Self::EnrichmentProgress { done, total } => {
                write!(f, "[MAIN] Enriched {done}/{total}")
            }
            Self::EnrichmentFailed { url, error } => {
                write!(f, "[VDP] Enrich error for {url}: {error}")
            }
            Self::RunComplete { rows } => write!(f, "[MAIN] Done. {rows} rows total."),
        }
    }
}

/// Sender handle for emitting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Cloneable emitter handed to every pipeline component.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    tx: Option<ProgressSender>,
    seq: Arc<AtomicU64>,
}

impl Progress {
    pub fn new(tx: ProgressSender) -> Self {
        Self {
            tx: Some(tx),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// An emitter that drops everything.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Emit an event, ignoring the error a channel with no receivers returns.
    pub fn emit(&self, event: ProgressEventKind) {
        if let Some(ref sender) = self.tx {
            let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = sender.send(ProgressEvent { seq, event });
        }
    }
}
