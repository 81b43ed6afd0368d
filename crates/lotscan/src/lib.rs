// Copyright 2026 Lotscan Contributors
// SPDX-License-Identifier: MIT

//! Lotscan: used-vehicle listing aggregation across several marketplaces.
//!
//! The pipeline runs per-source scrapers concurrently over a shared browser,
//! coerces whatever they find into [`Listing`] records, deduplicates by
//! normalized URL, optionally backfills missing fields from each listing's
//! detail page, and ranks the result by price then mileage.

pub mod aggregate;
pub mod coerce;
pub mod config;
pub mod enrich;
pub mod error;
pub mod parse;
pub mod progress;
pub mod renderer;
pub mod report;
pub mod scrapers;
pub mod structured;
pub mod types;
pub mod urls;

pub use aggregate::{sort_listings, Aggregator};
pub use config::ScrapeConfig;
pub use error::{RenderError, ScrapeError};
pub use progress::{Progress, ProgressEvent};
pub use types::{Listing, SearchParams, Source};
