//! Core data types: the canonical listing record and search parameters.

use serde::{Deserialize, Serialize};

/// A marketplace that lotscan knows how to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "Autotrader")]
    Autotrader,
    #[serde(rename = "Cars.com")]
    CarsCom,
}

impl Source {
    /// Every supported marketplace, in scrape-launch order.
    pub const ALL: [Source; 2] = [Source::Autotrader, Source::CarsCom];

    /// Display label used in output and serialized records.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Autotrader => "Autotrader",
            Self::CarsCom => "Cars.com",
        }
    }

    /// Short tag used in progress output.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Autotrader => "AT",
            Self::CarsCom => "CARS",
        }
    }

    /// Origin that relative listing links are resolved against.
    pub fn origin(&self) -> &'static str {
        match self {
            Self::Autotrader => "https://www.autotrader.com",
            Self::CarsCom => "https://www.cars.com",
        }
    }

    /// Hostname, for reachability checks.
    pub fn host(&self) -> &'static str {
        match self {
            Self::Autotrader => "www.autotrader.com",
            Self::CarsCom => "www.cars.com",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One vehicle-for-sale offer in canonical form.
///
/// `url` is the identity key. Scrapers and the aggregator drop any record
/// without one, and deduplicate on its normalized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub source: Source,
    pub title: Option<String>,
    /// Whole dollars.
    pub price: Option<u64>,
    /// Odometer reading.
    pub miles: Option<u64>,
    pub year: Option<i32>,
    pub location: Option<String>,
    pub dealer: Option<String>,
    pub url: Option<String>,
}

impl Listing {
    /// An empty record for `source`; every field unknown.
    pub fn new(source: Source) -> Self {
        Self {
            source,
            title: None,
            price: None,
            miles: None,
            year: None,
            location: None,
            dealer: None,
            url: None,
        }
    }

    /// True when nothing a detail-page visit could add is missing.
    pub fn is_complete(&self) -> bool {
        self.price.is_some() && self.miles.is_some() && self.title.is_some() && self.year.is_some()
    }

    /// Ranking key: price then miles, unknown values after every known one.
    pub fn rank_key(&self) -> (u64, u64) {
        (
            self.price.unwrap_or(u64::MAX),
            self.miles.unwrap_or(u64::MAX),
        )
    }
}

/// What to search for and how far to dig on each marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    pub make: String,
    pub model: String,
    pub year: i32,
    pub zip: String,
    /// Search radius in miles.
    pub radius: u32,
    /// Result cap per marketplace.
    pub max_results: usize,
    /// Page ceiling for marketplaces with numbered result pages.
    pub max_pages: u32,
    /// Consecutive stable rounds required before infinite scroll is
    /// considered exhausted.
    pub scroll_rounds: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            make: "Toyota".into(),
            model: "Camry".into(),
            year: 2015,
            zip: "10001".into(),
            radius: 500,
            max_results: 8,
            max_pages: 5,
            scroll_rounds: 12,
        }
    }
}
