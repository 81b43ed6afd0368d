// Copyright 2026 Lotscan Contributors
// SPDX-License-Identifier: MIT

//! lotscan: search used-vehicle marketplaces from the command line.

mod dns;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use lotscan::progress::{self, ProgressReceiver};
use lotscan::renderer::{ChromiumRenderer, HttpRenderer, Renderer};
use lotscan::report::render_listings;
use lotscan::{Aggregator, Listing, Progress, ScrapeConfig, SearchParams, Source};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(
    name = "lotscan",
    about = "Lotscan: search several used-car marketplaces at once",
    version
)]
struct Cli {
    #[arg(default_value = "Toyota")]
    make: String,

    #[arg(default_value = "Camry")]
    model: String,

    /// Exact model year to keep.
    #[arg(default_value_t = 2015)]
    year: i32,

    #[arg(default_value = "10001")]
    zip_code: String,

    /// Search radius in miles.
    #[arg(long, default_value_t = 500)]
    radius: u32,

    /// Max results per site.
    #[arg(long = "max", default_value_t = 8)]
    max_results: usize,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,

    /// Visit detail pages to fill in missing fields.
    #[arg(long)]
    enrich: bool,

    #[arg(long, value_enum, default_value_t = Site::Both)]
    site: Site,

    /// Debug logging plus browser network diagnostics.
    #[arg(long)]
    debug: bool,

    /// Cars.com result pages to fetch.
    #[arg(long, default_value_t = 5)]
    max_pages: u32,

    /// Stable rounds required before Autotrader scrolling stops.
    #[arg(long, default_value_t = 12)]
    scroll_rounds: u32,

    /// Page engine. `http` skips the browser and reads static markup only.
    #[arg(long, value_enum, default_value_t = Engine::Chromium)]
    engine: Engine,

    /// Rows to print in text mode.
    #[arg(long, default_value_t = 24)]
    limit: usize,

    /// Print results as JSON.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long)]
    log_json: bool,

    /// Suppress progress lines.
    #[arg(long, short)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Site {
    Both,
    Autotrader,
    Cars,
}

impl Site {
    fn sources(self) -> Vec<Source> {
        match self {
            Site::Both => Source::ALL.to_vec(),
            Site::Autotrader => vec![Source::Autotrader],
            Site::Cars => vec![Source::CarsCom],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Engine {
    Chromium,
    Http,
}

impl Cli {
    fn search_params(&self) -> SearchParams {
        SearchParams {
            make: self.make.clone(),
            model: self.model.clone(),
            year: self.year,
            zip: self.zip_code.clone(),
            radius: self.radius,
            max_results: self.max_results,
            max_pages: self.max_pages,
            scroll_rounds: self.scroll_rounds,
        }
    }

    fn scrape_config(&self) -> ScrapeConfig {
        let mut config = ScrapeConfig::from_env();
        config.headless = !self.headed;
        config.debug = self.debug;
        config
    }
}

fn init_tracing(cli: &Cli) {
    let level = if cli.debug { "debug" } else { cli.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Print progress events to stderr until every sender is gone.
async fn print_progress(mut rx: ProgressReceiver) {
    loop {
        match rx.recv().await {
            Ok(ev) => eprintln!("{}", ev.event),
            Err(RecvError::Lagged(n)) => eprintln!("[MAIN] ({n} progress events skipped)"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn render_json(rows: &[Listing]) -> Result<String> {
    serde_json::to_string_pretty(rows).context("failed to serialize listings")
}

async fn launch(engine: Engine, config: &ScrapeConfig) -> Result<Arc<dyn Renderer>> {
    let renderer: Arc<dyn Renderer> = match engine {
        Engine::Chromium => Arc::new(
            ChromiumRenderer::launch(config)
                .await
                .context("failed to launch Chromium")?,
        ),
        Engine::Http => Arc::new(HttpRenderer::new(config)?),
    };
    Ok(renderer)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let sources = cli.site.sources();
    let hosts: Vec<&str> = sources.iter().map(|s| s.host()).collect();
    dns::warn_unresolved(&hosts).await;

    let config = Arc::new(cli.scrape_config());
    let renderer = launch(cli.engine, &config).await?;

    let (tx, rx) = progress::channel();
    let printer = if cli.quiet {
        drop(rx);
        None
    } else {
        Some(tokio::spawn(print_progress(rx)))
    };

    let rows = Aggregator::new(renderer.clone(), config, Progress::new(tx))
        .with_sources(&sources)
        .aggregate(&cli.search_params(), cli.enrich)
        .await;

    if let Err(e) = renderer.shutdown().await {
        warn!("renderer shutdown failed: {e}");
    }
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if cli.json {
        println!("{}", render_json(&rows)?);
    } else {
        print!("{}", render_listings(&rows, cli.limit));
    }
    Ok(())
}
