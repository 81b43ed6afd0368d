//! End-to-end runs against local mock marketplaces using the HTTP engine.

use lotscan::progress::{channel, ProgressEventKind};
use lotscan::renderer::{HttpRenderer, Renderer};
use lotscan::scrapers::{Autotrader, CarsCom, SourceScraper};
use lotscan::{Aggregator, Progress, ScrapeConfig, SearchParams, Source};
use std::sync::Arc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTOTRADER_RESULTS: &str = r#"<html><body>
  <div data-cmp="inventoryListing">
    <h3 data-cmp="subheading">Used 2015 Toyota Camry LE</h3>
    <a href="/cars-for-sale/vehicle/111?zip=10001">view</a>
    <div data-cmp="price">$12,500</div>
  </div>
  <div data-cmp="inventoryListing">
    <h3 data-cmp="subheading">Used 2015 Toyota Camry SE</h3>
    <a href="/cars-for-sale/vehicle/222">view</a>
    <div data-cmp="price">$9,000</div>
    <div data-cmp="mileage">50,000 miles</div>
  </div>
</body></html>"#;

const CARS_PAGE_1: &str = r#"<html><body>
  <div class="vehicle-card">
    <a class="vehicle-card-link" href="/vehicledetail/c1/"><h2 class="title">2015 Toyota Camry XLE</h2></a>
    <span data-test="vehicleCardPriceAmount">$11,000</span>
    <div data-test="vehicleMileage">20,000 miles</div>
  </div>
  <div class="vehicle-card">
    <a class="vehicle-card-link" href="/cars-for-sale/vehicle/111?src=cars"><h2 class="title">2015 Toyota Camry LE</h2></a>
    <span data-test="vehicleCardPriceAmount">$12,400</span>
  </div>
  <div class="vehicle-card">
    <a class="vehicle-card-link" href="/vehicledetail/c3/"><h2 class="title">2016 Toyota Camry</h2></a>
    <span data-test="vehicleCardPriceAmount">$15,000</span>
  </div>
</body></html>"#;

const DETAIL_111: &str = r#"<html><body>
  <h1>2015 Toyota Camry LE</h1>
  <div class="vehicle-mileage">33,000 miles</div>
</body></html>"#;

async fn mount(server: &MockServer, route: &str, page: Option<&str>, body: &str) {
    let mut mock = Mock::given(method("GET")).and(path(route));
    if let Some(page) = page {
        mock = mock.and(query_param("page", page));
    }
    mock.respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn marketplace() -> MockServer {
    let server = MockServer::start().await;
    mount(&server, "/cars-for-sale/all-cars", None, AUTOTRADER_RESULTS).await;
    mount(&server, "/shopping/results/", Some("1"), CARS_PAGE_1).await;
    mount(&server, "/shopping/results/", Some("2"), "<html><body></body></html>").await;
    mount(&server, "/cars-for-sale/vehicle/111", None, DETAIL_111).await;
    server
}

fn config() -> Arc<ScrapeConfig> {
    let mut config = ScrapeConfig::default().without_delays();
    config.nav_timeout_ms = 5_000;
    Arc::new(config)
}

fn params() -> SearchParams {
    SearchParams {
        scroll_rounds: 2,
        ..SearchParams::default()
    }
}

fn scrapers(at_origin: &str, cars_origin: &str, progress: &Progress) -> Vec<Box<dyn SourceScraper>> {
    vec![
        Box::new(Autotrader::new(config(), progress.clone()).with_origin(at_origin)),
        Box::new(CarsCom::new(config(), progress.clone()).with_origin(cars_origin)),
    ]
}

#[tokio::test]
async fn test_merge_dedupe_and_rank() {
    let server = marketplace().await;
    let renderer = Arc::new(HttpRenderer::new(&config()).unwrap());
    let progress = Progress::disabled();
    let agg = Aggregator::new(renderer.clone(), config(), progress.clone())
        .with_scrapers(scrapers(&server.uri(), &server.uri(), &progress));

    let rows = agg.aggregate(&params(), false).await;

    let base = server.uri();
    let urls: Vec<_> = rows.iter().filter_map(|r| r.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{base}/cars-for-sale/vehicle/222"),
            format!("{base}/vehicledetail/c1/"),
            format!("{base}/cars-for-sale/vehicle/111"),
        ]
    );
    // The duplicate of vehicle 111 came from Autotrader, which is listed first.
    assert_eq!(rows[2].source, Source::Autotrader);
    assert_eq!(rows[2].price, Some(12_500));
    assert_eq!(rows[2].miles, None);
    assert!(rows.iter().all(|r| r.year == Some(2015)));
    assert_eq!(renderer.active_contexts(), 0);
}

#[tokio::test]
async fn test_enrichment_fills_missing_mileage_only() {
    let server = marketplace().await;
    let renderer = Arc::new(HttpRenderer::new(&config()).unwrap());
    let progress = Progress::disabled();
    let agg = Aggregator::new(renderer.clone(), config(), progress.clone())
        .with_scrapers(scrapers(&server.uri(), &server.uri(), &progress));

    let rows = agg.aggregate(&params(), true).await;
    assert_eq!(rows.len(), 3);

    let enriched = rows
        .iter()
        .find(|r| r.url.as_deref().is_some_and(|u| u.ends_with("/vehicle/111")))
        .unwrap();
    assert_eq!(enriched.miles, Some(33_000));
    assert_eq!(enriched.price, Some(12_500));
    assert_eq!(enriched.title.as_deref(), Some("Used 2015 Toyota Camry LE"));

    // Only the incomplete row is visited.
    let detail_visits = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().starts_with("/cars-for-sale/vehicle/"))
        .count();
    assert_eq!(detail_visits, 1);
    assert_eq!(renderer.active_contexts(), 0);
}

#[tokio::test]
async fn test_unreachable_source_is_isolated() {
    let server = marketplace().await;
    let renderer = Arc::new(HttpRenderer::new(&config()).unwrap());
    let (tx, mut rx) = channel();
    let progress = Progress::new(tx);
    let agg = Aggregator::new(renderer, config(), progress.clone())
        .with_scrapers(scrapers("http://127.0.0.1:1", &server.uri(), &progress));

    let rows = agg.aggregate(&params(), false).await;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.source == Source::CarsCom));

    let mut failed = None;
    let mut completed = None;
    while let Ok(ev) = rx.try_recv() {
        match ev.event {
            ProgressEventKind::ScraperFailed { source, .. } => failed = Some(source),
            ProgressEventKind::RunComplete { rows } => completed = Some(rows),
            _ => {}
        }
    }
    assert_eq!(failed, Some(Source::Autotrader));
    assert_eq!(completed, Some(2));
}

#[tokio::test]
async fn test_client_rendered_results_use_embedded_json() {
    let server = MockServer::start().await;
    let body = r#"<html><body><div id="root"></div>
      <script id="__NEXT_DATA__" type="application/json">
        {"props": {"pageProps": {"results": [
          {"heading": "2015 Toyota Camry LE", "primaryPrice": "$10,900", "mileage": 88000, "vdpUrl": "/vehicledetail/j1/"},
          {"heading": "2015 Toyota Camry SE", "primaryPrice": 0, "mileage": "41,500 mi", "vdpUrl": "/vehicledetail/j2/?ref=x"}
        ]}}}
      </script></body></html>"#;
    mount(&server, "/shopping/results/", Some("1"), body).await;
    mount(&server, "/shopping/results/", Some("2"), "<html></html>").await;

    let renderer = Arc::new(HttpRenderer::new(&config()).unwrap());
    let progress = Progress::disabled();
    let agg = Aggregator::new(renderer, config(), progress.clone()).with_scrapers(vec![Box::new(
        CarsCom::new(config(), progress).with_origin(&server.uri()),
    )]);

    let rows = agg.aggregate(&params(), false).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].price, Some(10_900));
    assert_eq!(rows[0].miles, Some(88_000));
    // A zero price counts as unknown and sorts last.
    assert_eq!(rows[1].price, None);
    assert_eq!(rows[1].url, Some(format!("{}/vehicledetail/j2/", server.uri())));
}
