//! Mine embedded JSON payloads for listing-shaped records.
//!
//! Marketplaces ship their result sets to the browser as JSON long before
//! the cards are painted: a Next.js-style `__NEXT_DATA__` bootstrap
//! assignment, or `<script type="application/json">` / JSON-LD blocks. When
//! card selectors miss, the scrapers fall back to this module, which finds
//! every object that *looks* like a listing without knowing any site's
//! schema.

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::OnceLock;

/// Key vocabulary of a listing-shaped object.
pub const LISTING_KEYS: [&str; 13] = [
    "price",
    "listPrice",
    "primaryPrice",
    "mileage",
    "miles",
    "year",
    "make",
    "model",
    "title",
    "heading",
    "vdpUrl",
    "url",
    "vin",
];

/// Minimum number of vocabulary keys an object must carry.
pub const MIN_MATCHING_KEYS: usize = 3;

fn next_data_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)__NEXT_DATA__\s*=\s*(\{.*?\})\s*[,;]<").expect("next data regex is valid")
    })
}

fn json_script_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| {
        Selector::parse(r#"script[type="application/json"], script[type="application/ld+json"]"#)
            .expect("json script selector is valid")
    })
}

/// Parse every embedded JSON blob in the page.
///
/// Blobs that fail to parse are skipped; one malformed script never hides
/// the others.
pub fn json_candidates(html: &str) -> Vec<Value> {
    let mut out = Vec::new();

    for caps in next_data_re().captures_iter(html) {
        if let Ok(value) = serde_json::from_str::<Value>(&caps[1]) {
            out.push(value);
        }
    }

    let document = Html::parse_document(html);
    for element in document.select(json_script_selector()) {
        let text = element.text().collect::<String>();
        let text = text.trim();
        if !(text.starts_with('{') || text.starts_with('[')) {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<Value>(text) {
            out.push(value);
        }
    }

    out
}

/// True when at least [`MIN_MATCHING_KEYS`] distinct keys of `obj`
/// (compared case-insensitively) belong to [`LISTING_KEYS`].
pub fn looks_like_listing(obj: &Map<String, Value>) -> bool {
    let keys: HashSet<String> = obj.keys().map(|k| k.to_lowercase()).collect();
    LISTING_KEYS
        .iter()
        .filter(|k| keys.contains(&k.to_lowercase()))
        .count()
        >= MIN_MATCHING_KEYS
}

/// Depth-first search for listing-shaped objects.
///
/// Matching objects are collected and still descended into, since wrapper
/// records often nest the real listing one level down.
pub fn find_listings(value: &Value) -> Vec<&Map<String, Value>> {
    let mut out = Vec::new();
    walk(value, &mut out);
    out
}

fn walk<'a>(value: &'a Value, out: &mut Vec<&'a Map<String, Value>>) {
    match value {
        Value::Object(obj) => {
            if looks_like_listing(obj) {
                out.push(obj);
            }
            for child in obj.values() {
                walk(child, out);
            }
        }
        Value::Array(items) => {
            for child in items {
                walk(child, out);
            }
        }
        _ => {}
    }
}

/// Every listing-shaped object in the page, in document order.
pub fn listing_candidates(html: &str) -> Vec<Map<String, Value>> {
    json_candidates(html)
        .iter()
        .flat_map(|blob| find_listings(blob).into_iter().cloned().collect::<Vec<_>>())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_looks_like_listing_threshold() {
        assert!(looks_like_listing(&obj(json!({"price": 1, "year": 2015, "vin": "X"}))));
        assert!(!looks_like_listing(&obj(json!({"price": 1, "year": 2015, "color": "red"}))));
    }

    #[test]
    fn test_looks_like_listing_is_case_insensitive() {
        assert!(looks_like_listing(&obj(json!({"PRICE": 1, "Mileage": 2, "VdpUrl": "/x"}))));
        assert!(looks_like_listing(&obj(json!({"listprice": 1, "MAKE": "Toyota", "Model": "Camry"}))));
    }

    #[test]
    fn test_duplicate_case_keys_count_once() {
        assert!(!looks_like_listing(&obj(json!({"price": 1, "Price": 2, "year": 2015}))));
    }

    #[test]
    fn test_find_listings_descends_into_matches() {
        let data = json!({
            "props": {
                "results": [
                    {
                        "title": "wrapper", "url": "/a", "year": 2015,
                        "vehicle": {"make": "Toyota", "model": "Camry", "vin": "4T1"}
                    },
                    {"heading": "2015 Camry", "listPrice": "$9,000", "vdpUrl": "/b"},
                    {"unrelated": true}
                ]
            }
        });
        let found = find_listings(&data);
        assert_eq!(found.len(), 3);
        assert_eq!(found[0]["title"], "wrapper");
        assert_eq!(found[1]["vin"], "4T1");
        assert_eq!(found[2]["vdpUrl"], "/b");
    }

    #[test]
    fn test_find_listings_scalar_root() {
        assert!(find_listings(&json!("just a string")).is_empty());
        assert!(find_listings(&json!(42)).is_empty());
    }

    #[test]
    fn test_json_candidates_next_data_assignment() {
        let html = r#"<html><body><script>window.__NEXT_DATA__ = {"a": {"price": 1, "year": 2015, "url": "/x"}};</script></body></html>"#;
        let blobs = json_candidates(html);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0]["a"]["price"], 1);
    }

    #[test]
    fn test_json_candidates_script_types() {
        let html = r#"
        <html><head>
        <script type="application/ld+json">{"@type": "Car", "name": "Camry"}</script>
        <script id="__NEXT_DATA__" type="application/json">{"props": {"pageProps": {}}}</script>
        <script type="application/json">[{"vin": "A"}]</script>
        <script type="text/javascript">var x = {"price": 1};</script>
        </head><body></body></html>
        "#;
        let blobs = json_candidates(html);
        assert_eq!(blobs.len(), 3);
        assert!(blobs[2].is_array());
    }

    #[test]
    fn test_malformed_blob_does_not_hide_others() {
        let html = r#"
        <script type="application/json">{"broken": </script>
        <script type="application/ld+json">{"price": "$9,000", "year": "2015", "url": "/vdp/1"}</script>
        "#;
        let candidates = listing_candidates(html);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0]["url"], "/vdp/1");
    }
}
