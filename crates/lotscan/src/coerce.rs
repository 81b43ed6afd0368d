//! Coerce heterogeneous raw records into canonical [`Listing`]s.
//!
//! Raw records come from card scraping or from [`crate::structured`], and
//! every marketplace names its fields differently. Each listing field has an
//! ordered list of candidate keys; the first key holding a non-empty value
//! wins. Coercion never fails, it only leaves fields unset.

use crate::parse::{parse_miles, parse_price, parse_year, to_int};
use crate::types::{Listing, Source};
use crate::urls::absolutize;
use serde_json::{Map, Value};

const TITLE_KEYS: &[&str] = &["title", "heading"];
const PRICE_KEYS: &[&str] = &["price", "listPrice", "primaryPrice"];
const MILES_KEYS: &[&str] = &["miles", "mileage"];
const URL_KEYS: &[&str] = &["url", "vdpUrl", "link"];
const DEALER_KEYS: &[&str] = &["dealerName", "sellerName", "storeName"];
const LOCATION_KEYS: &[&str] = &["location", "city"];

/// Build a listing from a raw record, resolving relative links against
/// `base_url`.
pub fn coerce(raw: &Map<String, Value>, source: Source, base_url: &str) -> Listing {
    let title = first_present(raw, TITLE_KEYS).and_then(as_text);

    let year = raw
        .get("year")
        .filter(|v| is_present(v))
        .and_then(integer_year)
        .or_else(|| title.as_deref().and_then(parse_year));

    Listing {
        source,
        price: first_present(raw, PRICE_KEYS).and_then(|v| amount(v, parse_price)),
        miles: first_present(raw, MILES_KEYS).and_then(|v| amount(v, parse_miles)),
        year,
        location: first_present(raw, LOCATION_KEYS).and_then(as_text),
        dealer: first_present(raw, DEALER_KEYS).and_then(as_text),
        url: first_present(raw, URL_KEYS)
            .and_then(Value::as_str)
            .and_then(|href| absolutize(base_url, href)),
        title,
    }
}

/// First candidate key whose value is present and non-empty.
fn first_present<'a>(raw: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| raw.get(*k)).find(|v| is_present(v))
}

/// Null, `false`, zero, and empty strings/containers count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Numbers pass through; text goes through the marker-aware parser, then a
/// bare integer parse.
fn amount(value: &Value, parser: fn(&str) -> Option<u64>) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.round() as u64)
        }),
        Value::String(s) => parser(s).or_else(|| to_int(s)),
        _ => None,
    }
}

fn integer_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => to_int(s).and_then(|y| i32::try_from(y).ok()),
        _ => None,
    }
}
