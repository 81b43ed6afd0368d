//! Text → value field parsers for price, mileage and model year.
//!
//! Every parser takes whatever text a card or detail page produced and
//! returns `None` when no usable token is present. Nothing here panics or
//! errors on malformed input.

use regex::Regex;
use std::sync::OnceLock;

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\s*([\d,]+)").expect("price regex is valid"))
}

fn miles_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)([\d,]+)\s*miles?").expect("miles regex is valid"))
}

fn year_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:19|20)\d{2}\b").expect("year regex is valid"))
}

/// Parse a bare integer, tolerating thousands separators and padding.
pub fn to_int(text: &str) -> Option<u64> {
    text.replace(',', "").trim().parse().ok()
}

/// First `$`-marked amount, e.g. `"$12,500 OBO"` → `12500`.
pub fn parse_price(text: &str) -> Option<u64> {
    if text.is_empty() {
        return None;
    }
    let text = text.replace('\u{a0}', " ");
    let caps = price_re().captures(&text)?;
    to_int(&caps[1])
}

/// First number followed by "mile"/"miles", e.g. `"45,213 miles"` → `45213`.
pub fn parse_miles(text: &str) -> Option<u64> {
    if text.is_empty() {
        return None;
    }
    let text = text.replace('\u{a0}', " ");
    let caps = miles_re().captures(&text)?;
    to_int(&caps[1])
}

/// First standalone 19xx/20xx token.
pub fn parse_year(text: &str) -> Option<i32> {
    if text.is_empty() {
        return None;
    }
    year_re().find(text)?.as_str().parse().ok()
}
