//! Plain-text result listing.

use crate::types::Listing;
use std::fmt::Write;

/// `12345` -> `12,345`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn format_price(price: Option<u64>) -> String {
    match price {
        Some(p) => format!("${}", thousands(p)),
        None => "N/A".to_string(),
    }
}

pub fn format_miles(miles: Option<u64>) -> String {
    match miles {
        Some(m) => format!("{} mi", thousands(m)),
        None => "—".to_string(),
    }
}

/// Render a row count header followed by at most `limit` rows, two lines
/// each.
pub fn render_listings(rows: &[Listing], limit: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Got {} rows", rows.len());
    for row in rows.iter().take(limit) {
        let year = row.year.map_or_else(|| "?".to_string(), |y| y.to_string());
        let _ = writeln!(
            out,
            "[{}] {} | {} | {} | {}",
            row.source,
            year,
            format_price(row.price),
            format_miles(row.miles),
            row.title.as_deref().unwrap_or("(no title)"),
        );
        let _ = writeln!(out, "    {}", row.url.as_deref().unwrap_or(""));
    }
    out
}
