//! Selector queries against a static HTML document.
//!
//! `scraper` types are `!Send`, so every function parses, queries, and drops
//! the document before returning. Callers hold only the markup string across
//! `.await` points.

use super::Scope;
use crate::error::{RenderError, RenderResult};
use scraper::{ElementRef, Html, Selector};

fn parse_selector(selector: &str) -> RenderResult<Selector> {
    Selector::parse(selector)
        .map_err(|e| RenderError::Query(format!("invalid selector {selector:?}: {e:?}")))
}

/// Number of elements matching `selector`.
pub fn count(html: &str, selector: &str) -> RenderResult<usize> {
    let sel = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let n = document.select(&sel).count();
    Ok(n)
}

/// Text content of the first `selector` match under `scope`.
pub fn text(html: &str, scope: &Scope, selector: &str) -> RenderResult<Option<String>> {
    first_match(html, scope, selector, |el| Some(el.text().collect::<String>()))
}

/// Attribute `name` of the first `selector` match under `scope`.
pub fn attribute(
    html: &str,
    scope: &Scope,
    selector: &str,
    name: &str,
) -> RenderResult<Option<String>> {
    first_match(html, scope, selector, |el| el.value().attr(name).map(str::to_string))
}

fn first_match<F>(html: &str, scope: &Scope, selector: &str, read: F) -> RenderResult<Option<String>>
where
    F: Fn(ElementRef<'_>) -> Option<String>,
{
    let inner = parse_selector(selector)?;
    let document = Html::parse_document(html);

    let found = match scope {
        Scope::Page => document.select(&inner).next(),
        Scope::Nth { selector, index } => {
            let outer = parse_selector(selector)?;
            match document.select(&outer).nth(*index) {
                Some(card) => card.select(&inner).next(),
                None => None,
            }
        }
    };

    Ok(found.and_then(read))
}
