use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

pub const RESULT_LINKS: &str = "#bike_results_container a";
pub const RIDING_STYLE_LINKS: &str = "#riding_styles_list a";

pub static RESULT_LINKS_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(RESULT_LINKS).unwrap());
pub static RIDING_STYLE_LINKS_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(RIDING_STYLE_LINKS).unwrap());

/// Absolute http(s) hrefs of every anchor matching `selector`, in document
/// order, without duplicates. Relative and malformed hrefs are dropped.
pub fn collect_links(html: &str, selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in document.select(selector) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let href = href.trim();
        if !is_absolute_http(href) || !seen.insert(href.to_string()) {
            continue;
        }
        links.push(href.to_string());
    }

    links
}

pub fn is_https(href: &str) -> bool {
    Url::parse(href).is_ok_and(|u| u.scheme() == "https" && u.has_host())
}

pub fn is_absolute_http(href: &str) -> bool {
    Url::parse(href)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
        .unwrap_or(false)
}

// ── Tests ──
