use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::metadata::types::{MetadataResult, NormalizedUrl};

static META_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta").expect("Failed to parse meta selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("Failed to parse title selector"));
static LINK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("link[rel][href]").expect("Failed to parse link selector"));

const TITLE_KEYS: [&str; 2] = ["og:title", "twitter:title"];
const DESCRIPTION_KEYS: [&str; 3] = ["og:description", "twitter:description", "description"];
const ICON_RELS: [&str; 3] = ["icon", "shortcut icon", "apple-touch-icon"];

/// Pull title, description and icon out of a page.
///
/// Works on any input, including truncated or non-HTML bodies; every field
/// has a defined answer when nothing matches.
pub fn extract(html: &str, base: &NormalizedUrl) -> MetadataResult {
    let document = Html::parse_document(html);

    let title = meta_content(&document, &TITLE_KEYS)
        .or_else(|| title_text(&document))
        .unwrap_or_else(|| base.as_str().to_string());

    let description = meta_content(&document, &DESCRIPTION_KEYS);

    MetadataResult {
        title,
        description,
        icon: Some(resolve_icon(&document, base)),
        is_fallback: false,
        normalized_url: base.as_str().to_string(),
    }
}

/// First non-empty `content` for the candidate keys, in key order.
///
/// A `<meta>` matches through either `property` or `name`, so `og:*` tags
/// written with `name=` and `twitter:*` tags written with `property=` count.
fn meta_content(document: &Html, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        document.select(&META_SELECTOR).find_map(|element| {
            let meta = element.value();
            let matches = ["property", "name"].into_iter().any(|attr| {
                meta.attr(attr)
                    .is_some_and(|value| value.trim().eq_ignore_ascii_case(key))
            });
            if !matches {
                return None;
            }
            non_empty(meta.attr("content"))
        })
    })
}

fn title_text(document: &Html) -> Option<String> {
    document
        .select(&TITLE_SELECTOR)
        .find_map(|element| non_empty(Some(element.text().collect::<String>().as_str())))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn is_icon_link(element: &ElementRef) -> bool {
    let rel = element
        .value()
        .attr("rel")
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    ICON_RELS.contains(&rel.as_str())
}

/// Absolute icon URL: the first declared icon with a usable href, else
/// `/favicon.ico`, resolved against the page. Empty and `data:` hrefs are
/// passed over in favour of later icon links. Anything that does not resolve to http(s) becomes
/// `<origin>/favicon.ico`.
fn resolve_icon(document: &Html, base: &NormalizedUrl) -> String {
    let declared = document
        .select(&LINK_SELECTOR)
        .filter(is_icon_link)
        .filter_map(|element| non_empty(element.value().attr("href")))
        .find(|href| {
            let inline = href.to_ascii_lowercase().starts_with("data:");
            if inline {
                log::debug!("{base}: skipping inline icon");
            }
            !inline
        });

    let href = declared.as_deref().unwrap_or("/favicon.ico");

    match base.url().join(href) {
        Ok(icon) if matches!(icon.scheme(), "http" | "https") => icon.to_string(),
        _ => base.default_favicon(),
    }
}
