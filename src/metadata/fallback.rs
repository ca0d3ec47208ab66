use crate::metadata::types::{MetadataResult, NormalizedUrl};

/// Metadata that needs no network: a title guessed from the host name and
/// the conventional favicon location.
pub fn fallback(url: &NormalizedUrl) -> MetadataResult {
    let title = title_from_host(url.host());

    MetadataResult {
        title: if title.is_empty() {
            url.as_str().to_string()
        } else {
            title
        },
        description: None,
        icon: Some(url.default_favicon()),
        is_fallback: true,
        normalized_url: url.as_str().to_string(),
    }
}

/// `www.my-cool-site.com` becomes `My Cool Site`. Leading and trailing
/// hyphens leave no stray spaces, so `-foo.com` is `Foo`.
pub fn title_from_host(host: &str) -> String {
    let host = host.strip_prefix("www.").unwrap_or(host);
    let name = host.split('.').next().unwrap_or_default();

    name.split('-')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
