use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::metadata::types::{NormalizedUrl, ResolveError};

static SCHEME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?://").expect("Failed to compile scheme regex"));

/// Turn loose user input into an absolute URL string, the way an address bar
/// would guess it.
///
/// - Trims whitespace
/// - Prepends `https://` when no http(s) scheme is present
/// - Appends `.com` to a dot-free host (`github` becomes `https://github.com`)
///
/// Never fails. The result may still be unparseable; [`normalize`] checks that.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();

    let candidate = if SCHEME_REGEX.is_match(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    match Url::parse(&candidate) {
        Ok(mut parsed) => {
            let host = parsed.host_str().unwrap_or_default().to_string();
            if host.is_empty() || host.contains('.') {
                return candidate;
            }

            if parsed.set_host(Some(&format!("{host}.com"))).is_err() {
                return candidate;
            }

            let mut repaired = parsed.to_string();
            // the parser adds a root path the user never typed
            let bare_root = parsed.path() == "/"
                && parsed.query().is_none()
                && parsed.fragment().is_none()
                && !candidate.ends_with('/');
            if bare_root {
                repaired.pop();
            }
            repaired
        }
        Err(_) => {
            if candidate.contains('.') {
                return candidate;
            }
            let token = SCHEME_REGEX.replace(&candidate, "");
            format!("https://{token}.com")
        }
    }
}

/// Normalize and validate caller input.
pub fn normalize(raw: &str) -> Result<NormalizedUrl, ResolveError> {
    if raw.trim().is_empty() {
        return Err(ResolveError::MissingUrl);
    }

    NormalizedUrl::parse(&normalize_url(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_word_gets_scheme_and_tld() {
        assert_eq!(normalize_url("github"), "https://github.com");
    }

    #[test]
    fn test_domain_without_scheme() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
    }

    #[test]
    fn test_whitespace_trimmed() {
        assert_eq!(normalize_url("  example.com/page \n"), "https://example.com/page");
    }

    #[test]
    fn test_existing_scheme_case_insensitive() {
        assert_eq!(normalize_url("HTTP://example.com"), "HTTP://example.com");
        assert_eq!(normalize_url("http://example.com"), "http://example.com");
    }

    #[test]
    fn test_dot_free_host_with_path_keeps_path() {
        assert_eq!(normalize_url("github/rust-lang"), "https://github.com/rust-lang");
    }

    #[test]
    fn test_dot_free_host_with_port() {
        assert_eq!(normalize_url("localhost:3000"), "https://localhost.com:3000");
    }

    #[test]
    fn test_trailing_slash_preserved_when_typed() {
        assert_eq!(normalize_url("github/"), "https://github.com/");
    }

    #[test]
    fn test_absolute_urls_are_idempotent() {
        for input in [
            "https://example.com",
            "https://example.com/a/b?c=d#e",
            "http://127.0.0.1:8080/",
            "github",
            "my-cool-site.com",
        ] {
            let once = normalize_url(input);
            assert_eq!(normalize_url(&once), once, "input {input}");
        }
    }

    #[test]
    fn test_unparseable_dot_free_token_gets_tld() {
        assert_eq!(normalize_url("bad url"), "https://bad url.com");
    }

    #[test]
    fn test_normalize_rejects_empty() {
        assert!(matches!(normalize(""), Err(ResolveError::MissingUrl)));
        assert!(matches!(normalize("   "), Err(ResolveError::MissingUrl)));
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        match normalize("badurl!!!") {
            Err(ResolveError::InvalidUrl { normalized_url }) => {
                assert_eq!(normalized_url, "https://badurl!!!.com")
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_normalize_valid() {
        let url = normalize("example.com").unwrap();
        assert_eq!(url.as_str(), "https://example.com");
        assert_eq!(url.host(), "example.com");
    }
}
