use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::{Host, Url};

/// Errors surfaced to the caller of a resolution.
///
/// Everything that can go wrong after the URL is validated is absorbed into a
/// fallback result, so only input problems and the catch-all remain here.
#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("URL is required")]
    MissingUrl,

    #[error("Invalid URL format")]
    InvalidUrl { normalized_url: String },

    #[error("Failed to fetch metadata")]
    Other(#[from] anyhow::Error),
}

/// An absolute http(s) URL with a syntactically valid host.
///
/// Keeps the string it was built from, so the value handed back to callers is
/// the normalized text rather than the parser's re-serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    raw: String,
    url: Url,
}

impl NormalizedUrl {
    pub fn parse(input: &str) -> Result<Self, ResolveError> {
        let invalid = || ResolveError::InvalidUrl {
            normalized_url: input.to_string(),
        };

        let url = Url::parse(input).map_err(|_| invalid())?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid());
        }

        match url.host() {
            Some(Host::Domain(domain)) if is_valid_domain(domain) => {}
            Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => {}
            _ => return Err(invalid()),
        }

        Ok(Self {
            raw: input.to_string(),
            url,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// `scheme://host[:port]`, without a trailing slash.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    pub fn default_favicon(&self) -> String {
        format!("{}/favicon.ico", self.origin())
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// Labels are checked after IDNA conversion, so unicode hosts arrive as `xn--`.
fn is_valid_domain(domain: &str) -> bool {
    let domain = domain.strip_suffix('.').unwrap_or(domain);

    !domain.is_empty()
        && domain.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        })
}

/// What a resolution hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResult {
    pub title: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_fallback: bool,
    pub normalized_url: String,
}

/// A single HTTP response as seen by the fetch layer.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    /// Where the client ended up after following redirects.
    pub final_url: Url,
    pub body: String,
    pub truncated: bool,
}

/// Failure of one GET attempt below the HTTP layer.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("refused by fetch policy: {0}")]
    Policy(String),

    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    /// Policy refusals are final; everything else is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Policy(_))
    }
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Response {
        response: PageResponse,
        attempts: u32,
    },
    Failed {
        error: TransportError,
        attempts: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Usable,
    Blocked(StatusCode),
    Failed(String),
}
