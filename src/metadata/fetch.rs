use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::{error::Error, net::IpAddr, time::Duration};
use tokio::time::{sleep, Instant};

use crate::config::FetchConfig;
use crate::metadata::types::{FetchOutcome, NormalizedUrl, PageResponse, TransportError};

pub const USER_AGENT_DEFAULT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// One GET attempt against a page. Retries live in [`fetch`], not here.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &NormalizedUrl) -> Result<PageResponse, TransportError>;
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Including the first attempt.
    pub max_attempts: u32,
    /// Wait before retry `n` is `n * backoff_step`.
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff_step: Duration::from_millis(config.backoff_step_ms),
        }
    }

    /// Delay before the given retry (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        self.backoff_step.saturating_mul(retry)
    }
}

/// Fetch a page, retrying transport failures with linear backoff.
///
/// Any HTTP response ends the loop, whatever its status. Never errors: an
/// exhausted budget comes back as [`FetchOutcome::Failed`].
pub async fn fetch<T: Transport + ?Sized>(
    transport: &T,
    policy: &RetryPolicy,
    url: &NormalizedUrl,
) -> FetchOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        if attempt > 1 {
            let delay = policy.backoff(attempt - 1);
            log::debug!("{url}: retrying in {}ms", delay.as_millis());
            sleep(delay).await;
        }

        let started = Instant::now();
        match transport.get(url).await {
            Ok(response) => {
                log::debug!(
                    "{url}: attempt={attempt}/{max_attempts} status={} duration_ms={}",
                    response.status.as_u16(),
                    started.elapsed().as_millis()
                );
                return FetchOutcome::Response {
                    response,
                    attempts: attempt,
                };
            }
            Err(error) => {
                log::warn!(
                    "{url}: attempt={attempt}/{max_attempts} err={error} duration_ms={}",
                    started.elapsed().as_millis()
                );
                if !error.is_retryable() || attempt >= max_attempts {
                    return FetchOutcome::Failed {
                        error,
                        attempts: attempt,
                    };
                }
            }
        }
    }
}

/// A host refused by `blocked_hosts` or `block_private_ips`.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{0}")]
struct PolicyRefusal(String);

/// Which hosts may be contacted, checked before the request and again on
/// every redirect hop.
#[derive(Debug, Clone)]
struct HostPolicy {
    blocked_hosts: Vec<String>,
    block_private_ips: bool,
    lookup_timeout: Duration,
}

impl HostPolicy {
    /// Checks that need no DNS: the block list and literal IP addresses.
    fn check_literal(&self, host: &str) -> Result<(), PolicyRefusal> {
        let host = host.trim_start_matches('[').trim_end_matches(']').to_lowercase();

        if self.blocked_hosts.iter().any(|h| *h == host) {
            return Err(PolicyRefusal(format!("host '{host}' is blocked")));
        }

        if self.block_private_ips {
            if let Ok(ip) = host.parse::<IpAddr>() {
                if is_ip_private(&ip) {
                    return Err(PolicyRefusal(format!("host '{host}' is a private address")));
                }
            }
        }

        Ok(())
    }

    async fn check(&self, host: &str) -> Result<(), TransportError> {
        self.check_literal(host)
            .map_err(|refusal| TransportError::Policy(refusal.0))?;

        if !self.block_private_ips || host.starts_with('[') || host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        let lookup = tokio::time::timeout(self.lookup_timeout, tokio::net::lookup_host((host, 80)))
            .await
            .map_err(|_| TransportError::Timeout)?;

        match lookup {
            Ok(mut addrs) => {
                if addrs.any(|addr| is_ip_private(&addr.ip())) {
                    Err(TransportError::Policy(format!(
                        "host '{host}' resolves to a private address"
                    )))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    /// Follows up to 10 redirects, refusing any hop the policy rejects.
    /// Hostnames met mid-chain are only checked literally.
    fn redirect_policy(&self) -> reqwest::redirect::Policy {
        let policy = self.clone();
        reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= MAX_REDIRECTS {
                return attempt.error("too many redirects");
            }
            let host = attempt.url().host_str().unwrap_or_default().to_string();
            match policy.check_literal(&host) {
                Ok(()) => attempt.follow(),
                Err(refusal) => {
                    log::warn!("{}: redirect refused: {refusal}", attempt.url());
                    attempt.error(refusal)
                }
            }
        })
    }
}

const MAX_REDIRECTS: usize = 10;

/// The real network transport, one shared reqwest client per process.
pub struct HttpTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
    policy: HostPolicy,
}

impl HttpTransport {
    pub fn new(config: &FetchConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let policy = HostPolicy {
            blocked_hosts: config
                .blocked_hosts
                .iter()
                .map(|h| h.to_lowercase())
                .collect(),
            block_private_ips: config.block_private_ips,
            lookup_timeout: timeout,
        };

        let mut client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(10))
            .redirect(policy.redirect_policy());

        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.is_empty()) {
            log::debug!("using proxy {proxy:?}");
            client = client.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: client.build()?,
            max_body_bytes: config.max_body_bytes,
            policy,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &NormalizedUrl) -> Result<PageResponse, TransportError> {
        self.policy.check(url.host()).await?;

        let mut resp = self
            .client
            .get(url.url().clone())
            .headers(browser_headers(url))
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let final_url = resp.url().clone();

        let mut body = Vec::new();
        let mut truncated = false;
        while let Some(chunk) = resp.chunk().await.map_err(classify_reqwest_error)? {
            let room = self.max_body_bytes.saturating_sub(body.len());
            if chunk.len() > room {
                body.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            body.extend_from_slice(&chunk);
        }

        if truncated {
            log::debug!("{url}: body truncated at {} bytes", self.max_body_bytes);
        }

        Ok(PageResponse {
            status,
            content_type,
            final_url,
            body: String::from_utf8_lossy(&body).into_owned(),
            truncated,
        })
    }
}

const BROWSER_HEADERS: [(&str, &str); 10] = [
    (
        "accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("accept-language", "en-US,en;q=0.9"),
    ("dnt", "1"),
    ("connection", "keep-alive"),
    ("upgrade-insecure-requests", "1"),
    ("sec-fetch-dest", "document"),
    ("sec-fetch-mode", "navigate"),
    ("sec-fetch-site", "none"),
    ("sec-fetch-user", "?1"),
    ("cache-control", "max-age=0"),
];

/// Headers a desktop Chrome sends on a top-level navigation, plus a Referer
/// pointing at the page's own origin.
///
/// Accept-Encoding is left to the client, which only advertises what it can
/// decode.
pub fn browser_headers(url: &NormalizedUrl) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in BROWSER_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if let Ok(origin) = HeaderValue::from_str(&url.origin()) {
        headers.insert(header::REFERER, origin);
    }
    headers
}

fn classify_reqwest_error(err: reqwest::Error) -> TransportError {
    if let Some(refusal) = policy_refusal(&err) {
        return TransportError::Policy(refusal.to_string());
    }

    let detail = get_error(&err);
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(detail)
    } else {
        TransportError::Other(detail)
    }
}

fn policy_refusal(err: &reqwest::Error) -> Option<&PolicyRefusal> {
    let mut source = err.source();
    while let Some(e) = source {
        if let Some(refusal) = e.downcast_ref::<PolicyRefusal>() {
            return Some(refusal);
        }
        source = e.source();
    }
    None
}

fn get_error(error: &reqwest::Error) -> String {
    match error.source() {
        Some(e) => match e.source() {
            Some(e) => e.to_string(),
            None => e.to_string(),
        },
        None => error.to_string(),
    }
}

fn is_ip_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_ip_private(&IpAddr::V4(v4));
            }
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}
