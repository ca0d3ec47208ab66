pub mod classify;
pub mod extract;
pub mod fallback;
pub mod fetch;
pub mod normalize;
pub mod types;

pub use fetch::{HttpTransport, RetryPolicy, Transport};
pub use types::{Classification, FetchOutcome, MetadataResult, ResolveError};

use std::time::Instant;

use crate::config::FetchConfig;

/// Runs one resolution end to end: normalize, fetch, classify, then extract
/// or fall back.
///
/// Holds no per-request state, so a single instance serves concurrent
/// requests behind an `Arc`.
pub struct Resolver<T: Transport = HttpTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl Resolver<HttpTransport> {
    pub fn from_config(config: &FetchConfig) -> anyhow::Result<Self> {
        Ok(Self::with_transport(
            HttpTransport::new(config)?,
            RetryPolicy::from_config(config),
        ))
    }
}

impl<T: Transport> Resolver<T> {
    pub fn with_transport(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    #[cfg(test)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Resolve caller input into presentable metadata.
    ///
    /// Only fails when the input cannot be made into a URL; every network or
    /// parsing problem ends in a fallback result instead.
    pub async fn resolve(&self, raw: &str) -> Result<MetadataResult, ResolveError> {
        let started = Instant::now();

        let url = match normalize::normalize(raw) {
            Ok(url) => url,
            Err(err) => {
                log::warn!("stage=normalize outcome=error raw={raw:?} err={err}");
                return Err(err);
            }
        };
        log::info!("stage=normalize outcome=ok raw={raw:?} url={url}");

        let fetch_started = Instant::now();
        let outcome = fetch::fetch(&self.transport, &self.policy, &url).await;
        let fetch_ms = fetch_started.elapsed().as_millis();

        let metadata = match (classify::classify(&outcome), outcome) {
            (Classification::Usable, FetchOutcome::Response { response, attempts }) => {
                log::info!(
                    "stage=fetch outcome=usable url={url} status={} attempts={attempts} final_url={} content_type={:?} bytes={} truncated={} duration_ms={fetch_ms}",
                    response.status.as_u16(),
                    response.final_url,
                    response.content_type,
                    response.body.len(),
                    response.truncated,
                );
                let extract_started = Instant::now();
                let metadata = extract::extract(&response.body, &url);
                log::info!(
                    "stage=extract url={url} description={} icon={} duration_ms={}",
                    metadata.description.is_some(),
                    metadata.icon.is_some(),
                    extract_started.elapsed().as_millis()
                );
                metadata
            }
            (Classification::Blocked(status), _) => {
                log::warn!(
                    "stage=fetch outcome=blocked url={url} status={} duration_ms={fetch_ms}",
                    status.as_u16()
                );
                fallback::fallback(&url)
            }
            (Classification::Failed(reason), _) => {
                log::warn!("stage=fetch outcome=failed url={url} reason={reason:?} duration_ms={fetch_ms}");
                fallback::fallback(&url)
            }
            // Usable is only ever assigned to a response
            (Classification::Usable, FetchOutcome::Failed { .. }) => fallback::fallback(&url),
        };

        log::info!(
            "stage=done url={url} fallback={} duration_ms={}",
            metadata.is_fallback,
            started.elapsed().as_millis()
        );

        Ok(metadata)
    }
}
