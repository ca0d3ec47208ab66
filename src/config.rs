use anyhow::{bail, Context, Result};
use homedir::my_home;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::metadata::fetch::USER_AGENT_DEFAULT;

const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF_STEP_MS: u64 = 1000;
const DEFAULT_MAX_BODY_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Outbound fetch behaviour.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Per-attempt timeout covering connect, headers and body
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per resolution, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Retry `n` waits `n * backoff_step_ms`
    #[serde(default = "default_backoff_step_ms")]
    pub backoff_step_ms: u64,

    /// Bodies larger than this are cut off before extraction
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// e.g. `socks5://127.0.0.1:1080`
    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Hosts that are never contacted; resolutions for them fall back
    #[serde(default)]
    pub blocked_hosts: Vec<String>,

    /// Refuse hosts resolving to loopback, private or link-local addresses
    #[serde(default)]
    pub block_private_ips: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_step_ms: DEFAULT_BACKOFF_STEP_MS,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: USER_AGENT_DEFAULT.to_string(),
            proxy: None,
            accept_invalid_certs: false,
            blocked_hosts: Vec::new(),
            block_private_ips: false,
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_backoff_step_ms() -> u64 {
    DEFAULT_BACKOFF_STEP_MS
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

fn default_user_agent() -> String {
    USER_AGENT_DEFAULT.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    fn validate(&self) -> Result<()> {
        let fetch = &self.fetch;

        if fetch.timeout_secs == 0 {
            bail!("fetch.timeout_secs must be greater than 0");
        }
        if fetch.max_attempts == 0 {
            bail!("fetch.max_attempts must be greater than 0");
        }
        if fetch.max_body_bytes == 0 {
            bail!("fetch.max_body_bytes must be greater than 0");
        }
        if fetch.user_agent.trim().is_empty() {
            bail!("fetch.user_agent must not be empty");
        }

        Ok(())
    }

    /// `LINKMETA_BASE_PATH`, else `~/.local/share/linkmeta`.
    pub fn base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("LINKMETA_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .map_err(|err| anyhow::anyhow!("could not determine home directory: {err:?}"))?
            .context("home directory path is empty")?;
        Ok(format!("{}/.local/share/linkmeta", home.to_string_lossy()))
    }

    pub fn load() -> Result<Self> {
        Self::load_with(&Self::base_path()?)
    }

    /// Read `<base_path>/config.yaml`. A missing file means defaults.
    pub fn load_with(base_path: &str) -> Result<Self> {
        let path = Path::new(base_path).join("config.yaml");

        let config = if path.exists() {
            let config_str = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_yml::from_str::<Self>(&config_str)
                .with_context(|| format!("config {} is malformed", path.display()))?
        } else {
            log::debug!("{} not found, using defaults", path.display());
            Self::default()
        };

        config.validate()?;

        Ok(config)
    }
}
