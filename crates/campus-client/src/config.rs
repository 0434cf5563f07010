//! Client configuration.
//!
//! Values come from `CAMPUS_*` environment variables with defaults from
//! [`campus_core::defaults`]. Use [`ClientConfig::from_env`] in binaries and
//! build the struct directly in tests.

use std::path::PathBuf;
use std::time::Duration;

use campus_core::{defaults, Error, Result};

use crate::retry::RetryPolicy;

/// Environment variable names.
pub mod env_vars {
    pub const API_BASE_URL: &str = "CAMPUS_API_BASE_URL";
    pub const PAGE_ORIGIN: &str = "CAMPUS_PAGE_ORIGIN";
    pub const PROXY_PREFIX: &str = "CAMPUS_PROXY_PREFIX";
    pub const BUILD_MODE: &str = "CAMPUS_BUILD_MODE";
    pub const USE_MOCK: &str = "CAMPUS_USE_MOCK";
    pub const CLOUD_HOSTS: &str = "CAMPUS_CLOUD_HOSTS";
    pub const TIMEOUT_SECS: &str = "CAMPUS_TIMEOUT_SECS";
    pub const MAX_RETRIES: &str = "CAMPUS_MAX_RETRIES";
    pub const RETRY_BASE_MS: &str = "CAMPUS_RETRY_BASE_MS";
    pub const STATE_FILE: &str = "CAMPUS_STATE_FILE";
}

/// Development builds fall back to mock data on live failure; production
/// builds surface the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    pub fn is_development(self) -> bool {
        self == Self::Development
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Configuration for the backend client and source resolution.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin used for direct requests.
    pub api_base_url: String,
    /// Origin the console is served from, when known.
    pub page_origin: Option<String>,
    /// Same-origin path the page host proxies to the backend.
    pub proxy_prefix: String,
    pub build_mode: BuildMode,
    /// Start in fallback mode regardless of host detection.
    pub use_mock: bool,
    /// Cloud preview host patterns in addition to the defaults.
    pub extra_cloud_hosts: Vec<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    /// Where persisted client state lives; in-memory when unset.
    pub state_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: defaults::API_BASE_URL.to_string(),
            page_origin: None,
            proxy_prefix: defaults::PROXY_PREFIX.to_string(),
            build_mode: BuildMode::default(),
            use_mock: false,
            extra_cloud_hosts: Vec::new(),
            timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            max_retries: defaults::MAX_RETRIES,
            retry_base_ms: defaults::RETRY_BASE_DELAY_MS,
            state_file: None,
        }
    }
}

impl ClientConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let fallback = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            api_base_url: non_empty(env_vars::API_BASE_URL).unwrap_or(fallback.api_base_url),
            page_origin: non_empty(env_vars::PAGE_ORIGIN),
            proxy_prefix: non_empty(env_vars::PROXY_PREFIX).unwrap_or(fallback.proxy_prefix),
            build_mode: non_empty(env_vars::BUILD_MODE)
                .and_then(|v| BuildMode::parse(&v))
                .unwrap_or(fallback.build_mode),
            use_mock: non_empty(env_vars::USE_MOCK)
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            extra_cloud_hosts: non_empty(env_vars::CLOUD_HOSTS)
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|h| !h.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            timeout_secs: non_empty(env_vars::TIMEOUT_SECS)
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback.timeout_secs),
            max_retries: non_empty(env_vars::MAX_RETRIES)
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback.max_retries),
            retry_base_ms: non_empty(env_vars::RETRY_BASE_MS)
                .and_then(|s| s.parse().ok())
                .unwrap_or(fallback.retry_base_ms),
            state_file: non_empty(env_vars::STATE_FILE).map(PathBuf::from),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.api_base_url.is_empty() {
            return Err(Error::Config("api_base_url cannot be empty".to_string()));
        }

        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "api_base_url must start with http:// or https://, got: {}",
                self.api_base_url
            )));
        }

        if let Some(origin) = &self.page_origin {
            if !origin.starts_with("http://") && !origin.starts_with("https://") {
                return Err(Error::Config(format!(
                    "page_origin must start with http:// or https://, got: {}",
                    origin
                )));
            }
        }

        if !self.proxy_prefix.starts_with('/') {
            return Err(Error::Config(format!(
                "proxy_prefix must start with '/', got: {}",
                self.proxy_prefix
            )));
        }

        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be positive".to_string()));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_base_ms))
    }

    /// Default cloud preview patterns followed by the configured extras.
    pub fn cloud_host_patterns(&self) -> Vec<String> {
        defaults::CLOUD_PREVIEW_HOSTS
            .iter()
            .map(|h| h.to_string())
            .chain(self.extra_cloud_hosts.iter().cloned())
            .collect()
    }

    /// Host part of the page origin.
    pub fn page_host(&self) -> Option<String> {
        let origin = self.page_origin.as_deref()?;
        reqwest::Url::parse(origin)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}
