// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Client configuration.
//!
//! ```yaml
//! access_key: "my-access-key"
//! secret_key: "my-secret-key"
//! host: "https://nb-pipeline.qiniuapi.com"
//! fail_retry: 3
//! retry_backoff_ms: 2000
//! cache:
//!   policy: size
//!   threshold: 1048576
//!   dir: /var/cache/pandora
//! ```
//!
//! A repo token can replace the key pair:
//!
//! ```yaml
//! token: "<pre-issued token>"
//! ```

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Credentials;
use crate::cache::{CachePolicy, DEFAULT_REPLAY_CHUNK_BYTES};
use crate::retry::{RetryPolicy, DEFAULT_MAX_RETRIES};

/// Default data endpoint.
pub const DEFAULT_HOST: &str = "https://nb-pipeline.qiniuapi.com";

const DEFAULT_RETRY_BACKOFF_MS: u64 = 2000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_fail_retry() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_replay_chunk_bytes() -> usize {
    DEFAULT_REPLAY_CHUNK_BYTES
}

fn default_user_agent() -> String {
    format!("pandora-rs/{}", env!("CARGO_PKG_VERSION"))
}

/// Settings of one [`Client`](crate::Client).
#[derive(Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub access_key: String,
    #[serde(default)]
    pub secret_key: String,
    /// Pre-issued token. Takes precedence over the key pair when set.
    #[serde(default)]
    pub token: Option<String>,
    /// Endpoint base URL, without the `/v2/...` path.
    #[serde(default = "default_host")]
    pub host: String,
    /// Retries after the first attempt of a direct send.
    #[serde(default = "default_fail_retry")]
    pub fail_retry: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Upper bound of one request body when replaying spill files.
    #[serde(default = "default_replay_chunk_bytes")]
    pub replay_chunk_bytes: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Applied by `Client::new` when present.
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

/// Cache section of [`ClientConfig`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub policy: CachePolicyKind,
    /// Bytes for `size`, seconds for `time`.
    #[serde(default)]
    pub threshold: u64,
    pub dir: PathBuf,
}

/// Policy name as written in YAML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicyKind {
    #[default]
    None,
    Size,
    Time,
}

impl CacheConfig {
    pub fn new(policy: CachePolicy, dir: impl Into<PathBuf>) -> Self {
        let (policy, threshold) = match policy {
            CachePolicy::None => (CachePolicyKind::None, 0),
            CachePolicy::BySize(bytes) => (CachePolicyKind::Size, bytes),
            CachePolicy::ByTime(period) => (CachePolicyKind::Time, period.as_secs()),
        };
        Self {
            policy,
            threshold,
            dir: dir.into(),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        match self.policy {
            CachePolicyKind::None => CachePolicy::None,
            CachePolicyKind::Size => CachePolicy::by_size(self.threshold),
            CachePolicyKind::Time => CachePolicy::by_time_secs(self.threshold),
        }
    }
}

/// Configuration parsing errors.
#[derive(Debug)]
pub enum ConfigError {
    /// YAML parsing failed.
    Yaml(serde_yaml::Error),
    /// File I/O failed.
    Io(std::io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Yaml(e) => write!(f, "YAML parse error: {}", e),
            ConfigError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Yaml(e) => Some(e),
            ConfigError::Io(e) => Some(e),
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Yaml(e)
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl ClientConfig {
    /// Configuration with defaults for everything but the credentials.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            token: None,
            host: default_host(),
            fail_retry: default_fail_retry(),
            retry_backoff_ms: default_retry_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            replay_chunk_bytes: default_replay_chunk_bytes(),
            user_agent: default_user_agent(),
            cache: None,
        }
    }

    /// Configuration authorized by a pre-issued token.
    pub fn from_token(token: impl Into<String>) -> Self {
        let mut config = Self::new("", "");
        config.token = Some(token.into());
        config
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Parse configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_fail_retry(mut self, retries: u32) -> Self {
        self.fail_retry = retries;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff_ms = backoff.as_millis() as u64;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_replay_chunk_bytes(mut self, bytes: usize) -> Self {
        self.replay_chunk_bytes = bytes;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Validated credentials: the token if set, the key pair otherwise.
    pub fn credentials(&self) -> crate::Result<Credentials> {
        match &self.token {
            Some(token) => Credentials::token(token),
            None => Credentials::keys(&self.access_key, &self.secret_key),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.fail_retry,
            Duration::from_millis(self.retry_backoff_ms),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("fail_retry", &self.fail_retry)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("replay_chunk_bytes", &self.replay_chunk_bytes)
            .field("user_agent", &self.user_agent)
            .field("cache", &self.cache)
            .finish()
    }
}
