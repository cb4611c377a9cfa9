//! Configuration: `lifeos.toml` layered with `LIFEOS__SECTION__KEY` environment
//! overrides. Every section has defaults, so an absent file still yields a
//! runnable server (with the upstream unconfigured until a key is supplied).

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::LifeOsError;

/// Environment variable consulted when `upstream.api_key` is not set.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LifeOsConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed by CORS. Empty means any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            allowed_origins: Vec::new(),
        }
    }
}

/// Generative-AI provider settings.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub retry: RetryConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: crate::gemini::DEFAULT_BASE_URL.to_string(),
            model: crate::gemini::DEFAULT_MODEL.to_string(),
            api_key: None,
            retry: RetryConfig::default(),
        }
    }
}

impl UpstreamConfig {
    /// The configured key, else `GEMINI_API_KEY`. Blank values count as absent.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.resolved_api_key_from(std::env::var(API_KEY_ENV).ok())
    }

    /// Key resolution against an explicit fallback value.
    pub fn resolved_api_key_from(&self, env_key: Option<String>) -> Option<String> {
        let blank_to_none = |k: String| {
            let k = k.trim().to_string();
            (!k.is_empty()).then_some(k)
        };
        self.api_key
            .clone()
            .and_then(blank_to_none)
            .or_else(|| env_key.and_then(blank_to_none))
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: usize,
    /// One backoff unit; attempt `i` waits `base_delay_ms * 2^i` before retrying.
    pub base_delay_ms: u64,
    pub attempt_timeout_secs: u64,
    pub transient_statuses: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::retry::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: 1000,
            attempt_timeout_secs: 30,
            transient_statuses: crate::retry::DEFAULT_TRANSIENT_STATUSES.to_vec(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutorConfig {
    pub journal_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            journal_capacity: 200,
        }
    }
}

/// `LIFEOS__SECTION__KEY` overrides; list-valued keys take comma-separated values.
fn environment() -> Environment {
    Environment::with_prefix("LIFEOS")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("upstream.retry.transient_statuses")
        .with_list_parse_key("http.allowed_origins")
        .try_parsing(true)
}

impl LifeOsConfig {
    pub fn load(path: &str) -> Result<Self, LifeOsError> {
        Self::load_with(path, environment())
    }

    fn load_with(path: &str, env: Environment) -> Result<Self, LifeOsError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(env)
            .build()?;
        Ok(s.try_deserialize()?)
    }
}
