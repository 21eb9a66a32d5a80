/*!
common/src/lib.rs

Shared configuration types and loaders for newsaudit.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default file with an optional override file
- The single startup step that turns configured env var names into resolved secrets
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_NEWS_API_URL: &str = "https://newsapi.org/v2/everything";
pub const DEFAULT_QUERY: &str = "India politics OR India government";
pub const DEFAULT_PAGE_SIZE: u32 = 15;
pub const DEFAULT_MIN_TEXT_CHARS: usize = 50;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;
pub const DEFAULT_INTER_CALL_DELAY_MS: u64 = 1000;
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// News search API section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsConfig {
    pub api_url: Option<String>,
    /// Name of the env var holding the API key (e.g. "NEWSAPI_KEY")
    pub api_key_env: Option<String>,
    pub query: Option<String>,
    pub page_size: Option<u32>,
    pub language: Option<String>,
    pub sort_by: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_attempts: Option<u32>,
    /// Articles whose normalized text is shorter than this are dropped
    pub min_text_chars: Option<usize>,
}

/// One language-model endpoint (OpenAI-compatible chat completions)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// What to do when the analyzer answers with a sentiment outside positive/negative/neutral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentPolicy {
    /// Replace with "neutral" and record the anomaly
    #[default]
    CoerceNeutral,
    /// Fail the analysis for that article
    Reject,
}

/// Orchestration knobs
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub inter_call_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub sentiment_policy: Option<SentimentPolicy>,
}

/// Where run artifacts are written
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    pub dir: Option<String>,
}

/// HTTP server bind settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub news: NewsConfig,
    pub analyzer: ProviderConfig,
    pub validator: ProviderConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Fully resolved endpoint settings, credential included.
#[derive(Clone)]
pub struct ProviderSettings {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Fully resolved news API settings, credential included.
#[derive(Clone)]
pub struct NewsSettings {
    pub api_url: String,
    pub api_key: String,
    pub query: String,
    pub page_size: u32,
    pub language: String,
    pub sort_by: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub min_text_chars: usize,
}

impl std::fmt::Debug for NewsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("query", &self.query)
            .field("page_size", &self.page_size)
            .field("language", &self.language)
            .field("min_text_chars", &self.min_text_chars)
            .finish()
    }
}

/// Read a credential from the named environment variable.
///
/// Placeholder values copied from `.env.example` count as unset.
pub fn resolve_secret(env_name: &str) -> Result<String> {
    let value = std::env::var(env_name)
        .with_context(|| format!("API key env var '{}' not set", env_name))?;
    let value = value.trim().to_string();
    if value.is_empty() || value.starts_with("your_") {
        anyhow::bail!("API key env var '{}' is empty or still a placeholder", env_name);
    }
    Ok(value)
}

impl ProviderConfig {
    /// Resolve into concrete settings. `role` is only used in error messages.
    pub fn resolve(&self, role: &str) -> Result<ProviderSettings> {
        let api_url = self
            .api_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("[{}] api_url is required", role))?;
        url::Url::parse(&api_url).with_context(|| format!("[{}] invalid api_url: {}", role, api_url))?;
        let model = self
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("[{}] model is required", role))?;
        let env_name = self
            .api_key_env
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("[{}] api_key_env is required", role))?;
        let api_key = resolve_secret(env_name).with_context(|| format!("[{}] missing credential", role))?;

        Ok(ProviderSettings {
            api_url,
            api_key,
            model,
            timeout: Duration::from_secs(self.timeout_seconds.unwrap_or(30)),
            max_tokens: self.max_tokens.unwrap_or(500),
            temperature: self.temperature.unwrap_or(0.3),
        })
    }
}

impl NewsConfig {
    pub fn resolve(&self, pipeline: &PipelineConfig) -> Result<NewsSettings> {
        let api_url = self
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_NEWS_API_URL.to_string());
        url::Url::parse(&api_url).with_context(|| format!("[news] invalid api_url: {}", api_url))?;
        let env_name = self.api_key_env.as_deref().unwrap_or("NEWSAPI_KEY");
        let api_key = resolve_secret(env_name).context("[news] missing credential")?;

        Ok(NewsSettings {
            api_url,
            api_key,
            query: self.query.clone().unwrap_or_else(|| DEFAULT_QUERY.to_string()),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            language: self.language.clone().unwrap_or_else(|| "en".to_string()),
            sort_by: self.sort_by.clone().unwrap_or_else(|| "publishedAt".to_string()),
            timeout: Duration::from_secs(self.timeout_seconds.unwrap_or(30)),
            max_attempts: self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS),
            retry_base_delay: Duration::from_millis(
                pipeline.retry_base_delay_ms.unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS),
            ),
            min_text_chars: self.min_text_chars.unwrap_or(DEFAULT_MIN_TEXT_CHARS),
        })
    }
}

impl PipelineConfig {
    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_millis(self.inter_call_delay_ms.unwrap_or(DEFAULT_INTER_CALL_DELAY_MS))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(DEFAULT_MAX_ATTEMPTS).max(1)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms.unwrap_or(DEFAULT_RETRY_BASE_DELAY_MS))
    }
}

impl OutputConfig {
    pub fn dir_or_default(&self) -> &str {
        self.dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR)
    }
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.check_independence();
        Ok(cfg)
    }

    /// The validator only adds value when it is a different model from the analyzer.
    fn check_independence(&self) {
        let same_url = self.analyzer.api_url.is_some() && self.analyzer.api_url == self.validator.api_url;
        let same_model = self.analyzer.model.is_some() && self.analyzer.model == self.validator.model;
        if same_url && same_model {
            warn!(
                model = ?self.analyzer.model,
                "analyzer and validator use the same endpoint and model; cross-validation will share its biases"
            );
        }
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
