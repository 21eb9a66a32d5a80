use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use common::NewsSettings;

use crate::model::RawArticle;

/// Source of raw articles for a run.
#[async_trait::async_trait]
pub trait NewsSource: Send + Sync {
    async fn fetch(&self, query: &str, page_size: u32) -> Result<Vec<RawArticle>>;
}

/// NewsAPI-compatible search client (`GET /v2/everything`).
pub struct NewsClient {
    client: Client,
    api_url: String,
    api_key: String,
    language: String,
    sort_by: String,
    max_attempts: u32,
    retry_base_delay: Duration,
}

impl NewsClient {
    pub fn new(settings: &NewsSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent("newsaudit/0.1.0")
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            api_url: settings.api_url.clone(),
            api_key: settings.api_key.clone(),
            language: settings.language.clone(),
            sort_by: settings.sort_by.clone(),
            max_attempts: settings.max_attempts.max(1),
            retry_base_delay: settings.retry_base_delay,
        })
    }

    async fn fetch_page(&self, query: &str, page_size: u32) -> Result<NewsApiResponse> {
        let page_size = page_size.clamp(1, 100).to_string();
        let params = [
            ("q", query),
            ("language", self.language.as_str()),
            ("pageSize", page_size.as_str()),
            ("sortBy", self.sort_by.as_str()),
        ];
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let backoff = self.retry_base_delay.saturating_mul(2u32.saturating_pow(attempt - 2));
                info!("Retrying news fetch (attempt {}/{}) after {:?}...", attempt, self.max_attempts, backoff);
                tokio::time::sleep(backoff).await;
            }

            match self
                .client
                .get(&self.api_url)
                .header("X-Api-Key", &self.api_key)
                .query(&params)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<NewsApiResponse>().await.context("failed to decode news API response");
                    } else if status.is_server_error() { // 5xx
                        last_error = Some(anyhow::anyhow!("news API server error: {}", status));
                        continue; // Retry
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(anyhow::anyhow!("news API rate limited: {}", status));
                        continue; // Retry
                    } else if status == reqwest::StatusCode::UNAUTHORIZED {
                        anyhow::bail!("invalid news API key (401)");
                    } else {
                        // Client error (4xx) - likely permanent, don't retry
                        let body: Option<NewsApiResponse> = response.json().await.ok();
                        let message = body.and_then(|b| b.message).unwrap_or_default();
                        anyhow::bail!("news API request failed with status {}: {}", status, message);
                    }
                }
                Err(e) => {
                    // Network error - retry
                    last_error = Some(anyhow::Error::new(e).context("network error during news fetch"));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
    }
}

#[async_trait::async_trait]
impl NewsSource for NewsClient {
    async fn fetch(&self, query: &str, page_size: u32) -> Result<Vec<RawArticle>> {
        let body = self.fetch_page(query, page_size).await?;

        if body.status != "ok" {
            anyhow::bail!(
                "news API error {}: {}",
                body.code.unwrap_or_default(),
                body.message.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        let total = body.articles.len();
        let articles: Vec<RawArticle> = body.articles.into_iter().filter_map(into_raw).collect();
        info!(query, total, usable = articles.len(), "fetched news articles");
        Ok(articles)
    }
}

fn into_raw(record: NewsApiArticle) -> Option<RawArticle> {
    let title = record.title.unwrap_or_default().trim().to_string();
    if title.is_empty() || title == "[Removed]" {
        debug!("skipping removed or untitled record");
        return None;
    }

    Some(RawArticle {
        title,
        description: record.description.unwrap_or_default(),
        body: record.content.unwrap_or_default(),
        url: record.url.unwrap_or_default(),
        source: record.source.and_then(|s| s.name).unwrap_or_else(|| "Unknown".to_string()),
        author: record.author,
        published_at: record.published_at,
    })
}

// NewsAPI wire structures
#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    #[serde(default)]
    source: Option<NewsApiSource>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "publishedAt")]
    published_at: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    #[serde(default)]
    name: Option<String>,
}
