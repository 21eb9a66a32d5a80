// Library interface for newsaudit modules
// This allows tests and the diagnostic binaries to import modules

pub mod analyzer;
pub mod error;
pub mod extraction;
pub mod fetcher;
pub mod llm;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod server;
pub mod service;
pub mod validator;

use std::sync::Arc;

use anyhow::Result;
use common::{Config, ProviderSettings};
use tracing::info;

use analyzer::{Analyzer, ANALYZER_SYSTEM_PROMPT};
use extraction::{ExtractionClient, ExtractionConfig, RetryPolicy};
use fetcher::NewsClient;
use llm::remote::RemoteLlmProvider;
use normalizer::Normalizer;
use pipeline::Pipeline;
use report::ReportStore;
use service::AnalysisService;
use validator::{Validator, VALIDATOR_SYSTEM_PROMPT};

/// Extraction client for one model role, with the retry policy from `[pipeline]`.
pub fn extraction_client(settings: &ProviderSettings, system_prompt: &str, retry: RetryPolicy) -> ExtractionClient {
    let provider = RemoteLlmProvider::from_settings(settings);
    ExtractionClient::new(
        Arc::new(provider),
        ExtractionConfig {
            system_prompt: Some(system_prompt.to_string()),
            max_tokens: Some(settings.max_tokens),
            temperature: Some(settings.temperature),
            timeout_seconds: Some(settings.timeout.as_secs()),
            retry,
        },
    )
}

/// Wire the whole service from configuration. Credentials are resolved here, once.
pub fn build_service(config: &Config) -> Result<AnalysisService> {
    let news = config.news.resolve(&config.pipeline)?;
    let analyzer_settings = config.analyzer.resolve("analyzer")?;
    let validator_settings = config.validator.resolve("validator")?;

    let retry = RetryPolicy {
        max_attempts: config.pipeline.max_attempts(),
        base_delay: config.pipeline.retry_base_delay(),
    };
    let policy = config.pipeline.sentiment_policy.unwrap_or_default();

    let analyzer = Analyzer::new(
        extraction_client(&analyzer_settings, ANALYZER_SYSTEM_PROMPT, retry),
        policy,
    );
    let validator = Validator::new(extraction_client(&validator_settings, VALIDATOR_SYSTEM_PROMPT, retry));
    info!(
        analyzer = %analyzer_settings.model,
        validator = %validator_settings.model,
        "LLM providers initialized"
    );

    let pipeline = Pipeline::new(analyzer, validator, config.pipeline.inter_call_delay());
    let client = NewsClient::new(&news)?;
    let store = ReportStore::new(config.output.dir_or_default());

    Ok(AnalysisService::new(
        Arc::new(client),
        Normalizer::new(news.min_text_chars),
        pipeline,
        store,
        news.query,
        news.page_size,
    ))
}
