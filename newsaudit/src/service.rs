use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::RunError;
use crate::fetcher::NewsSource;
use crate::normalizer::Normalizer;
use crate::pipeline::Pipeline;
use crate::report::{ReportStore, RunReport, RunSummary};

/// Optional per-run overrides (the body of `POST /analyze`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunRequest {
    pub query: Option<String>,
    pub num_articles: Option<u32>,
}

/// fetch → normalize → analyze/validate → write artifacts.
pub struct AnalysisService {
    news: Arc<dyn NewsSource>,
    normalizer: Normalizer,
    pipeline: Pipeline,
    store: ReportStore,
    default_query: String,
    default_page_size: u32,
}

impl AnalysisService {
    pub fn new(
        news: Arc<dyn NewsSource>,
        normalizer: Normalizer,
        pipeline: Pipeline,
        store: ReportStore,
        default_query: impl Into<String>,
        default_page_size: u32,
    ) -> Self {
        Self {
            news,
            normalizer,
            pipeline,
            store,
            default_query: default_query.into(),
            default_page_size,
        }
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub async fn run(&self, request: RunRequest) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let query = request
            .query
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| self.default_query.clone());
        let page_size = request.num_articles.unwrap_or(self.default_page_size).clamp(1, 100);

        info!(%run_id, query = %query, page_size, "Starting news analysis run");

        // Step 1: fetch
        let raw = self.news.fetch(&query, page_size).await.map_err(|e| {
            error!(%run_id, error = %format!("{:#}", e), "news fetch failed");
            RunError::Fetch(e)
        })?;
        if raw.is_empty() {
            return Err(RunError::NoArticles { query });
        }

        // Step 2: normalize. Artifacts are only touched once there is something to analyze.
        let articles = self.normalizer.normalize(&raw);
        if articles.is_empty() {
            return Err(RunError::NoUsableArticles { fetched: raw.len() });
        }
        self.store.write_raw_articles(&raw).await.map_err(RunError::Output)?;

        // Step 3: analyze + validate
        let records = self.pipeline.run(&articles).await?;

        // Step 4: persist
        self.store.write_results(&records).await.map_err(RunError::Output)?;
        let report = RunReport {
            run_id,
            query,
            started_at,
            finished_at: Utc::now(),
            fetched: raw.len(),
            analyzer_model: self.pipeline.analyzer_model().to_string(),
            validator_model: self.pipeline.validator_model().to_string(),
            summary: RunSummary::from_records(&records),
            records,
        };
        self.store.write_report(&report).await.map_err(RunError::Output)?;

        info!(
            %run_id,
            total = report.summary.total,
            ok = report.summary.ok,
            validated = report.summary.validated,
            "Analysis complete"
        );
        Ok(report)
    }
}
