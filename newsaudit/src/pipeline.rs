use std::time::Duration;
use tracing::{error, info, warn};

use crate::analyzer::Analyzer;
use crate::error::RunError;
use crate::model::{Article, PipelineRecord, RecordStatus};
use crate::validator::Validator;

/// Sequential analyze-then-validate traversal.
pub struct Pipeline {
    analyzer: Analyzer,
    validator: Validator,
    inter_call_delay: Duration,
}

impl Pipeline {
    pub fn new(analyzer: Analyzer, validator: Validator, inter_call_delay: Duration) -> Self {
        Self {
            analyzer,
            validator,
            inter_call_delay,
        }
    }

    pub fn analyzer_model(&self) -> &str {
        self.analyzer.model()
    }

    pub fn validator_model(&self) -> &str {
        self.validator.model()
    }

    /// One record per article, in input order. A failing article never stops the run.
    pub async fn run(&self, articles: &[Article]) -> Result<Vec<PipelineRecord>, RunError> {
        if articles.is_empty() {
            return Err(RunError::NoUsableArticles { fetched: 0 });
        }

        info!(
            count = articles.len(),
            analyzer = %self.analyzer.model(),
            validator = %self.validator.model(),
            "starting pipeline"
        );

        let mut records = Vec::with_capacity(articles.len());
        for (index, article) in articles.iter().enumerate() {
            if index > 0 && !self.inter_call_delay.is_zero() {
                tokio::time::sleep(self.inter_call_delay).await;
            }

            info!(
                "Processing article {}/{}: {}",
                index + 1,
                articles.len(),
                article.title.chars().take(60).collect::<String>()
            );
            let record = self.process(article).await;
            records.push(record);
        }

        let failed = records.iter().filter(|r| r.status != RecordStatus::Ok).count();
        info!(total = records.len(), failed, "pipeline finished");
        Ok(records)
    }

    async fn process(&self, article: &Article) -> PipelineRecord {
        let analysis = match self.analyzer.analyze(article).await {
            Ok(analysis) => analysis,
            Err(e) => {
                error!(article_id = article.id, %e, "analysis failed");
                return PipelineRecord {
                    article: article.clone(),
                    analysis: None,
                    validation: None,
                    status: RecordStatus::AnalysisFailed,
                    error: Some(e.to_string()),
                };
            }
        };

        match self.validator.validate(article, &analysis).await {
            Ok(validation) => {
                if !validation.is_accurate {
                    warn!(article_id = article.id, notes = %validation.notes, "validator disputes analysis");
                }
                PipelineRecord {
                    article: article.clone(),
                    analysis: Some(analysis),
                    validation: Some(validation),
                    status: RecordStatus::Ok,
                    error: None,
                }
            }
            Err(e) => {
                error!(article_id = article.id, %e, "validation failed");
                PipelineRecord {
                    article: article.clone(),
                    analysis: Some(analysis),
                    validation: None,
                    status: RecordStatus::ValidationFailed,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
