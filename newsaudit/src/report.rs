use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::model::{PipelineRecord, RawArticle, RecordStatus, Sentiment};

pub const RAW_ARTICLES_FILE: &str = "raw_articles.json";
pub const RESULTS_FILE: &str = "analysis_results.json";
pub const REPORT_FILE: &str = "final_report.md";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentBreakdown {
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub ok: usize,
    pub analysis_failed: usize,
    pub validation_failed: usize,
    /// Analyses the validator judged accurate
    pub validated: usize,
    pub anomalies: usize,
    pub sentiment: SentimentBreakdown,
}

impl RunSummary {
    pub fn from_records(records: &[PipelineRecord]) -> Self {
        let mut summary = RunSummary {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            match record.status {
                RecordStatus::Ok => summary.ok += 1,
                RecordStatus::AnalysisFailed => summary.analysis_failed += 1,
                RecordStatus::ValidationFailed => summary.validation_failed += 1,
            }
            if let Some(analysis) = &record.analysis {
                summary.anomalies += analysis.anomalies.len();
                match analysis.sentiment {
                    Sentiment::Positive => summary.sentiment.positive += 1,
                    Sentiment::Negative => summary.sentiment.negative += 1,
                    Sentiment::Neutral => summary.sentiment.neutral += 1,
                }
            }
            if record.validation.as_ref().map(|v| v.is_accurate).unwrap_or(false) {
                summary.validated += 1;
            }
        }
        summary
    }
}

/// Everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub query: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records returned by the news API, before normalization
    pub fetched: usize,
    pub analyzer_model: String,
    pub validator_model: String,
    pub summary: RunSummary,
    pub records: Vec<PipelineRecord>,
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn shorten(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        format!("{}...", value.chars().take(max).collect::<String>())
    }
}

/// Human-readable Markdown report. Failed articles get a section too.
pub fn render_markdown(report: &RunReport) -> String {
    let s = &report.summary;
    let mut lines: Vec<String> = vec![
        "# News Analysis Report".to_string(),
        String::new(),
        format!("**Date:** {}", report.finished_at.format("%Y-%m-%d %H:%M:%S UTC")),
        format!("**Run:** {}", report.run_id),
        format!("**Query:** {}", report.query),
        format!("**Articles fetched:** {}", report.fetched),
        format!("**Articles analyzed:** {}", s.total),
        format!("**Analyzer (LLM#1):** {}", report.analyzer_model),
        format!("**Validator (LLM#2):** {}", report.validator_model),
        String::new(),
        "---".to_string(),
        String::new(),
        "## Summary".to_string(),
        String::new(),
        format!("- **Positive:** {} articles", s.sentiment.positive),
        format!("- **Negative:** {} articles", s.sentiment.negative),
        format!("- **Neutral:** {} articles", s.sentiment.neutral),
        String::new(),
        format!("**Validation rate:** {}/{} analyses confirmed by LLM#2", s.validated, s.total),
        format!(
            "**Failures:** {} at analysis, {} at validation",
            s.analysis_failed, s.validation_failed
        ),
    ];
    if s.anomalies > 0 {
        lines.push(format!("**Normalized model outputs:** {}", s.anomalies));
    }
    lines.extend([
        String::new(),
        "---".to_string(),
        String::new(),
        "## Detailed Analysis".to_string(),
        String::new(),
    ]);

    for (i, record) in report.records.iter().enumerate() {
        let article = &record.article;
        lines.push(format!("### Article {}: \"{}\"", i + 1, shorten(&article.title, 80)));
        lines.push(String::new());
        lines.push(format!("- **Source:** [{}]({})", article.source, article.url));
        lines.push(format!("- **Status:** {}", record.status.as_str()));

        match &record.analysis {
            Some(analysis) => {
                lines.push(format!("- **Gist:** {}", analysis.gist));
                lines.push(format!("- **LLM#1 Sentiment:** {}", capitalize(analysis.sentiment.as_str())));
                lines.push(format!("- **LLM#1 Tone:** {}", capitalize(&analysis.tone)));
                for anomaly in &analysis.anomalies {
                    lines.push(format!("- **Note:** {}", anomaly));
                }
            }
            None => {
                lines.push(format!(
                    "- **Analysis failed:** {}",
                    record.error.as_deref().unwrap_or("unknown error")
                ));
            }
        }

        match &record.validation {
            Some(validation) => {
                let symbol = if validation.is_accurate { "✓" } else { "✗" };
                lines.push(format!("- **LLM#2 Validation:** {} {}", symbol, validation.notes));
                if let Some(corrected) = validation.corrected_sentiment {
                    lines.push(format!("- **Corrected Sentiment:** {}", capitalize(corrected.as_str())));
                }
                if !validation.suggested_corrections.is_empty() {
                    let corrections = validation
                        .suggested_corrections
                        .iter()
                        .map(|(k, v)| format!("{}: {}", k, v))
                        .collect::<Vec<_>>()
                        .join(", ");
                    lines.push(format!("- **Suggested Corrections:** {}", corrections));
                }
            }
            None if record.status == RecordStatus::ValidationFailed => {
                lines.push(format!(
                    "- **Validation failed:** {}",
                    record.error.as_deref().unwrap_or("unknown error")
                ));
            }
            None => lines.push("- **LLM#2 Validation:** skipped (analysis failed)".to_string()),
        }

        lines.extend([String::new(), "---".to_string(), String::new()]);
    }

    lines.join("\n")
}

/// Reads and writes run artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    async fn write(&self, file: &str, contents: String) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create output directory: {}", self.dir.display()))?;
        let path = self.path_of(file);
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "wrote run artifact");
        Ok(path)
    }

    pub async fn write_raw_articles(&self, articles: &[RawArticle]) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(articles).context("failed to serialize raw articles")?;
        self.write(RAW_ARTICLES_FILE, json).await
    }

    pub async fn write_results(&self, records: &[PipelineRecord]) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(records).context("failed to serialize results")?;
        self.write(RESULTS_FILE, json).await
    }

    pub async fn write_report(&self, report: &RunReport) -> Result<PathBuf> {
        self.write(REPORT_FILE, render_markdown(report)).await
    }

    /// Latest Markdown report, `None` if no run has written one yet.
    pub async fn read_report(&self) -> Result<Option<String>> {
        self.read(REPORT_FILE).await
    }

    /// Latest results as raw JSON, `None` if no run has written them yet.
    pub async fn read_results(&self) -> Result<Option<serde_json::Value>> {
        match self.read(RESULTS_FILE).await? {
            Some(text) => Ok(Some(serde_json::from_str(&text).context("stored results are not valid JSON")?)),
            None => Ok(None),
        }
    }

    async fn read(&self, file: &str) -> Result<Option<String>> {
        let path = self.path_of(file);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context(format!("Failed to read {}", path.display()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisResult, Article, ValidationResult};
    use std::collections::BTreeMap;

    fn article(id: u32, title: &str) -> Article {
        Article {
            id,
            title: title.into(),
            text: "text".into(),
            url: format!("https://example.com/{}", id),
            source: "Example".into(),
            author: None,
            published_at: None,
        }
    }

    fn sample_report() -> RunReport {
        let ok = PipelineRecord {
            article: article(1, "Good news"),
            analysis: Some(AnalysisResult {
                article_id: 1,
                gist: "Things improved.".into(),
                sentiment: Sentiment::Positive,
                tone: "optimistic".into(),
                anomalies: vec![],
            }),
            validation: Some(ValidationResult {
                article_id: 1,
                is_accurate: false,
                corrected_sentiment: Some(Sentiment::Neutral),
                notes: "Overstated.".into(),
                suggested_corrections: BTreeMap::from([("tone".to_string(), "balanced".to_string())]),
            }),
            status: RecordStatus::Ok,
            error: None,
        };
        let analysis_failed = PipelineRecord {
            article: article(2, "Broken"),
            analysis: None,
            validation: None,
            status: RecordStatus::AnalysisFailed,
            error: Some("model unavailable after 3 attempt(s): LLM rate limited (429): x".into()),
        };
        let validation_failed = PipelineRecord {
            article: article(3, "Half done"),
            analysis: Some(AnalysisResult {
                article_id: 3,
                gist: "Something happened.".into(),
                sentiment: Sentiment::Negative,
                tone: "critical".into(),
                anomalies: vec!["sentiment 'bad' coerced to neutral".into()],
            }),
            validation: None,
            status: RecordStatus::ValidationFailed,
            error: Some("malformed model output: not valid JSON".into()),
        };
        let records = vec![ok, analysis_failed, validation_failed];
        RunReport {
            run_id: Uuid::new_v4(),
            query: "india".into(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            fetched: 5,
            analyzer_model: "gpt-4o-mini".into(),
            validator_model: "qwen".into(),
            summary: RunSummary::from_records(&records),
            records,
        }
    }

    #[test]
    fn summary_counts_statuses_and_sentiments() {
        let report = sample_report();
        let s = &report.summary;
        assert_eq!((s.total, s.ok, s.analysis_failed, s.validation_failed), (3, 1, 1, 1));
        assert_eq!(s.sentiment, SentimentBreakdown { positive: 1, negative: 1, neutral: 0 });
        assert_eq!(s.validated, 0);
        assert_eq!(s.anomalies, 1);
    }

    #[test]
    fn markdown_shows_every_article_and_failed_stage() {
        let md = render_markdown(&sample_report());
        assert!(md.contains("### Article 1: \"Good news\""));
        assert!(md.contains("### Article 2: \"Broken\""));
        assert!(md.contains("### Article 3: \"Half done\""));
        assert!(md.contains("- **Analysis failed:** model unavailable"));
        assert!(md.contains("- **Validation failed:** malformed model output"));
        assert!(md.contains("- **LLM#1 Sentiment:** Positive"));
        assert!(md.contains("- **LLM#2 Validation:** ✗ Overstated."));
        assert!(md.contains("- **Corrected Sentiment:** Neutral"));
        assert!(md.contains("- **Suggested Corrections:** tone: balanced"));
        assert!(md.contains("**Failures:** 1 at analysis, 1 at validation"));
    }

    #[test]
    fn long_titles_are_shortened() {
        assert_eq!(shorten(&"x".repeat(85), 80), format!("{}...", "x".repeat(80)));
        assert_eq!(shorten("short", 80), "short");
    }

    #[tokio::test]
    async fn store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ReportStore::new(dir.path().join("nested/output"));

        assert!(store.read_report().await.unwrap().is_none());
        assert!(store.read_results().await.unwrap().is_none());

        let report = sample_report();
        store.write_results(&report.records).await.unwrap();
        store.write_report(&report).await.unwrap();
        store
            .write_raw_articles(&[RawArticle {
                title: "t".into(),
                description: "d".into(),
                body: "b".into(),
                url: "u".into(),
                source: "s".into(),
                author: None,
                published_at: None,
            }])
            .await
            .unwrap();

        let results = store.read_results().await.unwrap().unwrap();
        assert_eq!(results.as_array().map(|a| a.len()), Some(3));
        assert_eq!(results[1]["status"], "analysis_failed");
        assert!(store.read_report().await.unwrap().unwrap().starts_with("# News Analysis Report"));
        assert!(store.path_of(RAW_ARTICLES_FILE).exists());
    }
}
