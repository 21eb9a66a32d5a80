use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use common::SentimentPolicy;

/// Article record as delivered by the news API, after decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

/// Normalized article handed to the models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// 1-based position in the fetched list
    pub id: u32,
    pub title: String,
    pub text: String,
    pub url: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl Article {
    /// Block of text embedded into prompts
    pub fn prompt_text(&self) -> String {
        format!("Title: {}\nSource: {}\n\n{}", self.title, self.source, self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    /// Case- and whitespace-insensitive parse.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tones the analyzer prompt asks for. Anything else is kept but flagged.
pub const KNOWN_TONES: [&str; 8] = [
    "urgent",
    "analytical",
    "satirical",
    "balanced",
    "critical",
    "optimistic",
    "pessimistic",
    "informative",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub article_id: u32,
    pub gist: String,
    pub sentiment: Sentiment,
    pub tone: String,
    /// Normalizations applied to the model output
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub article_id: u32,
    pub is_accurate: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_sentiment: Option<Sentiment>,
    pub notes: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub suggested_corrections: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Ok,
    AnalysisFailed,
    ValidationFailed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Ok => "ok",
            RecordStatus::AnalysisFailed => "analysis_failed",
            RecordStatus::ValidationFailed => "validation_failed",
        }
    }
}

/// Per-article outcome of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub article: Article,
    pub analysis: Option<AnalysisResult>,
    pub validation: Option<ValidationResult>,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentiment_parse_is_lenient_about_case_and_spaces() {
        assert_eq!(Sentiment::parse(" Positive "), Some(Sentiment::Positive));
        assert_eq!(Sentiment::parse("NEGATIVE"), Some(Sentiment::Negative));
        assert_eq!(Sentiment::parse("mixed"), None);
    }

    #[test]
    fn record_serializes_status_and_nulls() {
        let record = PipelineRecord {
            article: Article {
                id: 2,
                title: "t".into(),
                text: "x".into(),
                url: "https://example.com".into(),
                source: "s".into(),
                author: None,
                published_at: None,
            },
            analysis: None,
            validation: None,
            status: RecordStatus::AnalysisFailed,
            error: Some("boom".into()),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "analysis_failed");
        assert!(json["analysis"].is_null());
        assert!(json["validation"].is_null());
    }
}
