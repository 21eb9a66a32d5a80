use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::extraction::ExtractionClient;
use crate::model::{AnalysisResult, Article, Sentiment, SentimentPolicy, KNOWN_TONES};
use crate::prompt::PromptTemplate;

pub const ANALYSIS_FIELDS: [&str; 3] = ["gist", "sentiment", "tone"];

pub const ANALYZER_SYSTEM_PROMPT: &str = "You are a news analyst. Respond only with valid JSON.";

const ANALYZER_TEMPLATE: &str = r#"Read the news article below and describe it as a JSON object.

ARTICLE:
{{article}}

The JSON object must contain exactly these fields:
- "gist": the main point of the article in one or two sentences
- "sentiment": one of "positive", "negative" or "neutral"
- "tone": one of "urgent", "analytical", "satirical", "balanced", "critical", "optimistic", "pessimistic" or "informative"

Answer with the JSON object only. No markdown, no commentary.

Example:
{"gist": "The finance ministry announced a reform package to boost growth.", "sentiment": "positive", "tone": "informative"}
"#;

#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    gist: String,
    sentiment: String,
    tone: String,
}

/// First model role: gist, sentiment and tone for one article.
pub struct Analyzer {
    client: ExtractionClient,
    template: PromptTemplate,
    policy: SentimentPolicy,
}

impl Analyzer {
    pub fn new(client: ExtractionClient, policy: SentimentPolicy) -> Self {
        Self {
            client,
            template: PromptTemplate::new(ANALYZER_TEMPLATE),
            policy,
        }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub async fn analyze(&self, article: &Article) -> Result<AnalysisResult, ExtractionError> {
        let text = article.prompt_text();
        let object = self
            .client
            .extract(&self.template, &[("article", text.as_str())], &ANALYSIS_FIELDS)
            .await?;

        let payload: AnalysisPayload = serde_json::from_value(serde_json::Value::Object(object))
            .map_err(|e| ExtractionError::malformed(format!("analysis fields have wrong types: {}", e)))?;

        let result = normalize_analysis(article.id, payload, self.policy)?;
        debug!(
            article_id = article.id,
            sentiment = %result.sentiment,
            tone = %result.tone,
            "analysis complete"
        );
        Ok(result)
    }
}

fn normalize_analysis(
    article_id: u32,
    payload: AnalysisPayload,
    policy: SentimentPolicy,
) -> Result<AnalysisResult, ExtractionError> {
    let mut anomalies = Vec::new();

    let sentiment = match Sentiment::parse(&payload.sentiment) {
        Some(s) => s,
        None => match policy {
            SentimentPolicy::CoerceNeutral => {
                warn!(
                    article_id,
                    raw = %payload.sentiment,
                    "sentiment outside vocabulary, coercing to neutral"
                );
                anomalies.push(format!("sentiment '{}' coerced to neutral", payload.sentiment.trim()));
                Sentiment::Neutral
            }
            SentimentPolicy::Reject => {
                return Err(ExtractionError::malformed(format!(
                    "sentiment '{}' is not positive, negative or neutral",
                    payload.sentiment.trim()
                )))
            }
        },
    };

    let tone = payload.tone.trim().to_lowercase();
    if !KNOWN_TONES.contains(&tone.as_str()) {
        warn!(article_id, tone = %tone, "tone outside known vocabulary");
        anomalies.push(format!("tone '{}' outside known vocabulary", tone));
    }

    Ok(AnalysisResult {
        article_id,
        gist: payload.gist.trim().to_string(),
        sentiment,
        tone,
        anomalies,
    })
}
