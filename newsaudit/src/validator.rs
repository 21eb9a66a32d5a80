use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::ExtractionError;
use crate::extraction::ExtractionClient;
use crate::model::{AnalysisResult, Article, Sentiment, ValidationResult};
use crate::prompt::PromptTemplate;

pub const VALIDATION_FIELDS: [&str; 2] = ["is_accurate", "notes"];

pub const VALIDATOR_SYSTEM_PROMPT: &str = "You are a precise fact-checker. Respond only with valid JSON.";

const VALIDATOR_TEMPLATE: &str = r#"You are checking another model's analysis of a news article.

ARTICLE:
{{article}}

ANALYSIS UNDER REVIEW:
{{analysis}}

Check that:
1. the gist states the article's main point correctly,
2. the sentiment (positive, negative or neutral) fits the article,
3. the tone label is appropriate.

Reply with a JSON object containing:
- "is_accurate": true if the analysis is correct, false if it has significant errors
- "notes": a short explanation of what is right and what is wrong
- "corrected_sentiment": the sentiment you would assign, or null if the original is right
- "suggested_corrections": null, or an object mapping a field name ("gist", "tone") to a corrected value

Answer with the JSON object only.

Example:
{"is_accurate": false, "notes": "The article reports criticism of the policy, so the sentiment is negative.", "corrected_sentiment": "negative", "suggested_corrections": {"tone": "critical"}}
"#;

/// Second model role: audits an analysis against the article it came from.
pub struct Validator {
    client: ExtractionClient,
    template: PromptTemplate,
}

impl Validator {
    pub fn new(client: ExtractionClient) -> Self {
        Self {
            client,
            template: PromptTemplate::new(VALIDATOR_TEMPLATE),
        }
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    pub async fn validate(
        &self,
        article: &Article,
        analysis: &AnalysisResult,
    ) -> Result<ValidationResult, ExtractionError> {
        let article_text = article.prompt_text();
        let analysis_text = format!(
            "Gist: {}\nSentiment: {}\nTone: {}",
            analysis.gist, analysis.sentiment, analysis.tone
        );

        let object = self
            .client
            .extract(
                &self.template,
                &[("article", article_text.as_str()), ("analysis", analysis_text.as_str())],
                &VALIDATION_FIELDS,
            )
            .await?;

        let result = read_validation(article.id, &object)?;
        debug!(article_id = article.id, is_accurate = result.is_accurate, "validation complete");
        Ok(result)
    }
}

fn read_validation(article_id: u32, object: &Map<String, Value>) -> Result<ValidationResult, ExtractionError> {
    let is_accurate = match object.get("is_accurate") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("true") => true,
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("false") => false,
        other => {
            return Err(ExtractionError::malformed(format!(
                "is_accurate must be a boolean, got {}",
                other.map(|v| v.to_string()).unwrap_or_default()
            )))
        }
    };

    let notes = match object.get("notes") {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Null) => String::new(),
        Some(other) => {
            return Err(ExtractionError::malformed(format!("notes must be a string, got {}", other)))
        }
        None => String::new(),
    };

    let corrected_sentiment = match object.get("corrected_sentiment") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => {
            let parsed = Sentiment::parse(s);
            if parsed.is_none() {
                warn!(article_id, raw = %s, "validator proposed a sentiment outside vocabulary, dropping it");
            }
            parsed
        }
        Some(other) => {
            warn!(article_id, raw = %other, "corrected_sentiment is not a string, dropping it");
            None
        }
    };

    let mut suggested_corrections = BTreeMap::new();
    if let Some(Value::Object(map)) = object.get("suggested_corrections") {
        for (field, value) in map {
            let text = match value {
                Value::String(s) => s.clone(),
                Value::Null => continue,
                other => other.to_string(),
            };
            suggested_corrections.insert(field.clone(), text);
        }
    }

    Ok(ValidationResult {
        article_id,
        is_accurate,
        corrected_sentiment,
        notes,
        suggested_corrections,
    })
}
