//! Error types for extraction and whole runs

use thiserror::Error;

/// Errors from one structured-extraction call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Provider could not be reached or kept failing
    #[error("model unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    /// Response was not a JSON object, even after fence repair
    #[error("malformed model output: {reason}")]
    MalformedOutput { reason: String },

    /// Response parsed but lacks required fields
    #[error("model output missing fields: {}", missing.join(", "))]
    IncompleteOutput { missing: Vec<String> },

    /// Template slots with no value supplied
    #[error("prompt variables not supplied: {}", missing.join(", "))]
    Prompt { missing: Vec<String> },
}

impl ExtractionError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ExtractionError::MalformedOutput { reason: reason.into() }
    }
}

/// Conditions that abort a whole run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("failed to fetch news: {0:#}")]
    Fetch(anyhow::Error),

    #[error("no articles found for query '{query}'")]
    NoArticles { query: String },

    #[error("none of the {fetched} fetched articles had usable text")]
    NoUsableArticles { fetched: usize },

    #[error("failed to write run output: {0:#}")]
    Output(anyhow::Error),
}

impl RunError {
    /// HTTP status the server answers with
    pub fn http_status(&self) -> u16 {
        match self {
            RunError::Fetch(_) => 502,
            RunError::NoArticles { .. } | RunError::NoUsableArticles { .. } => 422,
            RunError::Output(_) => 500,
        }
    }
}
