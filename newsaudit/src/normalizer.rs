use tracing::{debug, info};

use crate::model::{Article, RawArticle};

/// Turns raw records into model-ready articles and drops the ones with too little text.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    min_text_chars: usize,
}

impl Normalizer {
    pub fn new(min_text_chars: usize) -> Self {
        Self { min_text_chars }
    }

    /// Normalize a fetched list. Ids are 1-based positions in `raw`, so they
    /// keep fetch order even when earlier records are dropped.
    pub fn normalize(&self, raw: &[RawArticle]) -> Vec<Article> {
        let articles: Vec<Article> = raw
            .iter()
            .enumerate()
            .filter_map(|(index, record)| self.normalize_one(index as u32 + 1, record))
            .collect();
        info!(
            fetched = raw.len(),
            kept = articles.len(),
            min_text_chars = self.min_text_chars,
            "normalized articles"
        );
        articles
    }

    pub fn normalize_one(&self, id: u32, raw: &RawArticle) -> Option<Article> {
        let title = clean_field(&raw.title);
        let description = clean_field(&raw.description);
        let body = strip_truncation_marker(&clean_field(&raw.body));
        let text = combine(&description, &body);

        let length = text.chars().count();
        if text.is_empty() || length < self.min_text_chars {
            debug!(id, length, title = %title, "dropping article with too little text");
            return None;
        }

        Some(Article {
            id,
            title,
            text,
            url: raw.url.trim().to_string(),
            source: if raw.source.trim().is_empty() {
                "Unknown".to_string()
            } else {
                raw.source.trim().to_string()
            },
            author: raw.author.as_ref().map(|a| a.trim().to_string()).filter(|a| !a.is_empty()),
            published_at: raw.published_at.clone(),
        })
    }
}

/// HTML to text when there is markup, then collapse whitespace.
fn clean_field(value: &str) -> String {
    let text = if looks_like_html(value) {
        html2text::from_read(value.as_bytes(), 10_000).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    };
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn looks_like_html(value: &str) -> bool {
    match value.find('<') {
        Some(open) => value[open..].contains('>'),
        None => false,
    }
}

/// NewsAPI cuts `content` and appends "… [+1234 chars]".
fn strip_truncation_marker(body: &str) -> String {
    let trimmed = body.trim_end();
    if let Some(open) = trimmed.rfind("[+") {
        let tail = &trimmed[open + 2..];
        let is_marker = tail.ends_with(" chars]")
            && tail[..tail.len() - " chars]".len()].chars().all(|c| c.is_ascii_digit())
            && tail.len() > " chars]".len();
        if is_marker {
            return trimmed[..open]
                .trim_end()
                .trim_end_matches('…')
                .trim_end_matches("...")
                .trim_end()
                .to_string();
        }
    }
    trimmed.to_string()
}

/// Description and body, without saying the same thing twice.
fn combine(description: &str, body: &str) -> String {
    match (description.is_empty(), body.is_empty()) {
        (true, true) => String::new(),
        (false, true) => description.to_string(),
        (true, false) => body.to_string(),
        (false, false) => {
            if body.starts_with(description) {
                body.to_string()
            } else if description.starts_with(body) {
                description.to_string()
            } else {
                format!("{}\n\n{}", description, body)
            }
        }
    }
}
