//! Prompt templates with `{{name}}` slots.
//!
//! Single braces are literal, so JSON examples can sit in a template as-is.

use crate::error::ExtractionError;

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    text: String,
}

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Substitute every slot. Values are inserted verbatim and never re-scanned.
    pub fn render(&self, variables: &[(&str, &str)]) -> Result<String, ExtractionError> {
        let mut out = String::with_capacity(self.text.len());
        let mut missing: Vec<String> = Vec::new();

        for segment in segments(&self.text) {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(name) => match variables.iter().find(|(k, _)| *k == name) {
                    Some((_, value)) => out.push_str(value),
                    None => {
                        if !missing.iter().any(|m| m == name) {
                            missing.push(name.to_string());
                        }
                    }
                },
            }
        }

        if missing.is_empty() {
            Ok(out)
        } else {
            Err(ExtractionError::Prompt { missing })
        }
    }
}

enum Segment<'a> {
    Literal(&'a str),
    Slot(&'a str),
}

fn is_slot_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut parts = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("{{") {
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) if is_slot_name(after_open[..close].trim()) => {
                if open > 0 {
                    parts.push(Segment::Literal(&rest[..open]));
                }
                parts.push(Segment::Slot(after_open[..close].trim()));
                rest = &after_open[close + 2..];
            }
            _ => {
                // Not a slot: keep the braces and move past them
                parts.push(Segment::Literal(&rest[..open + 2]));
                rest = after_open;
            }
        }
    }
    if !rest.is_empty() {
        parts.push(Segment::Literal(rest));
    }
    parts
}
