//! Enrichment handoff.
//!
//! # Responsibility
//! - Define the request/response schema exchanged with the enrichment service.
//! - Decode loosely formatted model replies into a validated card.
//!
//! # Invariants
//! - A card with any blank field is a per-item failure, never a partial success.

use crate::model::item::{collapse_whitespace, NormalizedItem};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```(?:json)?\s*|\s*```\s*$").expect("valid fence regex"));
static OBJECT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*\}").expect("valid object regex"));

/// What the pipeline sends for one surviving item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentRequest {
    pub lemma: String,
    pub display_text: String,
}

impl From<&NormalizedItem> for EnrichmentRequest {
    fn from(item: &NormalizedItem) -> Self {
        Self {
            lemma: item.lemma.clone(),
            display_text: item.display_text.clone(),
        }
    }
}

/// Validated enrichment result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedCard {
    pub front: String,
    pub back: String,
    pub example: String,
    pub gloss: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichError {
    /// Service unreachable, timed out or answered with an error status.
    Transport(String),
    /// Reply could not be decoded into a complete card.
    Malformed(String),
}

impl Display for EnrichError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(message) => write!(f, "enrichment transport failed: {message}"),
            Self::Malformed(message) => write!(f, "malformed enrichment reply: {message}"),
        }
    }
}

impl Error for EnrichError {}

/// External enrichment collaborator.
pub trait Enricher {
    fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichedCard, EnrichError>;
}

#[derive(Debug, Deserialize)]
struct RawCard {
    front: Option<String>,
    back: Option<String>,
    example: Option<String>,
    gloss: Option<String>,
}

/// Decodes a raw reply body into a validated card.
///
/// Accepts bare JSON, JSON wrapped in code fences, or the first `{...}` object
/// embedded in surrounding text.
pub fn parse_enrichment_response(raw: &str) -> Result<EnrichedCard, EnrichError> {
    let unfenced = FENCE_RE.replace_all(raw.trim(), "");
    let parsed: RawCard = match serde_json::from_str(&unfenced) {
        Ok(card) => card,
        Err(first_err) => {
            let object = OBJECT_RE
                .find(&unfenced)
                .ok_or_else(|| EnrichError::Malformed(format!("no JSON object: {first_err}")))?;
            serde_json::from_str(object.as_str())
                .map_err(|err| EnrichError::Malformed(err.to_string()))?
        }
    };

    Ok(EnrichedCard {
        front: required("front", parsed.front)?.trim().to_string(),
        back: required("back", parsed.back)?.trim().to_string(),
        example: collapse_whitespace(&required("example", parsed.example)?),
        gloss: collapse_whitespace(&required("gloss", parsed.gloss)?),
    })
}

fn required(field: &str, value: Option<String>) -> Result<String, EnrichError> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(EnrichError::Malformed(format!("missing `{field}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_enrichment_response, EnrichError};

    #[test]
    fn parses_fenced_reply_and_collapses_whitespace() {
        let card = parse_enrichment_response(
            "```json\n{\"front\":\"rent\",\"back\":\"renda\",\"example\":\"A renda   aumentou.\",\"gloss\":\"The rent\\n went up.\"}\n```",
        )
        .unwrap();
        assert_eq!(card.back, "renda");
        assert_eq!(card.example, "A renda aumentou.");
        assert_eq!(card.gloss, "The rent went up.");
    }

    #[test]
    fn extracts_object_from_surrounding_prose() {
        let card = parse_enrichment_response(
            "Here you go: {\"front\":\"calm\",\"back\":\"calmo\",\"example\":\"Fica calmo.\",\"gloss\":\"Stay calm.\"} Enjoy!",
        )
        .unwrap();
        assert_eq!(card.front, "calm");
    }

    #[test]
    fn blank_field_is_malformed() {
        let err = parse_enrichment_response(
            r#"{"front":"calm","back":" ","example":"x","gloss":"y"}"#,
        )
        .unwrap_err();
        assert_eq!(err, EnrichError::Malformed("missing `back`".to_string()));
    }

    #[test]
    fn non_json_is_malformed() {
        assert!(matches!(
            parse_enrichment_response("sorry, I cannot help"),
            Err(EnrichError::Malformed(_))
        ));
    }
}
