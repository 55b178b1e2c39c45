//! Normalized item model.
//!
//! # Responsibility
//! - Carry the lemma, display text and the rule that produced them.
//! - Provide the single dedup key function shared by filter and ledger.
//!
//! # Invariants
//! - `lemma` is non-empty after construction through [`NormalizedItem::new`].
//! - `rule_applied` always names the heuristic that fired.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Heuristic that produced a lemma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleApplied {
    /// Up to three tokens, kept verbatim.
    #[serde(rename = "short-phrase")]
    ShortPhrase,
    /// `to <verb>` construction, lemma is the verb.
    #[serde(rename = "to-VERB")]
    ToVerb,
    /// Imperative instruction of medium length, kept intact.
    #[serde(rename = "phrase-extended")]
    PhraseExtended,
    /// Known high-frequency domain token found among content words.
    #[serde(rename = "content-special")]
    ContentSpecial,
    /// Longest remaining content word.
    #[serde(rename = "content-longest")]
    ContentLongest,
    /// Only stopwords remained; the first tokens were kept.
    #[serde(rename = "fallback-first-tokens")]
    FallbackFirstTokens,
}

impl RuleApplied {
    /// Stable tag used in logs, tests and the ledger `cards` table.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortPhrase => "short-phrase",
            Self::ToVerb => "to-VERB",
            Self::PhraseExtended => "phrase-extended",
            Self::ContentSpecial => "content-special",
            Self::ContentLongest => "content-longest",
            Self::FallbackFirstTokens => "fallback-first-tokens",
        }
    }
}

impl Display for RuleApplied {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a raw item produced no lemma.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Nothing but whitespace or punctuation.
    Blank,
    /// Complete sentence made of function words only.
    Sentence,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blank => "blank",
            Self::Sentence => "sentence",
        }
    }
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lemma plus downstream display text for one captured item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedItem {
    pub lemma: String,
    pub display_text: String,
    pub rule_applied: RuleApplied,
}

impl NormalizedItem {
    /// Builds an item, returning `None` when the lemma collapses to nothing.
    pub fn new(
        lemma: impl AsRef<str>,
        display_text: impl AsRef<str>,
        rule_applied: RuleApplied,
    ) -> Option<Self> {
        let lemma = collapse_whitespace(lemma.as_ref());
        if lemma.is_empty() {
            return None;
        }
        Some(Self {
            lemma,
            display_text: collapse_whitespace(display_text.as_ref()),
            rule_applied,
        })
    }

    /// Case- and whitespace-insensitive dedup key for this item.
    pub fn key(&self) -> String {
        lemma_key(&self.lemma)
    }
}

/// Outcome of normalizing one raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalization {
    Item(NormalizedItem),
    Skip(SkipReason),
}

impl Normalization {
    pub fn item(&self) -> Option<&NormalizedItem> {
        match self {
            Self::Item(item) => Some(item),
            Self::Skip(_) => None,
        }
    }
}

/// Folds a lemma into its dedup key: lowercase, single spaces, trimmed.
pub fn lemma_key(lemma: &str) -> String {
    collapse_whitespace(lemma).to_lowercase()
}

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
