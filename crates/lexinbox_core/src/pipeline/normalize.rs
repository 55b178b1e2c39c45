//! Lemma normalizer.
//!
//! # Responsibility
//! - Reduce one captured text to the lemma used for dedup and enrichment.
//! - Report which heuristic fired for every decision.
//!
//! # Invariants
//! - Rules are pure functions evaluated in [`RULES`] order; first `Some` wins.
//! - Short phrases are never stopword-stripped.
//! - Stopwords are English only; other languages pass through unstripped.

use crate::config::NormalizerConfig;
use crate::model::item::{collapse_whitespace, Normalization, NormalizedItem, RuleApplied, SkipReason};
use log::debug;
use std::collections::HashSet;
use std::ops::RangeInclusive;

const SHORT_PHRASE_MAX_TOKENS: usize = 3;
const FALLBACK_TOKENS: usize = 3;

const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren't", "as", "at", "be", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "can't", "could", "did", "didn't", "do", "does", "doesn't", "doing",
    "don't", "down", "during", "each", "few", "for", "from", "further", "had", "has", "have",
    "having", "he", "her", "here", "hers", "him", "his", "how", "i", "i'm", "i've", "if", "in",
    "into", "is", "isn't", "it", "it's", "its", "just", "let's", "may", "me", "might", "more",
    "most", "must", "my", "myself", "no", "nor", "not", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "out", "over", "own", "same", "shall", "she", "should", "so", "some",
    "such", "than", "that", "that's", "the", "their", "theirs", "them", "then", "there",
    "there's", "these", "they", "this", "those", "through", "to", "too", "under", "until", "up",
    "us", "very", "was", "we", "we're", "were", "what", "when", "where", "which", "while", "who",
    "whom", "why", "will", "with", "won't", "would", "you", "you're", "your", "yours",
];

/// Finite auxiliaries marking a declarative sentence rather than an instruction.
const AUXILIARIES: &[&str] = &[
    "am", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "shall", "should", "can", "could", "may", "might", "must", "i'm",
    "it's", "that's", "there's", "we're", "you're",
];

/// One normalization heuristic.
pub type Rule = fn(&Utterance, &LemmaNormalizer) -> Option<Normalization>;

/// Evaluation order of the heuristics.
pub const RULES: [Rule; 4] = [short_phrase, to_verb, phrase_extended, content_word];

/// Tokenized view of one raw text.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Trimmed text with single spaces.
    pub text: String,
    /// Whitespace tokens as typed.
    pub tokens: Vec<String>,
    /// Lowercased tokens without surrounding punctuation.
    pub bare: Vec<String>,
}

impl Utterance {
    pub fn new(raw: &str) -> Self {
        let text = collapse_whitespace(raw);
        let tokens: Vec<String> = text.split(' ').filter(|t| !t.is_empty()).map(str::to_string).collect();
        let bare = tokens.iter().map(|token| bare_token(token)).collect();
        Self { text, tokens, bare }
    }

    fn ends_with_terminal_punctuation(&self) -> bool {
        self.text
            .trim_end_matches(['"', '\'', ')', '\u{201d}', '\u{2019}'])
            .ends_with(['.', '!', '?', '\u{2026}'])
    }

    fn has_clause_break(&self) -> bool {
        self.text.contains([',', ';', ':'])
    }
}

/// Heuristic lemma extractor.
#[derive(Debug, Clone)]
pub struct LemmaNormalizer {
    stopwords: HashSet<String>,
    special_tokens: Vec<String>,
    extended_range: RangeInclusive<usize>,
}

impl Default for LemmaNormalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

impl LemmaNormalizer {
    pub fn new(config: &NormalizerConfig) -> Self {
        let mut stopwords: HashSet<String> = STOPWORDS.iter().map(|word| word.to_string()).collect();
        stopwords.extend(config.extra_stopwords.iter().map(|word| bare_token(word)));
        Self {
            stopwords,
            special_tokens: config
                .special_tokens
                .iter()
                .map(|token| bare_token(token))
                .filter(|token| !token.is_empty())
                .collect(),
            extended_range: config.extended_min_tokens..=config.extended_max_tokens,
        }
    }

    pub fn is_stopword(&self, bare: &str) -> bool {
        self.stopwords.contains(bare)
    }

    /// Normalizes one raw text, returning an item or an explicit skip.
    pub fn normalize(&self, raw: &str) -> Normalization {
        let utterance = Utterance::new(raw);
        if utterance.bare.iter().all(String::is_empty) {
            return Normalization::Skip(SkipReason::Blank);
        }

        for rule in RULES {
            if let Some(outcome) = rule(&utterance, self) {
                match &outcome {
                    Normalization::Item(item) => debug!(
                        "event=normalize module=normalizer status=ok rule={} tokens={}",
                        item.rule_applied,
                        utterance.tokens.len()
                    ),
                    Normalization::Skip(reason) => debug!(
                        "event=normalize module=normalizer status=skip reason={} tokens={}",
                        reason,
                        utterance.tokens.len()
                    ),
                }
                return outcome;
            }
        }
        Normalization::Skip(SkipReason::Blank)
    }
}

/// Keeps up to three tokens verbatim.
pub fn short_phrase(utterance: &Utterance, _: &LemmaNormalizer) -> Option<Normalization> {
    if utterance.tokens.len() > SHORT_PHRASE_MAX_TOKENS {
        return None;
    }
    item(&utterance.text, &utterance.text, RuleApplied::ShortPhrase)
}

/// Picks the verb following the first `to` that introduces an infinitive.
pub fn to_verb(utterance: &Utterance, normalizer: &LemmaNormalizer) -> Option<Normalization> {
    utterance
        .bare
        .windows(2)
        .find(|pair| {
            pair[0] == "to"
                && !pair[1].is_empty()
                && pair[1].chars().all(|c| c.is_alphabetic() || c == '-')
                && !normalizer.is_stopword(&pair[1])
        })
        .and_then(|pair| item(&pair[1], &utterance.text, RuleApplied::ToVerb))
}

/// Keeps a medium-length instruction intact.
pub fn phrase_extended(utterance: &Utterance, normalizer: &LemmaNormalizer) -> Option<Normalization> {
    if !normalizer.extended_range.contains(&utterance.tokens.len()) {
        return None;
    }
    let opens_with_content = utterance
        .bare
        .first()
        .is_some_and(|first| !first.is_empty() && !normalizer.is_stopword(first));
    let declarative = utterance
        .bare
        .iter()
        .any(|token| AUXILIARIES.contains(&token.as_str()));
    let multi_clause = utterance.has_clause_break() || utterance.ends_with_terminal_punctuation();

    if opens_with_content && !declarative && multi_clause {
        return item(&utterance.text, &utterance.text, RuleApplied::PhraseExtended);
    }
    None
}

/// Strips stopwords and picks one content word, or skips sentence noise.
///
/// Terminal punctuation alone does not make a text noise. A sentence that
/// keeps any content word yields that word, so `This is the page.` becomes
/// `page`. Only a punctuated sentence made entirely of stopwords, such as
/// `it is what it is.`, is skipped as [`SkipReason::Sentence`]. Without
/// terminal punctuation the first few tokens are kept instead.
pub fn content_word(utterance: &Utterance, normalizer: &LemmaNormalizer) -> Option<Normalization> {
    let content: Vec<&String> = utterance
        .bare
        .iter()
        .filter(|token| token.chars().any(char::is_alphabetic) && !normalizer.is_stopword(token))
        .collect();

    if content.is_empty() {
        if utterance.ends_with_terminal_punctuation() {
            return Some(Normalization::Skip(SkipReason::Sentence));
        }
        let head = utterance.tokens[..utterance.tokens.len().min(FALLBACK_TOKENS)].join(" ");
        return item(&head, &utterance.text, RuleApplied::FallbackFirstTokens);
    }

    if let Some(special) = content
        .iter()
        .find(|token| normalizer.special_tokens.iter().any(|special| special == **token))
    {
        return item(special.as_str(), &utterance.text, RuleApplied::ContentSpecial);
    }

    let mut longest = content[0];
    for token in &content[1..] {
        if token.chars().count() > longest.chars().count() {
            longest = *token;
        }
    }
    item(longest, &utterance.text, RuleApplied::ContentLongest)
}

fn item(lemma: &str, display_text: &str, rule: RuleApplied) -> Option<Normalization> {
    NormalizedItem::new(lemma, display_text, rule).map(Normalization::Item)
}

/// Lowercases and strips surrounding punctuation, keeping inner apostrophes.
fn bare_token(token: &str) -> String {
    token
        .replace('\u{2019}', "'")
        .trim_matches(|c: char| !(c.is_alphanumeric() || c == '\''))
        .trim_matches('\'')
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::{bare_token, Utterance};

    #[test]
    fn bare_token_keeps_inner_apostrophe() {
        assert_eq!(bare_token("\u{201c}That\u{2019}s"), "that's");
        assert_eq!(bare_token("page."), "page");
        assert_eq!(bare_token("'quoted'"), "quoted");
    }

    #[test]
    fn terminal_punctuation_ignores_closing_quotes() {
        assert!(Utterance::new("he said \"stop.\"").ends_with_terminal_punctuation());
        assert!(!Utterance::new("we will be at the airport").ends_with_terminal_punctuation());
    }
}
