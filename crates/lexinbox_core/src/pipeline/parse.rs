//! Queue line parser.
//!
//! # Responsibility
//! - Decode every historical queue line shape into flat `QueueEntry` values.
//!
//! # Invariants
//! - Output order follows file order, then in-line order.
//! - A bad line is skipped with a warning; it never fails the batch.
//! - Unknown fields are ignored.

use crate::model::entry::QueueEntry;
use crate::store::{QueueStore, StoreResult};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

static TERM_SPLIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,;\n]+").expect("valid split regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseLineError {
    InvalidJson(String),
    NotAnObject,
    /// Object carries no usable `entries`, `word` or `text` payload.
    NoPayload,
}

impl Display for ParseLineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(message) => write!(f, "invalid json: {message}"),
            Self::NotAnObject => write!(f, "line is not a JSON object"),
            Self::NoPayload => write!(f, "no text payload"),
        }
    }
}

impl Error for ParseLineError {}

/// Parsed queue content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQueue {
    pub entries: Vec<QueueEntry>,
    /// 1-based line numbers that were skipped.
    pub skipped_lines: Vec<usize>,
    /// Every non-blank line read, trimmed, valid or not. A commit archives
    /// exactly these lines.
    pub lines: Vec<String>,
}

/// Parses one queue line.
pub fn parse_line(line: &str) -> Result<Vec<QueueEntry>, ParseLineError> {
    let value: Value =
        serde_json::from_str(line).map_err(|err| ParseLineError::InvalidJson(err.to_string()))?;
    let Value::Object(object) = value else {
        return Err(ParseLineError::NotAnObject);
    };

    let texts = payload_texts(&object);
    if texts.is_empty() {
        return Err(ParseLineError::NoPayload);
    }

    let timestamp = object.get("ts").and_then(scalar_text);
    let source_tag = object
        .get("src")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    Ok(texts
        .into_iter()
        .map(|text| QueueEntry::new(text).with_metadata(timestamp.clone(), source_tag.clone()))
        .collect())
}

/// Parses queue lines, skipping blank and invalid ones.
pub fn parse_lines<I, S>(lines: I) -> ParsedQueue
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut parsed = ParsedQueue::default();
    for (index, line) in lines.into_iter().enumerate() {
        let line = line.as_ref().trim();
        if line.is_empty() {
            continue;
        }
        parsed.lines.push(line.to_string());
        match parse_line(line) {
            Ok(entries) => parsed.entries.extend(entries),
            Err(err) => {
                warn!(
                    "event=queue_parse module=parser status=skip line={} error={}",
                    index + 1,
                    err
                );
                parsed.skipped_lines.push(index + 1);
            }
        }
    }
    parsed
}

/// Reads and parses the whole queue.
pub fn read_entries(store: &dyn QueueStore) -> StoreResult<ParsedQueue> {
    Ok(parse_lines(store.read_all()?))
}

/// Splits a multi-entry string on commas, semicolons and newlines.
pub fn split_terms(value: &str) -> Vec<String> {
    TERM_SPLIT_RE
        .split(value)
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect()
}

fn payload_texts(object: &Map<String, Value>) -> Vec<String> {
    if let Some(entries) = object.get("entries") {
        return match entries {
            Value::String(value) => split_terms(value),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .flat_map(split_terms)
                .collect(),
            _ => Vec::new(),
        };
    }

    ["word", "text"]
        .iter()
        .find_map(|key| object.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| vec![value.to_string()])
        .unwrap_or_default()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
