//! Payload field tables and normalization helpers
//!
//! The backend has shipped several shapes for the same answer update over
//! time. The key lists below are tried in order; the first present,
//! non-null, non-empty value wins.

use serde_json::{Map, Value};

use crate::models::{AnswerRecord, Citation, EndSignal, UNKNOWN_DOCUMENT};

/// Keys holding the answer text
pub(crate) const ANSWER_KEYS: &[&str] = &["answer", "content"];

/// Keys holding a citation list directly on the body
pub(crate) const CITATION_LIST_KEYS: &[&str] = &["docAggs", "doc_aggs", "sources", "references"];

/// Nested reference object, e.g. `{"reference": {"chunks": [...]}}`
pub(crate) const REFERENCE_KEY: &str = "reference";
pub(crate) const REFERENCE_LIST_KEYS: &[&str] = &["chunks", "doc_aggs"];

/// Outer key carrying the end flag, or the envelope body
pub(crate) const END_FLAG_KEY: &str = "data";

const CITATION_ID_KEYS: &[&str] = &["doc_id", "document_id", "documentId", "id"];
const CITATION_NAME_KEYS: &[&str] = &[
    "doc_name",
    "document_name",
    "documentName",
    "title",
    "document_keyword",
];
const CITATION_LOCATOR_KEYS: &[&str] = &["page_numbers", "pageNumbers", "positions"];

/// Payload fields before end detection.
#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct RawAnswer {
    /// `None` when every answer key was null or absent
    pub answer: Option<String>,
    /// `None` when every citation key was null or absent
    pub citations: Option<Vec<Citation>>,
    /// Outer `data` was literally `true`
    pub end_flag: bool,
}

impl RawAnswer {
    pub(crate) fn into_record(self, end_signal: Option<EndSignal>) -> AnswerRecord {
        AnswerRecord {
            text: self.answer.unwrap_or_default(),
            citations: self.citations.unwrap_or_default(),
            end_signal,
        }
    }
}

/// Render a scalar as text. Objects and arrays are not text.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First answer key whose value is textual. Empty strings still count here,
/// since an empty answer is a real (if useless) update.
pub(crate) fn first_text(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(scalar_text)
}

/// First alias with a non-empty textual value.
fn first_non_empty(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .filter_map(scalar_text)
        .find(|s| !s.trim().is_empty())
}

fn push_locator_parts(value: &Value, parts: &mut Vec<String>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| push_locator_parts(item, parts)),
        other => {
            if let Some(text) = scalar_text(other) {
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }
    }
}

fn locator(object: &Map<String, Value>) -> String {
    for key in CITATION_LOCATOR_KEYS {
        let Some(value) = object.get(*key) else {
            continue;
        };
        let mut parts = Vec::new();
        push_locator_parts(value, &mut parts);
        if !parts.is_empty() {
            return parts.join(",");
        }
    }
    String::new()
}

/// Build a [`Citation`] from one entry of a citation list.
pub(crate) fn normalize_citation(object: &Map<String, Value>) -> Citation {
    Citation {
        id: first_non_empty(object, CITATION_ID_KEYS).unwrap_or_default(),
        name: first_non_empty(object, CITATION_NAME_KEYS)
            .unwrap_or_else(|| UNKNOWN_DOCUMENT.to_string()),
        locator: locator(object),
    }
}
