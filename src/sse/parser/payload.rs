//! Event payload to [`AnswerRecord`] conversion.
//!
//! A payload is tried as strict JSON first; if that fails and it looks like
//! `TypeName[...]`, the legacy notation is parsed instead. Both end up as a
//! `serde_json::Value` and go through the same normalization.

use serde_json::{Map, Value};

use super::legacy::{parse_legacy, record_start};
use crate::models::AnswerRecord;
use crate::sse::events::SseParseError;
use crate::sse::payloads::{
    first_text, normalize_citation, RawAnswer, ANSWER_KEYS, CITATION_LIST_KEYS, END_FLAG_KEY,
    REFERENCE_KEY, REFERENCE_LIST_KEYS,
};
use crate::stream::completion::detect_end_signal;

/// Parse the `data` field of one event.
pub fn parse_payload(data: &str) -> Result<AnswerRecord, SseParseError> {
    let trimmed = data.trim();
    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(json_err) => {
            let Some(start) = record_start(trimmed) else {
                return Err(SseParseError::InvalidJson {
                    source: json_err.to_string(),
                    preview: SseParseError::preview(trimmed),
                });
            };
            tracing::trace!("JSON parse failed ({}), trying bracketed notation", json_err);
            parse_legacy(&trimmed[start..])
                .map_err(|e| SseParseError::InvalidLegacy {
                    source: e.to_string(),
                    preview: SseParseError::preview(trimmed),
                })?
                .into_json()
        }
    };

    let raw = normalize(&value)?;
    let end_signal = detect_end_signal(&raw);
    Ok(raw.into_record(end_signal))
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn normalize(value: &Value) -> Result<RawAnswer, SseParseError> {
    let outer = value.as_object().ok_or(SseParseError::UnexpectedShape {
        found: shape_name(value),
    })?;

    let end_flag = outer.get(END_FLAG_KEY) == Some(&Value::Bool(true));

    // `{"code":0,"data":{...}}` envelopes carry the answer one level down
    let body = match outer.get(END_FLAG_KEY) {
        Some(Value::Object(inner)) if !has_answer_key(outer) => inner,
        _ => outer,
    };

    Ok(RawAnswer {
        answer: first_text(body, ANSWER_KEYS),
        citations: citation_list(body).map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(normalize_citation)
                .collect()
        }),
        end_flag,
    })
}

fn has_answer_key(object: &Map<String, Value>) -> bool {
    ANSWER_KEYS.iter().any(|key| object.contains_key(*key))
}

/// The first non-null citation list, or `None` when every alias is null or absent.
fn citation_list(body: &Map<String, Value>) -> Option<&Vec<Value>> {
    for key in CITATION_LIST_KEYS {
        match body.get(*key) {
            Some(Value::Array(items)) => return Some(items),
            Some(Value::Null) | None => continue,
            Some(other) => {
                tracing::debug!(key, shape = shape_name(other), "Ignoring non-list citations");
            }
        }
    }

    let reference = body.get(REFERENCE_KEY)?.as_object()?;
    REFERENCE_LIST_KEYS
        .iter()
        .find_map(|key| reference.get(*key).and_then(Value::as_array))
}
