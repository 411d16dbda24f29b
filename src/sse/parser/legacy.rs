//! Parser for the legacy bracketed payload notation.
//!
//! Older backends serialize answers as `TypeName[key=value, key=value]`,
//! where a value is `null`, free text, a nested record, or a list of values
//! (`[Item[k=v], Item[k=v]]`). Free text is unquoted, so a comma only ends a
//! value when the next thing after it looks like `key=`.
//!
//! Grammar:
//!
//! ```text
//! record := ident '[' fields ']'
//! fields := ε | field (',' field)*
//! field  := ident '=' value
//! value  := 'null' | list | record | scalar
//! list   := '[' (value (',' value)*)? ']'
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

/// A parsed legacy value.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyValue {
    /// The literal `null`
    Null,
    /// Unquoted text, trimmed
    Scalar(String),
    /// `[a, b, ...]`
    List(Vec<LegacyValue>),
    /// `TypeName[key=value, ...]`
    Record {
        type_name: String,
        fields: Vec<(String, LegacyValue)>,
    },
}

impl LegacyValue {
    /// Look up a field on a record.
    pub fn field(&self, key: &str) -> Option<&LegacyValue> {
        match self {
            LegacyValue::Record { fields, .. } => {
                fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Convert into the JSON shape the payload normalizer understands.
    ///
    /// `true` and `false` scalars become booleans; all other scalars stay text.
    pub fn into_json(self) -> Value {
        match self {
            LegacyValue::Null => Value::Null,
            LegacyValue::Scalar(text) => match text.as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(text),
            },
            LegacyValue::List(items) => {
                Value::Array(items.into_iter().map(LegacyValue::into_json).collect())
            }
            LegacyValue::Record { fields, .. } => {
                let map: Map<String, Value> = fields
                    .into_iter()
                    .map(|(k, v)| (k, v.into_json()))
                    .collect();
                Value::Object(map)
            }
        }
    }
}

/// Errors raised by [`parse_legacy`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LegacyParseError {
    #[error("expected {expected} at offset {offset}")]
    Expected { expected: &'static str, offset: usize },
    #[error("record `{type_name}` is not closed")]
    Unterminated { type_name: String },
    #[error("unexpected input at offset {offset}")]
    Trailing { offset: usize },
}

/// Type name of the answer record every known backend emits.
const ANSWER_RECORD: &str = "ChatResponse[";

/// Nesting depth past which values are read as plain text.
const MAX_DEPTH: usize = 64;

/// Whether `input` starts like `TypeName[`.
pub fn looks_like_record(input: &str) -> bool {
    let input = input.trim_start();
    let ident_len = ident_len(input);
    ident_len > 0 && input[ident_len..].starts_with('[')
}

/// Byte offset where a bracketed record starts in `input`, if it has one.
///
/// Any `TypeName[` at the start qualifies. Otherwise an answer record
/// further in is used and whatever the backend printed before it is dropped.
pub fn record_start(input: &str) -> Option<usize> {
    if looks_like_record(input) {
        return Some(input.len() - input.trim_start().len());
    }
    input.find(ANSWER_RECORD)
}

/// Parse a complete `TypeName[...]` payload.
pub fn parse_legacy(input: &str) -> Result<LegacyValue, LegacyParseError> {
    let src = input.trim();
    let mut parser = Parser {
        src,
        pos: 0,
        depth: 0,
    };

    let type_name = parser
        .ident()
        .ok_or(LegacyParseError::Expected {
            expected: "type name",
            offset: 0,
        })?
        .to_string();
    parser.expect('[', "'['")?;

    // The outermost record always closes at the last character, which lets
    // top-level text values contain brackets.
    if !src.ends_with(']') || src.len() <= parser.pos {
        return Err(LegacyParseError::Unterminated { type_name });
    }
    let end = src.len() - 1;

    let fields = parser.fields(Scope::Top { end })?;
    if parser.pos != end {
        return Err(LegacyParseError::Trailing { offset: parser.pos });
    }
    Ok(LegacyValue::Record { type_name, fields })
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

fn ident_len(input: &str) -> usize {
    match input.chars().next() {
        Some(c) if is_ident_start(c) => input
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(input.len()),
        _ => 0,
    }
}

/// Where the value being parsed sits, which decides what terminates it.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Scope {
    /// Fields of the outermost record, which ends at byte `end`
    Top { end: usize },
    /// Fields of a nested record, ended by `]`
    Nested,
    /// Elements of a list, separated by `,` and ended by `]`
    List,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Lists and records currently open below the outermost record
    depth: usize,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_ws(&mut self) {
        self.pos = self.skip_ws_from(self.pos);
    }

    fn skip_ws_from(&self, mut pos: usize) -> usize {
        while let Some(c) = self.src[pos..].chars().next() {
            if !c.is_whitespace() {
                break;
            }
            pos += c.len_utf8();
        }
        pos
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char, expected: &'static str) -> Result<(), LegacyParseError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(LegacyParseError::Expected {
                expected,
                offset: self.pos,
            })
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let len = ident_len(self.rest());
        if len == 0 {
            return None;
        }
        let ident = &self.rest()[..len];
        self.pos += len;
        Some(ident)
    }

    /// Whether `key =` starts at `pos` (after optional whitespace).
    fn field_starts_at(&self, pos: usize) -> bool {
        let pos = self.skip_ws_from(pos);
        let len = ident_len(&self.src[pos..]);
        if len == 0 {
            return false;
        }
        let after = self.skip_ws_from(pos + len);
        self.src[after..].starts_with('=')
    }

    fn closes_scope_at(&self, pos: usize, scope: Scope) -> bool {
        match scope {
            Scope::Top { end } => pos == end,
            Scope::Nested | Scope::List => self.src[pos..].starts_with(']'),
        }
    }

    fn separator_at(&self, pos: usize, scope: Scope) -> bool {
        self.src[pos..].starts_with(',')
            && (scope == Scope::List || self.field_starts_at(pos + 1))
    }

    /// Whether a value may end at the current position.
    fn value_ends_here(&self, scope: Scope) -> bool {
        let pos = self.skip_ws_from(self.pos);
        self.closes_scope_at(pos, scope) || self.separator_at(pos, scope)
    }

    fn fields(&mut self, scope: Scope) -> Result<Vec<(String, LegacyValue)>, LegacyParseError> {
        let mut fields = Vec::new();
        self.skip_ws();
        if self.closes_scope_at(self.pos, scope) {
            return Ok(fields);
        }

        loop {
            self.skip_ws();
            let key = self
                .ident()
                .ok_or(LegacyParseError::Expected {
                    expected: "field name",
                    offset: self.pos,
                })?
                .to_string();
            self.skip_ws();
            self.expect('=', "'='")?;
            let value = self.value(scope)?;
            fields.push((key, value));

            self.skip_ws();
            if self.closes_scope_at(self.pos, scope) {
                return Ok(fields);
            }
            self.expect(',', "',' or end of record")?;
        }
    }

    fn value(&mut self, scope: Scope) -> Result<LegacyValue, LegacyParseError> {
        self.skip_ws();
        let start = self.pos;

        if self.rest().starts_with("null") {
            self.pos += "null".len();
            if self.value_ends_here(scope) {
                return Ok(LegacyValue::Null);
            }
            self.pos = start;
        }

        // Structured forms are tried first and fall back to text when they
        // do not end cleanly, e.g. an answer starting with "[1]". Too deep a
        // nesting is read as text as well.
        let can_nest = self.depth < MAX_DEPTH;

        if can_nest && self.peek() == Some('[') {
            self.depth += 1;
            let list = self.list();
            self.depth -= 1;
            if let Ok(list) = list {
                if self.value_ends_here(scope) {
                    return Ok(list);
                }
            }
            self.pos = start;
        }

        if can_nest && looks_like_record(self.rest()) {
            self.depth += 1;
            let record = self.record();
            self.depth -= 1;
            if let Ok(record) = record {
                if self.value_ends_here(scope) {
                    return Ok(record);
                }
            }
            self.pos = start;
        }

        Ok(LegacyValue::Scalar(self.scalar(scope)))
    }

    fn list(&mut self) -> Result<LegacyValue, LegacyParseError> {
        self.expect('[', "'['")?;
        let mut items = Vec::new();
        self.skip_ws();
        if self.eat(']') {
            return Ok(LegacyValue::List(items));
        }

        loop {
            items.push(self.value(Scope::List)?);
            self.skip_ws();
            if self.eat(']') {
                return Ok(LegacyValue::List(items));
            }
            self.expect(',', "',' or ']'")?;
        }
    }

    fn record(&mut self) -> Result<LegacyValue, LegacyParseError> {
        let type_name = self
            .ident()
            .ok_or(LegacyParseError::Expected {
                expected: "type name",
                offset: self.pos,
            })?
            .to_string();
        self.expect('[', "'['")?;
        let fields = self.fields(Scope::Nested)?;
        self.expect(']', "']'")?;
        Ok(LegacyValue::Record { type_name, fields })
    }

    fn scalar(&mut self, scope: Scope) -> String {
        let start = self.pos;
        let limit = match scope {
            Scope::Top { end } => end,
            Scope::Nested | Scope::List => self.src.len(),
        };

        let mut idx = start;
        while idx < limit {
            if !matches!(scope, Scope::Top { .. }) && self.src[idx..].starts_with(']') {
                break;
            }
            if self.separator_at(idx, scope) {
                break;
            }
            idx += self.src[idx..].chars().next().map_or(1, char::len_utf8);
        }

        self.pos = idx;
        self.src[start..idx].trim().to_string()
    }
}
