//! Data types shared between the streaming pipeline and its callers.

use serde::{Deserialize, Serialize};

/// Chat-completion path appended to the service base URL.
pub const COMPLETION_PATH: &str = "/deepseek";

/// Placeholder name for a citation whose document name cannot be resolved.
pub const UNKNOWN_DOCUMENT: &str = "Unknown document";

/// A reference from an answer back to a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Document id, empty when the payload carried none
    pub id: String,
    /// Display name of the document
    pub name: String,
    /// Page numbers or positions inside the document, empty when unknown
    pub locator: String,
}

impl Citation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            locator: locator.into(),
        }
    }
}

/// Why a record was recognized as the end of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndSignal {
    /// The payload's end flag (`data=true`) was set
    ExplicitFlag,
    /// Answer and citations were both null or missing
    Drained,
}

/// One parsed answer update, as handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    /// Answer fragment, possibly empty
    pub text: String,
    /// Source documents, in payload order
    pub citations: Vec<Citation>,
    /// Set when this record signals stream completion
    pub end_signal: Option<EndSignal>,
}

impl AnswerRecord {
    pub fn is_end_marker(&self) -> bool {
        self.end_signal.is_some()
    }

    /// Whether the record carries anything worth rendering.
    pub fn has_content(&self) -> bool {
        !self.text.is_empty() || !self.citations.is_empty()
    }
}

/// Body of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// Assistant id
    pub chat_id: String,
    /// The user's question
    pub question: String,
    /// Conversation session id
    pub session_id: String,
    /// Requesting user
    pub user_id: String,
}

/// Immutable description of one streaming request.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    endpoint: String,
    payload: serde_json::Value,
}

impl StreamRequest {
    pub fn new(endpoint: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            payload,
        }
    }

    /// Build a chat-completion request against `base_url`.
    pub fn completion(
        base_url: &str,
        request: &CompletionRequest,
    ) -> Result<Self, serde_json::Error> {
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), COMPLETION_PATH);
        Ok(Self::new(endpoint, serde_json::to_value(request)?))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }
}
