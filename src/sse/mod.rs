//! SSE (Server-Sent Events) stream parser
//!
//! Turns decoded response text into answer records. SSE format consists of:
//! - `event: <type>` - event type line
//! - `data: <payload>` - data payload line, concatenated when repeated
//! - `id:` / `retry:` - bookkeeping fields
//! - Empty line - signals end of event
//! - Lines starting with `:` - comments, including `: keep-alive` heartbeats
//!
//! # Module structure
//! - `events` - Frame and line types, `SseParseError`
//! - `payloads` - Field alias tables and citation normalization
//! - `parser` - Framing (`FrameAssembler`) and payload parsing (`parse_payload`)

mod events;
mod parser;
pub(crate) mod payloads;

// Re-export public types
pub use events::{Block, SseFrame, SseLine, SseParseError};
pub use parser::{
    is_keep_alive_line, parse_block, parse_legacy, parse_payload, parse_sse_line, FrameAssembler,
    LegacyParseError, LegacyValue, Pushed,
};
