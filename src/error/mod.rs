//! Error handling for the streaming client.
//!
//! - **Error Kinds**: classification handed to `on_error`
//! - **Stream Errors**: `StreamError`, the concrete failure with context
//! - **Result Type Alias**: `StreamResult<T>`
//!
//! # Propagation
//!
//! | Kind | Source | Session fatal |
//! |------|--------|---------------|
//! | Transport | Network failure not caused by cancellation | Yes |
//! | Decode | Fragment could not become text | No, logged |
//! | MalformedEvent | Event failed to parse | No, logged and skipped |
//! | Timeout | Overall deadline, or inactivity before any data | Yes |
//! | Cancelled | Caller cancelled | Never reported |
//! | Internal | API misuse, lost driver task | Yes |

mod kind;
mod stream;

pub use kind::ErrorKind;
pub use stream::StreamError;

/// Type alias for Results using StreamError.
pub type StreamResult<T> = Result<T, StreamError>;
