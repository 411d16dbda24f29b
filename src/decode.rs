//! Fragment-to-text decoding.
//!
//! Transports hand over body fragments in whatever shape the platform
//! produces: raw bytes, text that was already decoded, or a wrapper carrying
//! either. [`TextDecoder`] turns all of them into UTF-8 text without ever
//! failing the stream on bad bytes.

use bytes::Bytes;
use thiserror::Error;

/// Longest possible incomplete UTF-8 sequence carried between fragments.
const MAX_CARRY: usize = 3;

/// A raw body fragment as delivered by a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    /// Undecoded bytes
    Binary(Bytes),
    /// Text the platform already decoded
    Text(String),
    /// A wrapper object whose payload may be missing
    Envelope(Option<Box<Fragment>>),
    /// A shape the transport could not describe as bytes or text
    Opaque(String),
}

impl Fragment {
    /// Wrap a fragment the way some platforms nest chunk payloads.
    pub fn envelope(inner: impl Into<Fragment>) -> Self {
        Fragment::Envelope(Some(Box::new(inner.into())))
    }
}

impl From<Bytes> for Fragment {
    fn from(bytes: Bytes) -> Self {
        Fragment::Binary(bytes)
    }
}

impl From<Vec<u8>> for Fragment {
    fn from(bytes: Vec<u8>) -> Self {
        Fragment::Binary(Bytes::from(bytes))
    }
}

impl From<&'static [u8]> for Fragment {
    fn from(bytes: &'static [u8]) -> Self {
        Fragment::Binary(Bytes::from_static(bytes))
    }
}

impl From<String> for Fragment {
    fn from(text: String) -> Self {
        Fragment::Text(text)
    }
}

impl From<&str> for Fragment {
    fn from(text: &str) -> Self {
        Fragment::Text(text.to_string())
    }
}

/// Result of decoding one fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Decoded text (never empty)
    Text(String),
    /// Zero-length or missing payload
    Empty,
    /// Bytes were received but all of them belong to a character that is
    /// still incomplete; they are held for the next fragment
    Incomplete,
}

/// Fragment shapes that cannot be turned into text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("unsupported fragment shape: {0}")]
    Unsupported(String),
}

/// Stateful UTF-8 decoder.
///
/// A multi-byte character split across two binary fragments is reassembled;
/// bytes that are not valid UTF-8 map one-to-one onto the Latin-1 range
/// instead of failing.
#[derive(Debug, Default)]
pub struct TextDecoder {
    carry: Vec<u8>,
    lossy_bytes: usize,
}

impl TextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one fragment.
    pub fn decode(&mut self, fragment: Fragment) -> Result<Decoded, DecodeError> {
        match fragment {
            Fragment::Binary(bytes) => Ok(self.decode_bytes(&bytes)),
            Fragment::Text(text) => {
                if text.is_empty() {
                    return Ok(Decoded::Empty);
                }
                // Pending bytes can never complete once text arrives
                let mut out = self.finish().unwrap_or_default();
                out.push_str(&text);
                Ok(Decoded::Text(out))
            }
            Fragment::Envelope(Some(inner)) => self.decode(*inner),
            Fragment::Envelope(None) => Ok(Decoded::Empty),
            Fragment::Opaque(shape) => Err(DecodeError::Unsupported(shape)),
        }
    }

    /// Flush any carried bytes at end of stream.
    pub fn finish(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            return None;
        }
        let carry = std::mem::take(&mut self.carry);
        let mut out = String::with_capacity(carry.len());
        self.push_lossy(&carry, &mut out);
        Some(out)
    }

    /// Number of bytes decoded through the Latin-1 fallback so far.
    pub fn lossy_bytes(&self) -> usize {
        self.lossy_bytes
    }

    fn decode_bytes(&mut self, bytes: &[u8]) -> Decoded {
        if bytes.is_empty() {
            return Decoded::Empty;
        }

        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(bytes);

        let mut out = String::with_capacity(buf.len());
        let mut rest: &[u8] = &buf;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    // valid_up_to guarantees this prefix is UTF-8
                    out.push_str(std::str::from_utf8(valid).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            let (bad, tail) = after.split_at(len);
                            self.push_lossy(bad, &mut out);
                            rest = tail;
                        }
                        None if after.len() <= MAX_CARRY => {
                            self.carry = after.to_vec();
                            break;
                        }
                        None => {
                            self.push_lossy(after, &mut out);
                            break;
                        }
                    }
                }
            }
        }

        if out.is_empty() {
            Decoded::Incomplete
        } else {
            Decoded::Text(out)
        }
    }

    fn push_lossy(&mut self, bytes: &[u8], out: &mut String) {
        tracing::debug!(bytes = bytes.len(), "Invalid UTF-8, falling back to byte mapping");
        self.lossy_bytes += bytes.len();
        out.extend(bytes.iter().map(|b| char::from(*b)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(decoded: Decoded) -> String {
        match decoded {
            Decoded::Text(t) => t,
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_plain_bytes() {
        let mut decoder = TextDecoder::new();
        let out = decoder.decode(Fragment::from(&b"data: hi\n\n"[..])).unwrap();
        assert_eq!(text(out), "data: hi\n\n");
    }

    #[test]
    fn test_zero_length_is_empty_sentinel() {
        let mut decoder = TextDecoder::new();
        assert_eq!(decoder.decode(Fragment::from(Vec::<u8>::new())).unwrap(), Decoded::Empty);
        assert_eq!(decoder.decode(Fragment::from("")).unwrap(), Decoded::Empty);
        assert_eq!(decoder.decode(Fragment::Envelope(None)).unwrap(), Decoded::Empty);
    }

    #[test]
    fn test_envelope_unwraps_payload() {
        let mut decoder = TextDecoder::new();
        let out = decoder.decode(Fragment::envelope("data: x")).unwrap();
        assert_eq!(text(out), "data: x");

        let nested = Fragment::envelope(Fragment::envelope(Bytes::from_static(b"abc")));
        assert_eq!(text(decoder.decode(nested).unwrap()), "abc");
    }

    #[test]
    fn test_opaque_is_decode_error() {
        let mut decoder = TextDecoder::new();
        let err = decoder
            .decode(Fragment::Opaque("[object Object]".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("[object Object]"));
    }

    #[test]
    fn test_multibyte_char_split_across_fragments() {
        let bytes = "答案".as_bytes();
        let mut decoder = TextDecoder::new();

        let first = decoder.decode(Fragment::from(bytes[..2].to_vec())).unwrap();
        assert_eq!(first, Decoded::Incomplete);

        let second = decoder.decode(Fragment::from(bytes[2..4].to_vec())).unwrap();
        assert_eq!(text(second), "答");

        let third = decoder.decode(Fragment::from(bytes[4..].to_vec())).unwrap();
        assert_eq!(text(third), "案");
        assert_eq!(decoder.lossy_bytes(), 0);
    }

    #[test]
    fn test_invalid_bytes_fall_back_to_byte_mapping() {
        let mut decoder = TextDecoder::new();
        let out = decoder.decode(Fragment::from(vec![b'a', 0xFF, b'b'])).unwrap();
        assert_eq!(text(out), "a\u{FF}b");
        assert_eq!(decoder.lossy_bytes(), 1);
    }

    #[test]
    fn test_finish_flushes_dangling_bytes() {
        let mut decoder = TextDecoder::new();
        let bytes = "é".as_bytes();
        assert_eq!(
            decoder.decode(Fragment::from(bytes[..1].to_vec())).unwrap(),
            Decoded::Incomplete
        );
        assert_eq!(decoder.finish(), Some("\u{C3}".to_string()));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_text_after_dangling_bytes_flushes_them_first() {
        let mut decoder = TextDecoder::new();
        decoder.decode(Fragment::from(vec![0xE4])).unwrap();
        let out = decoder.decode(Fragment::from("ok")).unwrap();
        assert_eq!(text(out), "\u{E4}ok");
    }
}
