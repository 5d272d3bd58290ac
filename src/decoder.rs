//! Incremental UTF-8 decoding for chunked response bodies.
//!
//! Chunk boundaries on the wire fall wherever the transport put them, so a
//! multi-byte character can arrive split across two reads. [`Utf8Decoder`]
//! holds the unfinished tail of one chunk and prepends it to the next, so the
//! concatenation of everything it emits equals decoding the whole body at once.

/// Replacement for bytes that can never form a valid character.
const REPLACEMENT: char = '\u{FFFD}';

/// Stateful, lossy UTF-8 decoder.
///
/// Invalid sequences decode to U+FFFD (maximal-subpart replacement, the same
/// as `String::from_utf8_lossy`). An incomplete sequence at the end of a chunk
/// is held back until more bytes arrive or [`Utf8Decoder::finish`] is called.
#[derive(Debug, Default, Clone)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Creates a decoder with no buffered bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `chunk`, returning every character it completes.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(chunk);
        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let valid = err.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match err.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes held-back bytes at end of input.
    ///
    /// A truncated trailing sequence becomes a single U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            REPLACEMENT.to_string()
        }
    }

    /// True when part of a character is waiting for more bytes.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
