//! Server-Sent Events framing for chat responses.
//!
//! Some deployments of the backend answer `/chat` with `text/event-stream`
//! instead of raw text. Each frame then carries
//! `data: {"role":"assistant","chunk":"..."}` and the stream ends with an
//! `event: done` frame. This module turns that framing back into the display
//! text the user should see.
//!
//! The reference servers write their separators as the two characters `\n`
//! rather than real line breaks. A stream that has carried no real line break
//! is read with that escaped framing: an escaped break counts when a field
//! name follows it, or when it ends the buffer right after a complete frame.

use serde::Deserialize;
use serde::de::IgnoredAny;

const ESCAPED_BREAK: &str = "\\n";
const FIELD_PREFIXES: [&str; 4] = ["data:", "event:", "id:", "retry:"];

/// One meaningful frame extracted from an event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFrame {
    /// Display text carried by a data frame.
    Text(String),
    /// The server announced the end of the response.
    Done,
}

#[derive(Deserialize)]
struct ChunkPayload {
    chunk: Option<String>,
}

/// Incremental parser for decoded event-stream text.
///
/// Text is fed in arbitrary pieces; frames are emitted only once their
/// terminating blank line has arrived.
#[derive(Debug, Default, Clone)]
pub struct EventStreamParser {
    buffer: String,
    real_breaks: bool,
}

impl EventStreamParser {
    /// Creates a parser with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends decoded text and returns every frame it completes.
    pub fn push(&mut self, text: &str) -> Vec<EventFrame> {
        if text.contains('\n') {
            self.real_breaks = true;
        }
        if text.contains('\r') {
            self.buffer.push_str(&text.replace("\r\n", "\n"));
        } else {
            self.buffer.push_str(text);
        }
        if !self.real_breaks {
            self.unescape_breaks(false);
        }
        let mut frames = Vec::new();
        while let Some((frame, rest)) = self.buffer.split_once("\n\n") {
            let parsed = parse_frame(frame);
            self.buffer = rest.to_string();
            frames.extend(parsed);
        }
        frames
    }

    /// Parses whatever remains once the body has ended.
    ///
    /// A final frame is accepted without its trailing blank line.
    pub fn finish(&mut self) -> Vec<EventFrame> {
        if !self.real_breaks {
            self.unescape_breaks(true);
        }
        let rest = std::mem::take(&mut self.buffer);
        rest.split("\n\n")
            .filter(|frame| !frame.trim().is_empty())
            .filter_map(parse_frame)
            .collect()
    }

    /// Rewrites escaped separators in the buffer into real line breaks.
    ///
    /// An escaped break that cannot be decided yet stays escaped and is
    /// looked at again on the next push.
    fn unescape_breaks(&mut self, at_end: bool) {
        if !self.buffer.contains(ESCAPED_BREAK) {
            return;
        }
        let mut out = String::with_capacity(self.buffer.len());
        let mut rest = self.buffer.as_str();
        while let Some(idx) = rest.find(ESCAPED_BREAK) {
            out.push_str(&rest[..idx]);
            rest = &rest[idx + ESCAPED_BREAK.len()..];
            let double = rest.starts_with(ESCAPED_BREAK);
            let tail = if double {
                &rest[ESCAPED_BREAK.len()..]
            } else {
                rest
            };
            let ends_frame =
                tail.is_empty() && (at_end || (double && frame_is_complete(last_frame(&out))));
            let is_break = ends_frame || starts_with_field(tail);
            if is_break {
                out.push_str(if double { "\n\n" } else { "\n" });
                rest = tail;
            } else {
                out.push_str(ESCAPED_BREAK);
            }
        }
        out.push_str(rest);
        self.buffer = out;
    }
}

fn starts_with_field(text: &str) -> bool {
    FIELD_PREFIXES.iter().any(|prefix| text.starts_with(prefix))
}

fn last_frame(text: &str) -> &str {
    text.rsplit("\n\n").next().unwrap_or(text)
}

// A frame is complete once it names an event or its data is a whole JSON value.
fn frame_is_complete(frame: &str) -> bool {
    let mut data = None;
    for line in frame.lines() {
        if line.starts_with("event:") {
            return true;
        }
        if let Some(value) = line.strip_prefix("data:") {
            data = Some(value.trim());
        }
    }
    data.is_some_and(|data| serde_json::from_str::<IgnoredAny>(data).is_ok())
}

fn parse_frame(frame: &str) -> Option<EventFrame> {
    let mut event = None;
    let mut data: Option<String> = None;
    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    if event.as_deref() == Some("done") {
        return Some(EventFrame::Done);
    }
    let data = data?;
    match serde_json::from_str::<ChunkPayload>(&data) {
        Ok(payload) => payload.chunk.map(EventFrame::Text),
        // Plain data frames are shown as-is, the way EventSource consumers see them.
        Err(_) => Some(EventFrame::Text(data)),
    }
}
