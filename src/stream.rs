//! Streaming response renderer.
//!
//! A [`ResponseStream`] owns everything transient about one in-flight chat
//! reply: the stateful decoder, the accumulator, and the handle of the bot
//! entry it writes to. It moves `Idle → Streaming → Finalized`:
//!
//! - the bot entry is created lazily, when the first chunk arrives;
//! - every chunk is appended to the accumulator and the entry's text is
//!   replaced by the whole accumulator;
//! - at end of body the accumulator becomes the entry's permanent text.
//!
//! A reply that ends without a single chunk leaves no entry behind.

use std::time::Instant;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::client::StreamFormat;
use crate::decoder::Utf8Decoder;
use crate::error::Result;
use crate::message_log::{EntryId, Message, MessageLog};
use crate::observability::{
    STREAM_BYTES, STREAM_CHUNKS, STREAM_DURATION, STREAM_EMPTY, STREAM_ERRORS,
};
use crate::render::Renderer;
use crate::sse::{EventFrame, EventStreamParser};

/// Lifecycle of a [`ResponseStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Created; no request submitted yet.
    Idle,
    /// Receiving chunks.
    Streaming,
    /// The body ended (or failed); the entry, if any, is frozen.
    Finalized,
}

/// What feeding one chunk did to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEffect {
    /// Nothing displayable yet.
    Nothing,
    /// The bot entry was created by this chunk.
    Created(EntryId),
    /// The existing bot entry's text was replaced.
    Updated(EntryId),
}

/// Transient state of one chat reply.
#[derive(Debug)]
pub struct ResponseStream {
    state: StreamState,
    decoder: Utf8Decoder,
    events: Option<EventStreamParser>,
    accumulator: String,
    entry: Option<EntryId>,
    agent_label: Option<String>,
    done: bool,
}

impl ResponseStream {
    /// Creates an idle stream whose bot entry will carry `agent_label`.
    pub fn new(agent_label: Option<String>) -> Self {
        Self {
            state: StreamState::Idle,
            decoder: Utf8Decoder::new(),
            events: None,
            accumulator: String::new(),
            entry: None,
            agent_label,
            done: false,
        }
    }

    /// `Idle → Streaming`, interpreting the body per `format`.
    ///
    /// `Auto` is treated as raw text here; resolve it against the response
    /// headers before calling.
    pub fn begin(&mut self, format: StreamFormat) {
        if self.state != StreamState::Idle {
            return;
        }
        self.events = match format {
            StreamFormat::EventStream => Some(EventStreamParser::new()),
            StreamFormat::Auto | StreamFormat::Raw => None,
        };
        self.state = StreamState::Streaming;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// The bot entry, once created.
    pub fn entry(&self) -> Option<EntryId> {
        self.entry
    }

    /// Everything decoded so far.
    pub fn text(&self) -> &str {
        &self.accumulator
    }

    /// True once an event-stream body has announced its end.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feeds one chunk of body bytes.
    ///
    /// Ignored unless the stream is `Streaming` and not yet done.
    pub fn push_chunk(&mut self, log: &mut MessageLog, chunk: &[u8]) -> ChunkEffect {
        if self.state != StreamState::Streaming || self.done {
            return ChunkEffect::Nothing;
        }
        let decoded = self.decoder.decode(chunk);
        match self.events.as_mut() {
            None => self.apply(log, &decoded),
            Some(parser) => {
                let frames = parser.push(&decoded);
                self.apply_frames(log, frames)
            }
        }
    }

    /// `Streaming → Finalized` at end of body.
    ///
    /// Flushes the decoder, freezes the entry, and returns it. `None` means
    /// nothing was ever received and no entry exists.
    pub fn finish(&mut self, log: &mut MessageLog) -> Option<EntryId> {
        if self.state == StreamState::Streaming && !self.done {
            let tail = self.decoder.finish();
            match self.events.as_mut() {
                None => {
                    if !tail.is_empty() {
                        self.apply(log, &tail);
                    }
                }
                Some(parser) => {
                    let mut frames = parser.push(&tail);
                    frames.extend(parser.finish());
                    self.apply_frames(log, frames);
                }
            }
        }
        self.close(log)
    }

    /// Stops after a transport error, keeping the text received so far.
    pub fn abort(&mut self, log: &mut MessageLog) -> Option<EntryId> {
        self.close(log)
    }

    fn close(&mut self, log: &mut MessageLog) -> Option<EntryId> {
        self.state = StreamState::Finalized;
        self.events = None;
        if let Some(id) = self.entry {
            log.replace_streaming_text(id, &self.accumulator);
            log.close(id);
        }
        self.accumulator = String::new();
        self.entry
    }

    fn apply_frames(&mut self, log: &mut MessageLog, frames: Vec<EventFrame>) -> ChunkEffect {
        let mut effect = ChunkEffect::Nothing;
        for frame in frames {
            if self.done {
                break;
            }
            match frame {
                EventFrame::Text(text) => effect = merge(effect, self.apply(log, &text)),
                EventFrame::Done => self.done = true,
            }
        }
        effect
    }

    fn apply(&mut self, log: &mut MessageLog, text: &str) -> ChunkEffect {
        self.accumulator.push_str(text);
        match self.entry {
            Some(id) => {
                log.replace_streaming_text(id, &self.accumulator);
                ChunkEffect::Updated(id)
            }
            None => {
                let mut message = Message::bot(self.accumulator.clone());
                if let Some(label) = &self.agent_label {
                    message = message.with_agent_label(label.clone());
                }
                let id = log.append_streaming(message);
                self.entry = Some(id);
                ChunkEffect::Created(id)
            }
        }
    }
}

fn merge(earlier: ChunkEffect, later: ChunkEffect) -> ChunkEffect {
    match (earlier, later) {
        (ChunkEffect::Created(id), _) => ChunkEffect::Created(id),
        (_, later) => later,
    }
}

/// Drives `body` through `response` to completion, reporting every change.
///
/// Chunks are processed strictly in arrival order. On a transport error the
/// entry keeps its partial text and the error is returned; nothing is added
/// to the log for it.
pub async fn render_stream<S>(
    mut body: S,
    mut response: ResponseStream,
    log: &mut MessageLog,
    renderer: &mut dyn Renderer,
) -> Result<Option<EntryId>>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let start = Instant::now();
    let outcome: Result<()> = loop {
        match body.next().await {
            Some(Ok(chunk)) => {
                STREAM_CHUNKS.click();
                STREAM_BYTES.count(chunk.len() as u64);
                report(response.push_chunk(log, &chunk), log, renderer);
                if response.is_done() {
                    break Ok(());
                }
            }
            Some(Err(err)) => break Err(err),
            None => break Ok(()),
        }
    };
    STREAM_DURATION.add(start.elapsed().as_secs_f64());

    match outcome {
        Ok(()) => {
            // The decoder tail may still change the text at end of body.
            let before = response.entry().map(|_| response.text().len());
            let entry = response.finish(log);
            match entry {
                Some(id) => {
                    if let Some(e) = log.get(id) {
                        let len = e.as_message().map_or(0, |m| m.text.len());
                        match before {
                            None => renderer.append_entry(id, e),
                            Some(printed) if printed != len => renderer.update_entry(id, e),
                            Some(_) => {}
                        }
                        renderer.finish_entry(id, e);
                    }
                }
                None => {
                    STREAM_EMPTY.click();
                    tracing::debug!("chat reply was empty");
                }
            }
            Ok(entry)
        }
        Err(err) => {
            STREAM_ERRORS.click();
            tracing::warn!(error = %err, "chat stream failed");
            if let Some(id) = response.abort(log)
                && let Some(e) = log.get(id)
            {
                renderer.finish_entry(id, e);
            }
            Err(err)
        }
    }
}

fn report(effect: ChunkEffect, log: &MessageLog, renderer: &mut dyn Renderer) {
    match effect {
        ChunkEffect::Created(id) => {
            if let Some(entry) = log.get(id) {
                renderer.append_entry(id, entry);
            }
        }
        ChunkEffect::Updated(id) => {
            if let Some(entry) = log.get(id) {
                renderer.update_entry(id, entry);
            }
        }
        ChunkEffect::Nothing => {}
    }
}
