//! Converts upstream response shapes into normalized stream events.
//!
//! Streaming and non-streaming paths share one terminal-event contract so
//! callers can treat both modes uniformly. The asymmetry is deliberate:
//! streaming content arrives as separate `TextDelta` events, non-streaming
//! content rides inside the terminal `MessageComplete` (one message vs.
//! incremental chunks).

use crate::events::{StreamEvent, TextDelta, TokenUsage};
use crate::protocol::{ChatChunk, ChatCompletion};

/// Accumulates per-stream metadata while chunks are normalized one at a time.
#[derive(Debug, Default)]
pub(crate) struct ChunkNormalizer {
    usage: Option<TokenUsage>,
    finish_reason: Option<String>,
}

impl ChunkNormalizer {
    /// Folds one chunk into the normalizer state.
    ///
    /// Returns a `TextDelta` event when the chunk's leading choice carries
    /// non-empty content; deltas are emitted immediately, never coalesced.
    /// Usage is captured last-write-wins since upstream typically populates
    /// it only on the final chunk. Chunks without choices are keep-alives.
    pub fn observe(&mut self, chunk: &ChatChunk) -> Option<StreamEvent> {
        if let Some(usage) = chunk.usage.as_ref() {
            self.usage = Some(TokenUsage::from(usage));
        }
        let choice = chunk.choices.first()?;
        if let Some(reason) = choice.finish_reason.as_ref() {
            self.finish_reason = Some(reason.clone());
        }
        match choice.delta.content.as_deref() {
            Some(content) if !content.is_empty() => {
                Some(StreamEvent::TextDelta(TextDelta::new(content)))
            }
            _ => None,
        }
    }

    /// Produces the terminal event once the upstream chunk sequence is
    /// exhausted. Emitted even for zero-delta streams.
    pub fn finish(self) -> StreamEvent {
        StreamEvent::MessageComplete {
            finish_reason: self.finish_reason,
            usage: self.usage,
            content: None,
        }
    }
}

/// Normalizes a one-shot response into its single terminal event.
///
/// Message content, when present and non-empty, is embedded in the terminal
/// event rather than emitted as a separate prior delta.
pub(crate) fn completion_event(completion: &ChatCompletion) -> StreamEvent {
    let choice = completion.choices.first();
    let content = choice
        .and_then(|c| c.message.as_ref())
        .and_then(|m| m.content.as_deref())
        .filter(|c| !c.is_empty())
        .map(TextDelta::new);
    StreamEvent::MessageComplete {
        finish_reason: choice.and_then(|c| c.finish_reason.clone()),
        usage: completion.usage.as_ref().map(TokenUsage::from),
        content,
    }
}
