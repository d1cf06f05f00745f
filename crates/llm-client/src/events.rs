//! Normalized events produced by a completion call.
//!
//! Streaming and non-streaming calls converge on the same contract: zero or
//! more `TextDelta` events followed by exactly one terminal event
//! (`MessageComplete` or `Error`).

/// One incremental chunk of generated text.
///
/// Never constructed with empty content; empty upstream deltas are dropped
/// before an event is produced.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TextDelta {
    /// Text fragment in generation order.
    pub content: String,
}

impl TextDelta {
    pub(crate) fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Token accounting reported by the upstream response, when present.
///
/// Figures are surfaced as-is; this layer does not cross-check that
/// `total_tokens` equals `prompt_tokens + completion_tokens`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Prompt tokens served from the provider's prompt cache.
    pub cached_tokens: u64,
}

/// Normalized stream events yielded by `CompletionStream`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StreamEvent {
    /// Incremental text output from a streaming response.
    TextDelta(TextDelta),
    /// Terminal success event, emitted exactly once per call.
    MessageComplete {
        /// Vendor finish reason when reported (for example `stop`).
        finish_reason: Option<String>,
        /// Usage from the last chunk that carried it, or from the
        /// non-streaming response body.
        usage: Option<TokenUsage>,
        /// Message content for non-streaming calls. Streaming calls surface
        /// content through prior `TextDelta` events instead and leave this
        /// unset.
        content: Option<TextDelta>,
    },
    /// Terminal failure event, emitted exactly once per failed call.
    Error { message: String },
}

impl StreamEvent {
    /// Returns true for `MessageComplete` and `Error`, after which no further
    /// events are emitted for the call.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StreamEvent::MessageComplete { .. } | StreamEvent::Error { .. }
        )
    }
}
