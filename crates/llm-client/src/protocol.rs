//! Wire types for the OpenAI-compatible chat-completions endpoint.
//!
//! Request types serialize into the POST body; response types deserialize
//! both the one-shot completion object and individual streaming chunks.
//! Only the fields this crate consumes are modeled.

use crate::errors::ClientError;
use crate::events::TokenUsage;

/// One conversation message sent upstream.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// Creates a message with the given role.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    /// Creates a `user` message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    /// Creates a `system` message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// A single completion request: model, ordered messages, streaming flag.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

impl ChatRequest {
    /// Creates a streaming request.
    pub fn streaming(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }

    /// Creates a non-streaming request.
    pub fn one_shot(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        if self.model.trim().is_empty() {
            return Err(ClientError::Config("model must not be empty".into()));
        }
        if self.messages.is_empty() {
            return Err(ClientError::Config(
                "at least one message is required".into(),
            ));
        }
        Ok(())
    }

    /// Builds the JSON request body.
    ///
    /// Streaming requests ask for usage on the final chunk via
    /// `stream_options.include_usage`.
    pub(crate) fn body(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": self.messages,
            "stream": self.stream,
        });
        if self.stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        body
    }
}

/// Non-streaming response body. Only the leading choice is consumed.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<UsageWire>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct CompletionChoice {
    #[serde(default)]
    pub message: Option<AssistantMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// One streaming chunk. Chunks without choices are valid keep-alives.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub usage: Option<UsageWire>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// Usage block as reported upstream.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct UsageWire {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
}

impl From<&UsageWire> for TokenUsage {
    fn from(wire: &UsageWire) -> Self {
        TokenUsage {
            prompt_tokens: wire.prompt_tokens,
            completion_tokens: wire.completion_tokens,
            total_tokens: wire.total_tokens,
            cached_tokens: wire
                .prompt_tokens_details
                .as_ref()
                .map(|d| d.cached_tokens)
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streaming_body_requests_usage_on_final_chunk() {
        let req = ChatRequest::streaming("gpt-5-nano", vec![ChatMessage::user("hi")]);
        let body = req.body();
        assert_eq!(body.get("stream").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(
            body.pointer("/stream_options/include_usage")
                .and_then(|v| v.as_bool()),
            Some(true)
        );
    }

    #[test]
    fn one_shot_body_omits_stream_options() {
        let req = ChatRequest::one_shot("gpt-5-nano", vec![ChatMessage::user("hi")]);
        let body = req.body();
        assert_eq!(body.get("stream").and_then(|v| v.as_bool()), Some(false));
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn validate_rejects_empty_model_and_messages() {
        let req = ChatRequest::one_shot("  ", vec![ChatMessage::user("hi")]);
        assert!(req.validate().is_err());
        let req = ChatRequest::one_shot("gpt-5-nano", vec![]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn chunk_deserializes_without_choices() {
        let chunk: ChatChunk = serde_json::from_str(
            r#"{"usage":{"prompt_tokens":3,"completion_tokens":4,"total_tokens":7,
                "prompt_tokens_details":{"cached_tokens":2}}}"#,
        )
        .expect("chunk");
        assert!(chunk.choices.is_empty());
        let usage = TokenUsage::from(chunk.usage.as_ref().expect("usage"));
        assert_eq!(usage.total_tokens, 7);
        assert_eq!(usage.cached_tokens, 2);
    }

    #[test]
    fn completion_deserializes_message_content() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"hello"},"finish_reason":"stop"}]}"#,
        )
        .expect("completion");
        let choice = completion.choices.first().expect("choice");
        assert_eq!(
            choice.message.as_ref().and_then(|m| m.content.as_deref()),
            Some("hello")
        );
        assert_eq!(choice.finish_reason.as_deref(), Some("stop"));
    }
}
