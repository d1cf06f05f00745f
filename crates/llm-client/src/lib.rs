//! Chat-completion client that normalizes streaming and one-shot responses
//! into a single typed event sequence, with retry/backoff around the call.
//!
//! Every call yields zero or more [`StreamEvent::TextDelta`] events followed
//! by exactly one terminal event ([`StreamEvent::MessageComplete`] or
//! [`StreamEvent::Error`]). Rate-limit and connectivity failures are retried
//! with exponential backoff; all other upstream failures end the sequence
//! immediately.
//!
//! # Usage
//!
//! ```no_run
//! use llm_client::{ChatMessage, ChatRequest, ClientError, LlmClient, StreamEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ClientError> {
//! let client = LlmClient::from_env()?;
//!
//! let mut stream = client
//!     .chat_completion(ChatRequest::streaming(
//!         "gpt-5-nano",
//!         vec![ChatMessage::user("what's up?")],
//!     ))
//!     .await?;
//!
//! while let Some(event) = stream.next_event().await {
//!     match event {
//!         StreamEvent::TextDelta(delta) => print!("{}", delta.content),
//!         StreamEvent::MessageComplete { .. } => println!(),
//!         StreamEvent::Error { message } => eprintln!("call failed: {message}"),
//!     }
//! }
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

/// Public client, retry policy, and the per-call event stream.
pub mod client;
/// Endpoint/credential configuration.
pub mod config;
/// Public error types and failure classification.
pub mod errors;
/// Normalized stream events and token accounting.
pub mod events;
/// Upstream-shape to event-model conversion.
mod normalize;
/// Request and response wire types.
pub mod protocol;
/// Transport contract, HTTP implementation, and SSE decoding.
pub mod transport;

pub use client::{CompletionStream, LlmClient, RetryPolicy};
pub use config::ClientConfig;
pub use errors::ClientError;
pub use events::{StreamEvent, TextDelta, TokenUsage};
pub use protocol::{ChatMessage, ChatRequest};
pub use transport::{ChatTransport, ChunkStream, HttpTransport, TransportReply};
