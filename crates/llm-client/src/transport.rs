//! Transport seam between the retry controller and the wire.
//!
//! `ChatTransport` abstracts one upstream exchange so the controller can be
//! exercised against fakes; `HttpTransport` is the real implementation over
//! `reqwest`, with a lazily acquired client handle and an incremental SSE
//! decoder for streaming responses.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use futures::StreamExt as _;
use futures::stream;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::{ClientError, classify_reqwest, classify_status};
use crate::protocol::{ChatChunk, ChatCompletion, ChatRequest};

/// Boxed stream of decoded chunks from a streaming response.
pub type ChunkStream =
    Pin<Box<dyn futures::Stream<Item = Result<ChatChunk, ClientError>> + Send + 'static>>;

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Result of one upstream exchange, before normalization.
pub enum TransportReply {
    /// Non-streaming: the single parsed response body.
    Complete(ChatCompletion),
    /// Streaming: chunks decoded as they arrive.
    Stream(ChunkStream),
}

/// One upstream exchange plus handle lifecycle.
///
/// `acquire` and `release` are both idempotent; `send` performs lazy
/// acquisition itself, so `acquire` exists to surface configuration errors
/// before any event sequence begins.
#[async_trait::async_trait]
pub trait ChatTransport: Send + Sync {
    /// Ensures a live handle exists, creating one if needed.
    async fn acquire(&self) -> Result<(), ClientError>;

    /// Releases the live handle, if any. Safe to call repeatedly.
    async fn release(&self);

    /// Issues one request and returns the raw reply.
    async fn send(&self, request: &ChatRequest) -> Result<TransportReply, ClientError>;
}

/// `reqwest`-backed transport for an OpenAI-compatible endpoint.
pub struct HttpTransport {
    config: ClientConfig,
    // Guards lazy construction so concurrent first-use cannot race. reqwest
    // clients are Arc-backed clones; the pool closes when the last clone
    // drops, so release() does not tear down in-flight calls.
    handle: Mutex<Option<reqwest::Client>>,
}

impl HttpTransport {
    /// Creates a transport; the HTTP client is not built until first use.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            handle: Mutex::new(None),
        }
    }

    async fn handle(&self) -> Result<reqwest::Client, ClientError> {
        let mut guard = self.handle.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        self.config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        debug!(base_url = %self.config.base_url, "acquired HTTP client handle");
        *guard = Some(client.clone());
        Ok(client)
    }
}

#[async_trait::async_trait]
impl ChatTransport for HttpTransport {
    async fn acquire(&self) -> Result<(), ClientError> {
        self.handle().await.map(|_| ())
    }

    async fn release(&self) {
        let mut guard = self.handle.lock().await;
        if guard.take().is_some() {
            debug!("released HTTP client handle");
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<TransportReply, ClientError> {
        let client = self.handle().await?;
        let response = client
            .post(self.config.chat_completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&request.body())
            .send()
            .await
            .map_err(|e| classify_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            let mut err = classify_status(status.as_u16(), &body);
            if let ClientError::RateLimited {
                retry_after: hint, ..
            } = &mut err
            {
                *hint = retry_after;
            }
            return Err(err);
        }

        if request.stream {
            let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
            Ok(TransportReply::Stream(decode_chunk_stream(bytes_stream)))
        } else {
            let completion = response
                .json::<ChatCompletion>()
                .await
                .map_err(|e| ClientError::upstream(format!("invalid response body: {e}"), None))?;
            Ok(TransportReply::Complete(completion))
        }
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Incremental decoder for `text/event-stream` bodies.
///
/// Frames are separated by a blank line; only `data:` lines are meaningful
/// for the chat-completions stream. Comment lines and partial frames are
/// held until complete.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Feeds one network chunk and returns every completed `data` payload.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some((idx, delim_len)) = frame_boundary(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..idx + delim_len).take(idx).collect();
            if let Some(data) = frame_data(&frame) {
                payloads.push(data);
            }
        }
        payloads
    }
}

fn frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    for i in 0..buf.len().saturating_sub(1) {
        if buf[i] == b'\n' && buf[i + 1] == b'\n' {
            return Some((i, 2));
        }
        if buf[i..].starts_with(b"\r\n\r\n") {
            return Some((i, 4));
        }
    }
    None
}

fn frame_data(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let mut data_lines = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.trim_start().to_string());
        }
    }
    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Turns the raw SSE byte stream into parsed `ChatChunk`s.
///
/// The `[DONE]` sentinel ends the stream; read failures are classified as
/// transient, undecodable frames as upstream protocol errors.
fn decode_chunk_stream(bytes_stream: ByteStream) -> ChunkStream {
    struct State {
        bytes_stream: ByteStream,
        decoder: SseDecoder,
        pending: VecDeque<ChatChunk>,
        done: bool,
    }

    Box::pin(stream::try_unfold(
        State {
            bytes_stream,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(chunk) = state.pending.pop_front() {
                    return Ok(Some((chunk, state)));
                }
                if state.done {
                    return Ok(None);
                }
                match state.bytes_stream.next().await {
                    Some(Ok(bytes)) => {
                        for payload in state.decoder.push_chunk(&bytes) {
                            if payload.trim() == "[DONE]" {
                                state.done = true;
                                break;
                            }
                            let chunk: ChatChunk =
                                serde_json::from_str(&payload).map_err(|e| {
                                    ClientError::upstream(
                                        format!("invalid SSE JSON frame: {e}"),
                                        None,
                                    )
                                })?;
                            state.pending.push_back(chunk);
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ClientError::transient(format!(
                            "streaming read failed: {e}"
                        )));
                    }
                    None => state.done = true,
                }
            }
        },
    ))
}
