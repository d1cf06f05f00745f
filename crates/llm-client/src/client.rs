//! Public client, retry/backoff controller, and the event stream handle.
//!
//! One completion call runs as a spawned task that issues up to
//! `1 + max_retries` attempts against the transport, forwarding normalized
//! events into a bounded channel as they are produced. Dropping the
//! `CompletionStream` cancels the in-flight request and any pending backoff.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt as _;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::errors::ClientError;
use crate::events::StreamEvent;
use crate::normalize::{ChunkNormalizer, completion_event};
use crate::protocol::ChatRequest;
use crate::transport::{ChatTransport, HttpTransport, TransportReply};

const DEFAULT_EVENT_BUFFER_CAPACITY: usize = 128;

/// Backoff policy for retryable failures.
///
/// The wait before retry `n` (zero-based) is `base_delay * 2^n`; a
/// server-provided `Retry-After` hint takes precedence when present.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Retries allowed beyond the first attempt.
    pub max_retries: u32,
    /// Backoff unit; doubled on each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Sets the retry cap.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff unit.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay_for(&self, attempt: u32, error: &ClientError) -> Duration {
        if let ClientError::RateLimited {
            retry_after: Some(hint),
            ..
        } = error
        {
            return *hint;
        }
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Chat-completion client with normalized streaming output and retries.
pub struct LlmClient {
    transport: Arc<dyn ChatTransport>,
    policy: RetryPolicy,
    buffer_capacity: usize,
}

impl LlmClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(Arc::new(HttpTransport::new(config)))
    }

    /// Creates a client using `OPENAI_API_KEY` / `OPENAI_BASE_URL`.
    pub fn from_env() -> Result<Self, ClientError> {
        Ok(Self::new(ClientConfig::from_env()?))
    }

    /// Creates a client over a custom transport (used by tests and proxies).
    pub fn with_transport(transport: Arc<dyn ChatTransport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            buffer_capacity: DEFAULT_EVENT_BUFFER_CAPACITY,
        }
    }

    /// Overrides the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the bounded event buffer size used between the completion task
    /// and the consumer. Must be greater than 0.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Issues one completion call and returns its event stream.
    ///
    /// Configuration errors (bad credential/endpoint, invalid request) are
    /// returned here, before any event sequence exists. Every later failure
    /// is delivered in-band as a terminal `StreamEvent::Error`.
    pub async fn chat_completion(
        &self,
        request: ChatRequest,
    ) -> Result<CompletionStream, ClientError> {
        request.validate()?;
        if self.buffer_capacity == 0 {
            return Err(ClientError::Config(
                "event buffer capacity must be greater than 0".into(),
            ));
        }
        self.transport.acquire().await?;

        let (tx, rx) = mpsc::channel(self.buffer_capacity);
        tokio::spawn(completion_task(
            self.transport.clone(),
            request,
            self.policy.clone(),
            tx,
        ));
        Ok(CompletionStream {
            rx,
            saw_terminal: false,
        })
    }

    /// Releases the underlying client handle. Safe to call repeatedly; the
    /// next call re-acquires lazily.
    pub async fn close(&self) {
        self.transport.release().await;
    }
}

/// Event stream for one completion call.
///
/// Finite and not restartable: events end with exactly one terminal event
/// (`MessageComplete` or `Error`). Dropping the stream before the terminal
/// event cancels the underlying request and any pending backoff wait.
pub struct CompletionStream {
    rx: mpsc::Receiver<StreamEvent>,
    saw_terminal: bool,
}

impl CompletionStream {
    /// Waits for and returns the next event, or `None` after the terminal
    /// event has been delivered.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        if self.saw_terminal {
            return None;
        }
        let event = self.rx.recv().await;
        if let Some(event) = &event
            && event.is_terminal()
        {
            self.saw_terminal = true;
        }
        event
    }

    /// Drains the stream and returns the concatenated text of the call.
    ///
    /// Streaming deltas and one-shot embedded content both contribute. A
    /// terminal `Error` event is surfaced as an `Upstream` error carrying
    /// the event's message.
    pub async fn collect_text(mut self) -> Result<String, ClientError> {
        let mut text = String::new();
        while let Some(event) = self.next_event().await {
            match event {
                StreamEvent::TextDelta(delta) => text.push_str(&delta.content),
                StreamEvent::MessageComplete { content, .. } => {
                    if let Some(delta) = content {
                        text.push_str(&delta.content);
                    }
                }
                StreamEvent::Error { message } => {
                    return Err(ClientError::upstream(message, None));
                }
            }
        }
        Ok(text)
    }
}

enum AttemptOutcome {
    Completed,
    Disengaged,
}

async fn completion_task(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
    policy: RetryPolicy,
    tx: mpsc::Sender<StreamEvent>,
) {
    let mut attempt = 0u32;
    loop {
        debug!(attempt, model = %request.model, stream = request.stream, "starting completion attempt");
        match run_attempt(transport.as_ref(), &request, &tx).await {
            Ok(AttemptOutcome::Completed) => return,
            Ok(AttemptOutcome::Disengaged) => {
                debug!(attempt, "consumer disengaged; abandoning call");
                return;
            }
            Err(err) if err.is_retryable() && attempt < policy.max_retries => {
                let delay = policy.delay_for(attempt, &err);
                warn!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying completion");
                tokio::select! {
                    _ = tx.closed() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(err) => {
                warn!(attempt, error = %err, "completion failed");
                let message = terminal_message(&err, attempt);
                let _ = tx.send(StreamEvent::Error { message }).await;
                return;
            }
        }
    }
}

fn terminal_message(err: &ClientError, attempt: u32) -> String {
    let attempts = attempt + 1;
    match err {
        ClientError::RateLimited { message, .. } => {
            format!("rate limit retries exhausted after {attempts} attempts: {message}")
        }
        ClientError::Transient(message) => {
            format!("connection retries exhausted after {attempts} attempts: {message}")
        }
        other => other.to_string(),
    }
}

async fn run_attempt(
    transport: &dyn ChatTransport,
    request: &ChatRequest,
    tx: &mpsc::Sender<StreamEvent>,
) -> Result<AttemptOutcome, ClientError> {
    // The exchange itself is raced against disengagement too, so a dropped
    // consumer abandons the request while it is still awaiting the response.
    let reply = tokio::select! {
        _ = tx.closed() => return Ok(AttemptOutcome::Disengaged),
        reply = transport.send(request) => reply?,
    };
    match reply {
        TransportReply::Complete(completion) => {
            if tx.send(completion_event(&completion)).await.is_err() {
                return Ok(AttemptOutcome::Disengaged);
            }
            Ok(AttemptOutcome::Completed)
        }
        TransportReply::Stream(mut chunks) => {
            let mut normalizer = ChunkNormalizer::default();
            loop {
                let next = tokio::select! {
                    _ = tx.closed() => return Ok(AttemptOutcome::Disengaged),
                    next = chunks.next() => next,
                };
                match next {
                    Some(Ok(chunk)) => {
                        if let Some(event) = normalizer.observe(&chunk) {
                            if tx.send(event).await.is_err() {
                                return Ok(AttemptOutcome::Disengaged);
                            }
                        }
                    }
                    Some(Err(err)) => return Err(err),
                    None => break,
                }
            }
            if tx.send(normalizer.finish()).await.is_err() {
                return Ok(AttemptOutcome::Disengaged);
            }
            Ok(AttemptOutcome::Completed)
        }
    }
}
