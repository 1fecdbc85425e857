//! Mock AI Provider for testing.
//!
//! Provides a configurable implementation of the AIProvider port so that
//! activity flows can be exercised without calling a real service.
//!
//! # Features
//!
//! - Pre-configured responses, consumed in order
//! - Error injection, including failures in the middle of a stream
//! - A gate that holds responses back until the test releases them
//! - Call tracking for verification
//!
//! # Example
//!
//! ```ignore
//! let provider = MockAIProvider::new()
//!     .with_response("I study the heavens.")
//!     .with_error(MockError::Unavailable { message: "down".into() });
//! ```

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, CompletionRequest, CompletionResponse, CompletionStream, FinishReason,
    ProviderInfo, StreamChunk, TokenUsage,
};

/// Mock AI provider for testing.
#[derive(Debug, Clone)]
pub struct MockAIProvider {
    responses: Arc<Mutex<VecDeque<MockResponse>>>,
    info: ProviderInfo,
    delay: Duration,
    gate: Option<Arc<Notify>>,
    calls: Arc<Mutex<Vec<CompletionRequest>>>,
}

/// A configured mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success {
        content: String,
        finish_reason: FinishReason,
    },
    Error(MockError),
    /// Streams `content` word by word, then fails. `complete` fails outright.
    PartialThenError { content: String, error: MockError },
}

/// Mock error types for testing error handling.
#[derive(Debug, Clone)]
pub enum MockError {
    RateLimited { retry_after_secs: u32 },
    ContentFiltered { reason: String },
    Unavailable { message: String },
    AuthenticationFailed,
    Network { message: String },
    EmptyResponse,
    Timeout { timeout_secs: u32 },
}

impl From<MockError> for AIError {
    fn from(err: MockError) -> Self {
        match err {
            MockError::RateLimited { retry_after_secs } => AIError::rate_limited(retry_after_secs),
            MockError::ContentFiltered { reason } => AIError::content_filtered(reason),
            MockError::Unavailable { message } => AIError::unavailable(message),
            MockError::AuthenticationFailed => AIError::AuthenticationFailed,
            MockError::Network { message } => AIError::network(message),
            MockError::EmptyResponse => AIError::EmptyResponse,
            MockError::Timeout { timeout_secs } => AIError::Timeout { timeout_secs },
        }
    }
}

impl Default for MockAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockAIProvider {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            info: ProviderInfo::new("mock", "mock-model-1").with_streaming(true),
            delay: Duration::ZERO,
            gate: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Adds a successful response to the queue.
    pub fn with_response(self, content: impl Into<String>) -> Self {
        self.push(MockResponse::Success {
            content: content.into(),
            finish_reason: FinishReason::Stop,
        })
    }

    /// Adds an error response to the queue.
    pub fn with_error(self, error: MockError) -> Self {
        self.push(MockResponse::Error(error))
    }

    /// Adds a stream that delivers `content` and then fails.
    pub fn with_stream_failure(self, content: impl Into<String>, error: MockError) -> Self {
        self.push(MockResponse::PartialThenError {
            content: content.into(),
            error,
        })
    }

    /// Sets simulated latency per request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Holds every response until `gate` is notified once per call.
    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Returns all recorded calls.
    pub fn get_calls(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    fn push(self, response: MockResponse) -> Self {
        lock(&self.responses).push_back(response);
        self
    }

    async fn record_and_wait(&self, request: CompletionRequest) -> MockResponse {
        lock(&self.calls).push(request);
        // Take the response before waiting so call order decides which one
        // each caller gets.
        let response = lock(&self.responses)
            .pop_front()
            .unwrap_or_else(|| MockResponse::Success {
                content: "Mock response".to_string(),
                finish_reason: FinishReason::Stop,
            });

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        response
    }
}

fn word_chunks(content: &str) -> Vec<Result<StreamChunk, AIError>> {
    let words: Vec<&str> = content.split(' ').collect();
    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(i, w)| {
            if i == last {
                Ok(StreamChunk::content(*w))
            } else {
                Ok(StreamChunk::content(format!("{} ", w)))
            }
        })
        .collect()
}

#[async_trait]
impl AIProvider for MockAIProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        match self.record_and_wait(request).await {
            MockResponse::Success {
                content,
                finish_reason,
            } => Ok(CompletionResponse {
                usage: TokenUsage::new(10, content.len() as u32 / 4),
                content,
                model: self.info.model.clone(),
                finish_reason,
            }),
            MockResponse::Error(err) | MockResponse::PartialThenError { error: err, .. } => {
                Err(err.into())
            }
        }
    }

    async fn stream_complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, AIError> {
        match self.record_and_wait(request).await {
            MockResponse::Success {
                content,
                finish_reason,
            } => {
                let usage = TokenUsage::new(10, content.len() as u32 / 4);
                let chunks = stream::iter(word_chunks(&content)).chain(stream::once(async move {
                    Ok(StreamChunk::final_chunk(finish_reason, Some(usage)))
                }));
                Ok(Box::pin(chunks))
            }
            MockResponse::PartialThenError { content, error } => {
                let chunks = stream::iter(word_chunks(&content))
                    .chain(stream::once(async move { Err(AIError::from(error)) }));
                Ok(Box::pin(chunks))
            }
            MockResponse::Error(err) => Err(err.into()),
        }
    }

    fn provider_info(&self) -> ProviderInfo {
        self.info.clone()
    }
}
