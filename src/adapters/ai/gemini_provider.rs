//! Gemini Provider - Implementation of AIProvider for Google's Generative
//! Language REST API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = GeminiConfig::default()
//!     .with_model("gemini-2.0-flash-001")
//!     .with_timeout(Duration::from_secs(60));
//!
//! let provider = GeminiProvider::new(config, api_keys)?;
//! ```
//!
//! The API key is read from the `ApiKeyStore` on every request, so signing
//! out (clearing the store) takes effect immediately. Without a key every
//! call fails with `AIError::Unavailable`.
//!
//! # Streaming
//!
//! `streamGenerateContent?alt=sse` returns Server-Sent Events whose `data:`
//! payloads are complete `GenerateContentResponse` objects. Network chunks
//! can split a line or a character, so raw bytes are buffered until a
//! newline arrives and only whole lines are decoded.

use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::ports::{
    AIError, AIProvider, ApiKeyStore, CompletionRequest, CompletionResponse, CompletionStream,
    FinishReason, MessageRole, ProviderInfo, StreamChunk, TokenUsage,
};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-001";

/// Configuration for the Gemini provider.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// Model to use (e.g., "gemini-2.0-flash-001").
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
    /// Maximum retries on transient failures.
    pub max_retries: u32,
    /// First backoff delay; doubles on every retry.
    pub retry_base_delay: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_GEMINI_MODEL.to_string(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_base_delay: Duration::from_secs(1),
        }
    }
}

impl GeminiConfig {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }
}

/// Gemini API provider implementation.
pub struct GeminiProvider {
    config: GeminiConfig,
    client: Client,
    api_keys: Arc<dyn ApiKeyStore>,
}

impl GeminiProvider {
    /// Creates a provider reading its key from `api_keys`.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the HTTP client cannot be built
    pub fn new(config: GeminiConfig, api_keys: Arc<dyn ApiKeyStore>) -> Result<Self, AIError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AIError::InvalidRequest(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            config,
            client,
            api_keys,
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url, self.config.model
        )
    }

    fn api_key(&self) -> Result<Secret<String>, AIError> {
        self.api_keys
            .get()
            .ok_or_else(|| AIError::unavailable("no API key configured"))
    }

    /// Sends a request body to `url` and checks the status.
    async fn send(&self, url: String, body: &GeminiRequest) -> Result<Response, AIError> {
        let key = self.api_key()?;

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", key.expose_secret().as_str())
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AIError::Timeout {
                        timeout_secs: self.config.timeout.as_secs() as u32,
                    }
                } else if e.is_connect() {
                    AIError::network(format!("Connection failed: {}", e))
                } else {
                    AIError::network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u32>().ok());
        let body = response.text().await.unwrap_or_default();
        Err(map_error_status(status.as_u16(), &body, retry_after))
    }

    async fn complete_once(&self, body: &GeminiRequest) -> Result<CompletionResponse, AIError> {
        let response = self.send(self.generate_url(), body).await?;
        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AIError::parse(format!("Failed to parse response: {}", e)))?;
        into_completion(parsed, &self.config.model)
    }
}

#[async_trait]
impl AIProvider for GeminiProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, AIError> {
        // A missing key is not worth retrying.
        self.api_key()?;

        let body = GeminiRequest::from_request(&request);
        let mut retry_count = 0;

        loop {
            match self.complete_once(&body).await {
                Ok(completion) => return Ok(completion),
                Err(err) => {
                    if !err.is_retryable() || retry_count >= self.config.max_retries {
                        return Err(err);
                    }
                    tracing::warn!(
                        trace_id = %request.metadata.trace_id,
                        attempt = retry_count + 1,
                        error = %err,
                        "Gemini request failed, retrying"
                    );
                }
            }

            // Exponential backoff: base, 2x base, 4x base, ...
            sleep(self.config.retry_base_delay * (1u32 << retry_count)).await;
            retry_count += 1;
        }
    }

    async fn stream_complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionStream, AIError> {
        let body = GeminiRequest::from_request(&request);
        let response = self.send(self.stream_url(), &body).await?;

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| AIError::network(format!("Stream error: {}", e))));

        Ok(Box::pin(decode_sse(bytes)))
    }

    fn provider_info(&self) -> ProviderInfo {
        ProviderInfo::new("gemini", &self.config.model).with_streaming(true)
    }
}

/// Maps a non-success HTTP status to an `AIError`.
fn map_error_status(status: u16, body: &str, retry_after: Option<u32>) -> AIError {
    match status {
        401 | 403 => AIError::AuthenticationFailed,
        400 if body.contains("API_KEY_INVALID") || body.contains("API key not valid") => {
            AIError::AuthenticationFailed
        }
        400 => AIError::InvalidRequest(body.to_string()),
        429 => AIError::rate_limited(retry_after.unwrap_or(30)),
        500..=599 => AIError::unavailable(format!("Server error {}: {}", status, body)),
        _ => AIError::network(format!("Unexpected status {}: {}", status, body)),
    }
}

/// Turns raw SSE bytes into stream chunks.
///
/// Lines are cut on `\n` in the byte buffer and only complete lines are
/// decoded, so a character split across network chunks stays intact.
fn decode_sse<S, B>(bytes: S) -> impl Stream<Item = Result<StreamChunk, AIError>>
where
    S: Stream<Item = Result<B, AIError>>,
    B: AsRef<[u8]>,
{
    bytes
        .scan(Vec::new(), |buffer: &mut Vec<u8>, chunk| {
            let items: Vec<Result<StreamChunk, AIError>> = match chunk {
                Ok(bytes) => {
                    buffer.extend_from_slice(bytes.as_ref());
                    drain_complete_lines(buffer)
                        .iter()
                        .flat_map(|line| parse_sse_line(line))
                        .collect()
                }
                Err(err) => vec![Err(err)],
            };
            futures::future::ready(Some(items))
        })
        .flat_map(stream::iter)
}

/// Removes every complete line from `buffer`, leaving any partial tail.
fn drain_complete_lines(buffer: &mut Vec<u8>) -> Vec<String> {
    let mut lines = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        lines.push(
            String::from_utf8_lossy(&line)
                .trim_end_matches(|c: char| c == '\r' || c == '\n')
                .to_string(),
        );
    }
    lines
}

/// Parses one SSE line into zero or more chunks.
fn parse_sse_line(line: &str) -> Vec<Result<StreamChunk, AIError>> {
    let data = match line.strip_prefix("data:") {
        Some(data) => data.trim(),
        None => return Vec::new(),
    };
    if data.is_empty() {
        return Vec::new();
    }

    let parsed: GenerateContentResponse = match serde_json::from_str(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            return vec![Err(AIError::parse(format!(
                "Failed to parse SSE chunk: {}",
                e
            )))]
        }
    };

    if let Some(reason) = parsed.blocked_reason() {
        return vec![Err(AIError::content_filtered(reason))];
    }

    let mut results = Vec::new();
    let usage = parsed.usage_metadata.as_ref().map(GeminiUsage::to_usage);
    if let Some(candidate) = parsed.candidates.into_iter().next() {
        let text = candidate.text();
        if !text.is_empty() {
            results.push(Ok(StreamChunk::content(text)));
        }
        if let Some(reason) = candidate.finish_reason.as_deref() {
            results.push(Ok(StreamChunk::final_chunk(map_finish_reason(reason), usage)));
        }
    }
    results
}

fn map_finish_reason(reason: &str) -> FinishReason {
    match reason {
        "STOP" => FinishReason::Stop,
        "MAX_TOKENS" => FinishReason::Length,
        "SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII" => {
            FinishReason::ContentFilter
        }
        _ => FinishReason::Error,
    }
}

fn into_completion(
    response: GenerateContentResponse,
    model: &str,
) -> Result<CompletionResponse, AIError> {
    if let Some(reason) = response.blocked_reason() {
        return Err(AIError::content_filtered(reason));
    }

    let usage = response
        .usage_metadata
        .as_ref()
        .map(GeminiUsage::to_usage)
        .unwrap_or_default();
    let model = response.model_version.clone().unwrap_or_else(|| model.to_string());

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| AIError::parse("No candidates in response"))?;

    let content = candidate.text();
    let finish_reason = candidate
        .finish_reason
        .as_deref()
        .map(map_finish_reason)
        .unwrap_or(FinishReason::Stop);
    if finish_reason == FinishReason::ContentFilter {
        return Err(AIError::content_filtered(
            candidate.finish_reason.unwrap_or_default(),
        ));
    }

    if content.trim().is_empty() {
        return Err(AIError::EmptyResponse);
    }

    Ok(CompletionResponse {
        content,
        usage,
        model,
        finish_reason,
    })
}

// ----- Gemini API Types -----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GeminiRequest {
    fn from_request(request: &CompletionRequest) -> Self {
        let contents = request
            .messages
            .iter()
            .map(|m| GeminiContent {
                role: Some(
                    match m.role {
                        MessageRole::User => "user",
                        MessageRole::Assistant => "model",
                    }
                    .to_string(),
                ),
                parts: vec![GeminiPart {
                    text: Some(m.content.clone()),
                }],
            })
            .collect();

        let system_instruction = request.system_prompt.as_ref().map(|prompt| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(prompt.clone()),
            }],
        });

        let generation_config = if request.max_tokens.is_some() || request.temperature.is_some() {
            Some(GenerationConfig {
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            })
        } else {
            None
        };

        Self {
            contents,
            system_instruction,
            generation_config,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<GeminiUsage>,
    model_version: Option<String>,
}

impl GenerateContentResponse {
    fn blocked_reason(&self) -> Option<String> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

impl GeminiCandidate {
    fn text(&self) -> String {
        self.content
            .as_ref()
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl GeminiUsage {
    fn to_usage(&self) -> TokenUsage {
        TokenUsage::new(self.prompt_token_count, self.candidates_token_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::credentials::InMemoryApiKeyStore;
    use crate::domain::foundation::SessionId;
    use crate::ports::{RequestMetadata, RequestPurpose};

    fn request() -> CompletionRequest {
        CompletionRequest::new(RequestMetadata::new(SessionId::new(), RequestPurpose::ChatTurn))
            .with_system_prompt("You are Galileo Galilei.")
            .with_message(MessageRole::User, "Who are you?")
            .with_message(MessageRole::Assistant, "A humble astronomer.")
    }

    mod config {
        use super::*;

        #[test]
        fn defaults_match_service() {
            let config = GeminiConfig::default();
            assert_eq!(config.model, "gemini-2.0-flash-001");
            assert_eq!(config.base_url, DEFAULT_GEMINI_BASE_URL);
            assert_eq!(config.max_retries, 3);
        }

        #[test]
        fn base_url_loses_trailing_slash() {
            let config = GeminiConfig::default().with_base_url("http://localhost:8080/v1/");
            assert_eq!(config.base_url, "http://localhost:8080/v1");
        }

        #[test]
        fn urls_include_model_and_method() {
            let provider = GeminiProvider::new(
                GeminiConfig::default().with_model("gemini-test"),
                Arc::new(InMemoryApiKeyStore::new()),
            )
            .unwrap();
            assert!(provider
                .generate_url()
                .ends_with("/models/gemini-test:generateContent"));
            assert!(provider
                .stream_url()
                .ends_with("/models/gemini-test:streamGenerateContent?alt=sse"));
        }
    }

    mod request_body {
        use super::*;

        #[test]
        fn uses_gemini_roles_and_camel_case() {
            let body = GeminiRequest::from_request(&request().with_temperature(0.5));
            let json = serde_json::to_value(&body).unwrap();

            assert_eq!(json["contents"][0]["role"], "user");
            assert_eq!(json["contents"][1]["role"], "model");
            assert_eq!(json["contents"][1]["parts"][0]["text"], "A humble astronomer.");
            assert_eq!(
                json["systemInstruction"]["parts"][0]["text"],
                "You are Galileo Galilei."
            );
            assert_eq!(json["generationConfig"]["temperature"], 0.5);
            assert!(json["generationConfig"].get("maxOutputTokens").is_none());
        }

        #[test]
        fn omits_generation_config_when_unset() {
            let json = serde_json::to_value(GeminiRequest::from_request(&request())).unwrap();
            assert!(json.get("generationConfig").is_none());
        }
    }

    mod responses {
        use super::*;

        fn parse(json: &str) -> GenerateContentResponse {
            serde_json::from_str(json).unwrap()
        }

        #[test]
        fn joins_candidate_parts() {
            let response = parse(
                r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Eppur "},{"text":"si muove"}]},"finishReason":"STOP"}],
                   "usageMetadata":{"promptTokenCount":12,"candidatesTokenCount":4,"totalTokenCount":16}}"#,
            );
            let completion = into_completion(response, "gemini").unwrap();
            assert_eq!(completion.content, "Eppur si muove");
            assert_eq!(completion.finish_reason, FinishReason::Stop);
            assert_eq!(completion.usage.total_tokens, 16);
        }

        #[test]
        fn blocked_prompt_is_content_filtered() {
            let response = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#);
            assert!(matches!(
                into_completion(response, "gemini"),
                Err(AIError::ContentFiltered { .. })
            ));
        }

        #[test]
        fn blank_text_is_empty_response() {
            let response = parse(
                r#"{"candidates":[{"content":{"parts":[{"text":"  "}]},"finishReason":"STOP"}]}"#,
            );
            assert!(matches!(
                into_completion(response, "gemini"),
                Err(AIError::EmptyResponse)
            ));
        }

        #[test]
        fn no_candidates_is_parse_error() {
            assert!(matches!(
                into_completion(parse("{}"), "gemini"),
                Err(AIError::Parse(_))
            ));
        }
    }

    mod status_mapping {
        use super::*;

        #[test]
        fn maps_common_statuses() {
            assert!(matches!(
                map_error_status(403, "", None),
                AIError::AuthenticationFailed
            ));
            assert!(matches!(
                map_error_status(400, r#"{"error":{"status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#, None),
                AIError::AuthenticationFailed
            ));
            assert!(matches!(
                map_error_status(400, "bad field", None),
                AIError::InvalidRequest(_)
            ));
            assert!(matches!(
                map_error_status(429, "", Some(7)),
                AIError::RateLimited { retry_after_secs: 7 }
            ));
            assert!(matches!(
                map_error_status(429, "", None),
                AIError::RateLimited { retry_after_secs: 30 }
            ));
            assert!(map_error_status(503, "overloaded", None).is_retryable());
        }
    }

    mod sse {
        use super::*;

        #[test]
        fn content_line_yields_chunk() {
            let chunks = parse_sse_line(
                r#"data: {"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}"#,
            );
            assert_eq!(chunks.len(), 1);
            let chunk = chunks[0].as_ref().unwrap();
            assert_eq!(chunk.delta, "Hello");
            assert!(!chunk.is_final());
        }

        #[test]
        fn finish_reason_yields_final_chunk() {
            let chunks = parse_sse_line(
                r#"data: {"candidates":[{"content":{"parts":[{"text":"."}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":3,"candidatesTokenCount":1}}"#,
            );
            assert_eq!(chunks.len(), 2);
            let last = chunks[1].as_ref().unwrap();
            assert!(last.is_final());
            assert_eq!(last.usage.as_ref().map(|u| u.total_tokens), Some(4));
        }

        #[test]
        fn non_data_lines_are_ignored() {
            assert!(parse_sse_line("").is_empty());
            assert!(parse_sse_line(": keep-alive").is_empty());
        }

        #[test]
        fn malformed_data_is_parse_error() {
            let chunks = parse_sse_line("data: {not json");
            assert!(matches!(chunks[0], Err(AIError::Parse(_))));
        }

        #[test]
        fn partial_lines_stay_buffered() {
            let mut buffer = b"data: {\"a\":1}\r\ndata: {\"b\"".to_vec();
            let lines = drain_complete_lines(&mut buffer);
            assert_eq!(lines, vec!["data: {\"a\":1}".to_string()]);
            assert_eq!(buffer, b"data: {\"b\"".to_vec());
        }

        #[tokio::test]
        async fn character_split_across_chunks_is_decoded_whole() {
            let line = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Città\"}]}}]}\n\n";
            let bytes = line.as_bytes();
            // Cut between the two bytes of 'à'.
            let cut = line.find('à').unwrap() + 1;
            let chunks: Vec<Result<Vec<u8>, AIError>> =
                vec![Ok(bytes[..cut].to_vec()), Ok(bytes[cut..].to_vec())];

            let decoded: Vec<_> = decode_sse(stream::iter(chunks)).collect().await;

            assert_eq!(decoded.len(), 1);
            assert_eq!(decoded[0].as_ref().unwrap().delta, "Città");
        }

        #[tokio::test]
        async fn transport_error_is_forwarded() {
            let chunks: Vec<Result<Vec<u8>, AIError>> = vec![
                Ok(b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hi\"}]}}]}\n".to_vec()),
                Err(AIError::network("connection reset")),
            ];

            let decoded: Vec<_> = decode_sse(stream::iter(chunks)).collect().await;

            assert_eq!(decoded[0].as_ref().unwrap().delta, "Hi");
            assert!(matches!(decoded[1], Err(AIError::Network(_))));
        }
    }

    #[tokio::test]
    async fn missing_api_key_fails_fast_without_network() {
        let provider = GeminiProvider::new(
            GeminiConfig::default().with_retry_base_delay(Duration::from_secs(30)),
            Arc::new(InMemoryApiKeyStore::new()),
        )
        .unwrap();

        let result = provider.complete(request()).await;
        assert!(matches!(result, Err(AIError::Unavailable { .. })));
    }
}
