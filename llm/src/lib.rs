//! Minimal OpenAI-compatible chat completions client.
//!
//! This crate provides a focused client for the `/chat/completions` endpoint
//! spoken by OpenAI, Ollama and several hosted proxies, with:
//! - Non-streaming and streaming completions
//! - Proper SSE parsing for streaming responses

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio_stream::Stream;

/// Errors that can occur when using the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A boxed stream of server-sent events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, Error>> + Send>>;

/// Chat completions client bound to one endpoint and one default model.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl Client {
    /// Create a client for `base_url` (for example `https://api.openai.com/v1`).
    ///
    /// Endpoints that do not need authentication (a local Ollama) take `None`.
    pub fn new(base_url: &str, api_key: Option<String>, model: impl Into<String>) -> Self {
        // Connect timeout only; streamed replies have no upper bound.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        }
    }

    /// Create a client whose key is read from the environment variable `key_var`.
    pub fn from_env(base_url: &str, key_var: &str, model: impl Into<String>) -> Result<Self, Error> {
        let api_key = std::env::var(key_var).map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(base_url, Some(api_key), model))
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a completion request and return the full response.
    pub async fn complete(&self, request: Request) -> Result<Response, Error> {
        let api_request = self.build_api_request(&request, false);
        let response = self.send(&api_request).await?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Parse("no choices in response".to_string()))?;

        Ok(Response {
            model: api_response.model,
            text: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_api),
        })
    }

    /// Send a completion request and stream the response.
    pub async fn stream(&self, request: Request) -> Result<EventStream, Error> {
        let api_request = self.build_api_request(&request, true);
        let response = self.send(&api_request).await?;

        Ok(event_stream(response.bytes_stream()))
    }

    async fn send(&self, api_request: &ApiRequest) -> Result<reqwest::Response, Error> {
        tracing::debug!(
            model = %api_request.model,
            messages = api_request.messages.len(),
            stream = api_request.stream,
            "sending chat completion request"
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .headers(self.build_headers()?)
            .json(api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        Ok(response)
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(ref key) = self.api_key {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {key}"))
                    .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
            );
        }
        Ok(headers)
    }

    fn build_api_request(&self, request: &Request, stream: bool) -> ApiRequest {
        ApiRequest {
            model: request.model.clone().unwrap_or_else(|| self.model.clone()),
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A chat completion request.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl Request {
    /// Create a new request with the given messages.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            messages,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A non-streaming completion response.
#[derive(Debug, Clone)]
pub struct Response {
    pub model: String,
    pub text: String,
    pub finish_reason: Option<FinishReason>,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Other,
}

impl FinishReason {
    fn from_api(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Other,
        }
    }
}

// ============================================================================
// Streaming types
// ============================================================================

/// Events from a streaming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A piece of generated text.
    TextDelta { text: String },
    /// The choice finished; more metadata chunks may still follow.
    Finish { reason: FinishReason },
    /// The server sent `[DONE]`.
    Done,
}

// ============================================================================
// Internal API types
// ============================================================================

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiChunk {
    #[serde(default)]
    choices: Vec<ApiChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChunkChoice {
    #[serde(default)]
    delta: ApiDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Turn a body of SSE bytes into events.
///
/// Ends after `[DONE]`, or when the body ends. A final line without a trailing
/// newline is still parsed.
fn event_stream<S, B, E>(chunks: S) -> EventStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    // `None` marks the end of the body so the decoder can flush.
    let stream = chunks
        .map(Some)
        .chain(futures::stream::once(futures::future::ready(None)))
        .scan(SseDecoder::default(), |decoder, chunk| {
            if decoder.done {
                return futures::future::ready(None);
            }
            let events = match chunk {
                Some(Ok(bytes)) => decoder.push(bytes.as_ref()),
                Some(Err(e)) => vec![Err(Error::Network(e.to_string()))],
                None => decoder.finish(),
            };
            futures::future::ready(Some(events))
        })
        .flat_map(futures::stream::iter);

    Box::pin(stream)
}

/// Incremental SSE line decoder.
///
/// Bytes are buffered until a `\n` arrives, so a multi-byte character split
/// across chunks is decoded whole. Only `data:` lines carry payload.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Add a chunk and return the events of every line it completes.
    fn push(&mut self, chunk: &[u8]) -> Vec<Result<StreamEvent, Error>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while !self.done {
            let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            self.parse_line(&line[..newline_pos], &mut events);
        }
        events
    }

    /// Parse whatever is left once the body has ended.
    fn finish(&mut self) -> Vec<Result<StreamEvent, Error>> {
        let mut events = Vec::new();
        let rest = std::mem::take(&mut self.buffer);
        if !self.done && !rest.is_empty() {
            self.parse_line(&rest, &mut events);
        }
        events
    }

    fn parse_line(&mut self, line: &[u8], events: &mut Vec<Result<StreamEvent, Error>>) {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches('\r');

        // event:, id:, comments and blank separators carry nothing we need
        let Some(payload) = line.strip_prefix("data:") else {
            return;
        };
        let json_str = payload.trim_start();
        if json_str == "[DONE]" {
            self.done = true;
            events.push(Ok(StreamEvent::Done));
        } else if !json_str.is_empty() {
            match serde_json::from_str::<ApiChunk>(json_str) {
                Ok(chunk) => events.extend(convert_chunk(chunk).into_iter().map(Ok)),
                Err(e) => events.push(Err(Error::Parse(format!("SSE parse error: {e}")))),
            }
        }
    }
}

fn convert_chunk(chunk: ApiChunk) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.content {
            if !text.is_empty() {
                events.push(StreamEvent::TextDelta { text });
            }
        }
        if let Some(reason) = choice.finish_reason {
            events.push(StreamEvent::Finish {
                reason: FinishReason::from_api(&reason),
            });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(events: &[Result<StreamEvent, Error>]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                Ok(StreamEvent::TextDelta { text }) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new("https://api.openai.com/v1/", None, "gpt-4o-mini");
        assert_eq!(client.model(), "gpt-4o-mini");
        assert_eq!(client.base_url(), "https://api.openai.com/v1");
    }

    #[test]
    fn test_client_with_model() {
        let client = Client::new("http://localhost:11434/v1", None, "llama3").with_model("mistral");
        assert_eq!(client.model(), "mistral");
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new(vec![Message::system("Be terse"), Message::user("Hello")])
            .with_max_tokens(1000)
            .with_temperature(0.7);

        assert_eq!(request.max_tokens, Some(1000));
        assert_eq!(request.temperature, Some(0.7));
        assert_eq!(request.messages[0].role, Role::System);
    }

    #[test]
    fn test_api_request_uses_default_model() {
        let client = Client::new("http://localhost", None, "llama3");
        let api = client.build_api_request(&Request::new(vec![Message::user("hi")]), true);
        assert_eq!(api.model, "llama3");
        assert!(api.stream);
        assert_eq!(api.messages[0].role, "user");

        let api = client.build_api_request(
            &Request::new(vec![Message::assistant("yo")]).with_model("other"),
            false,
        );
        assert_eq!(api.model, "other");
        assert_eq!(api.messages[0].role, "assistant");
    }

    #[test]
    fn test_headers_without_key_have_no_authorization() {
        let client = Client::new("http://localhost", None, "llama3");
        let headers = client.build_headers().unwrap();
        assert!(headers.get(AUTHORIZATION).is_none());

        let client = Client::new("http://localhost", Some("sk-test".to_string()), "gpt");
        let headers = client.build_headers().unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer sk-test");
    }

    fn delta(text: &str) -> String {
        format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"{text}\"}}}}]}}\n\n")
    }

    #[test]
    fn test_sse_text_deltas_and_done() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(
            b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"You enter\"}}]}\n\n\
              data: {\"choices\":[{\"delta\":{\"content\":\" a clearing.\"}}]}\n\n\
              data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n\
              data: [DONE]\n\n",
        );

        assert_eq!(texts(&events), vec!["You enter", " a clearing."]);
        assert!(matches!(
            events[events.len() - 2],
            Ok(StreamEvent::Finish {
                reason: FinishReason::Stop
            })
        ));
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Done))));
        assert!(decoder.done);
    }

    #[test]
    fn test_sse_line_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: {\"choices\":[{\"delta\":{\"con");
        assert!(events.is_empty());

        let events = decoder.push(b"tent\":\"Bob\"}}]}\r\n\r\n");
        assert_eq!(texts(&events), vec!["Bob"]);
        assert!(decoder.buffer.is_empty());
    }

    #[test]
    fn test_sse_multibyte_character_split_across_chunks() {
        let line = delta("Café");
        let bytes = line.as_bytes();
        // Split between the two bytes of 'é'.
        let split = line.find('é').unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let events = decoder.push(&bytes[split..]);
        assert_eq!(texts(&events), vec!["Café"]);
    }

    #[test]
    fn test_sse_garbage_is_a_parse_error() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: {not json}\n");
        assert!(matches!(events[0], Err(Error::Parse(_))));
    }

    #[test]
    fn test_sse_truncated_line_does_not_block_later_lines() {
        let mut decoder = SseDecoder::default();
        let mut body = String::from("data: {\"choices\":[{\"delta\":{\"content\":\"Bo\n");
        body.push_str(&delta("You enter."));
        body.push_str("data: [DONE]\n");

        let events = decoder.push(body.as_bytes());

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], Err(Error::Parse(_))));
        assert_eq!(texts(&events), vec!["You enter."]);
        assert!(matches!(events[2], Ok(StreamEvent::Done)));
        assert!(decoder.buffer.is_empty());
    }

    #[test]
    fn test_sse_final_line_without_newline_is_flushed() {
        let mut decoder = SseDecoder::default();
        let line = delta("The end.");
        assert!(decoder.push(line.trim_end().as_bytes()).is_empty());

        let events = decoder.finish();
        assert_eq!(texts(&events), vec!["The end."]);
    }

    #[test]
    fn test_sse_ignores_comments_and_event_lines() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b": keep-alive\nevent: message\ndata: [DONE]\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Ok(StreamEvent::Done)));
    }

    #[tokio::test]
    async fn test_event_stream_reassembles_chunks_and_stops_at_done() {
        let mut body = delta("Caf\u{e9} ");
        body.push_str(&delta("open."));
        body.push_str("data: [DONE]\n\n");
        body.push_str(&delta("ignored"));

        // Three-byte chunks split characters and lines everywhere.
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> =
            body.as_bytes().chunks(3).map(|c| Ok(c.to_vec())).collect();

        let events: Vec<_> = event_stream(futures::stream::iter(chunks)).collect().await;

        assert_eq!(texts(&events), vec!["Café ", "open."]);
        assert!(matches!(events.last(), Some(Ok(StreamEvent::Done))));
    }

    #[tokio::test]
    async fn test_event_stream_reports_network_errors() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(delta("Half").into_bytes()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];

        let events: Vec<_> = event_stream(futures::stream::iter(chunks)).collect().await;

        assert_eq!(texts(&events), vec!["Half"]);
        assert!(matches!(events.last(), Some(Err(Error::Network(_)))));
    }
}
