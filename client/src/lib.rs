//! Streaming chat-completion client.
//!
//! [`ChatClient`] drives a single streaming call against an OpenAI-compatible
//! `/chat/completions` endpoint and surfaces incremental text as
//! [`StreamEvent`]s over a [`tokio::sync::mpsc`] channel.
//!
//! # Invariants
//!
//! - At most one request is in flight per client; `start` cancels any
//!   previous request before issuing the new one.
//! - Events for a given `start` are never delivered after a later `start` or
//!   `stop` on the same client. Each request captures a generation number
//!   and checks it against the client's counter before every send.
//! - Cancellation is not an error: `stop` aborts the transport and suppresses
//!   the timeout message along with every other event.
//!
//! # Error handling
//!
//! All transport and protocol failures are converted to user-facing messages
//! and delivered as [`StreamEvent::Error`] — callers never see raw transport
//! errors. Error causes are distinguished: authentication (401), billing
//! (402), generic HTTP status, empty body, timeout.

mod sse;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::future::{AbortHandle, Abortable};
use reqwest::redirect::Policy;
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

use zenreply_types::{AppSettings, ChatEvent, RequestId, StreamEvent};

use crate::sse::{LineBuffer, SseLine, parse_sse_line};

/// Wall-clock budget for one whole streaming request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Fixed persona for the system message of every request.
const SYSTEM_PERSONA: &str = "你是资深中文沟通优化专家，只输出可直接发送的一段中文回复正文。";

pub const MISSING_API_KEY_ERROR: &str = "请先设置 API Key";
pub const AUTH_FAILED_ERROR: &str = "认证失败，请检查 API Key";
pub const INSUFFICIENT_BALANCE_ERROR: &str = "余额不足，请检查账户余额";
pub const EMPTY_RESPONSE_ERROR: &str = "模型返回了空响应";
pub const TIMEOUT_ERROR: &str = "请求超时，请重试";

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{MISSING_API_KEY_ERROR}")]
    MissingApiKey,
    #[error("调用模型接口失败: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("模型接口错误 {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug)]
struct ActiveRequest {
    id: RequestId,
    abort_handle: AbortHandle,
}

/// Owns at most one in-flight streaming chat-completion request.
#[derive(Debug)]
pub struct ChatClient {
    http: Client,
    request_timeout: Duration,
    /// Bumped on every `start` and `stop`; in-flight tasks compare their
    /// captured value before each send, so stale events are dropped even if
    /// the abort races the send.
    generation: Arc<AtomicU64>,
    active: Option<ActiveRequest>,
}

impl Default for ChatClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatClient {
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(REQUEST_TIMEOUT)
    }

    /// Client with a non-default request timeout. Used by tests to exercise
    /// the timeout path without waiting out the full budget.
    #[must_use]
    pub fn with_timeout(request_timeout: Duration) -> Self {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(Policy::none())
            .build()
            .expect("HTTP client must build");
        Self {
            http,
            request_timeout,
            generation: Arc::new(AtomicU64::new(0)),
            active: None,
        }
    }

    /// Begin a streaming request, cancelling any previous one first.
    ///
    /// With an empty API key this emits the fixed missing-key error
    /// synchronously and performs no network I/O. Events are tagged with the
    /// returned [`RequestId`].
    pub fn start(
        &mut self,
        prompt: String,
        settings: &AppSettings,
        tx: mpsc::Sender<ChatEvent>,
    ) -> RequestId {
        self.stop();

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let id = RequestId::new(generation);

        if !settings.has_api_key() {
            tracing::warn!(request = %id, "generation attempted without an API key");
            let event = ChatEvent {
                request_id: id,
                event: StreamEvent::Error(MISSING_API_KEY_ERROR.to_string()),
            };
            if let Err(err) = tx.try_send(event) {
                tracing::error!(request = %id, %err, "failed to deliver missing-key error");
            }
            return id;
        }

        let sink = EventSink {
            id,
            generation,
            counter: Arc::clone(&self.generation),
            tx,
        };
        let http = self.http.clone();
        let endpoint = chat_completions_url(&settings.api_base);
        let api_key = settings.api_key.clone();
        let body = request_body(&settings.model_name, &prompt);
        let request_timeout = self.request_timeout;

        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        let task = async move {
            if timeout(
                request_timeout,
                run_stream(http, endpoint, api_key, body, sink.clone()),
            )
            .await
            .is_err()
            {
                tracing::warn!(request = %sink.id, "streaming request timed out");
                sink.send(StreamEvent::Error(TIMEOUT_ERROR.to_string())).await;
            }
        };
        tokio::spawn(Abortable::new(task, abort_registration));

        self.active = Some(ActiveRequest { id, abort_handle });
        id
    }

    /// Cancel the active request immediately. Caller-initiated, so no error
    /// is raised and no further events fire for that request.
    pub fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            self.generation.fetch_add(1, Ordering::SeqCst);
            active.abort_handle.abort();
            tracing::debug!(request = %active.id, "streaming request cancelled");
        }
    }

    /// Cancel the active request and clear request-tracking state.
    pub fn reset(&mut self) {
        self.stop();
    }

    #[must_use]
    pub fn active_request(&self) -> Option<RequestId> {
        self.active.as_ref().map(|active| active.id)
    }

    /// Lightweight connectivity check against the same endpoint family as
    /// the streaming call: a non-streaming one-token completion.
    pub async fn test_connection(&self, settings: &AppSettings) -> Result<String, ChatError> {
        if !settings.has_api_key() {
            return Err(ChatError::MissingApiKey);
        }

        let body = json!({
            "model": settings.model_name,
            "stream": false,
            "max_tokens": 1,
            "messages": [{ "role": "user", "content": "ping" }],
        });
        let response = self
            .http
            .post(chat_completions_url(&settings.api_base))
            .bearer_auth(&settings.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(ChatError::Api { status, body });
        }
        Ok(settings.model_name.clone())
    }
}

/// Join the API base with the chat-completions suffix without duplicating it.
fn chat_completions_url(api_base: &str) -> String {
    let base = api_base.trim().trim_end_matches('/');
    if base.ends_with("/chat/completions") {
        base.to_string()
    } else {
        format!("{base}/chat/completions")
    }
}

fn request_body(model_name: &str, prompt: &str) -> serde_json::Value {
    json!({
        "model": model_name,
        "stream": true,
        "temperature": 0.7,
        "messages": [
            { "role": "system", "content": SYSTEM_PERSONA },
            { "role": "user", "content": prompt },
        ],
    })
}

/// Event sender bound to one request's generation.
///
/// Sends are dropped once the client's counter moves past the captured
/// generation, which is what guarantees stale-response suppression.
#[derive(Clone)]
struct EventSink {
    id: RequestId,
    generation: u64,
    counter: Arc<AtomicU64>,
    tx: mpsc::Sender<ChatEvent>,
}

impl EventSink {
    async fn send(&self, event: StreamEvent) -> bool {
        if self.counter.load(Ordering::SeqCst) != self.generation {
            return false;
        }
        self.tx
            .send(ChatEvent {
                request_id: self.id,
                event,
            })
            .await
            .is_ok()
    }
}

async fn run_stream(
    http: Client,
    endpoint: String,
    api_key: String,
    body: serde_json::Value,
    sink: EventSink,
) {
    let response = match http
        .post(&endpoint)
        .bearer_auth(&api_key)
        .json(&body)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(%err, "chat-completion request failed");
            sink.send(StreamEvent::Error(format!("调用模型接口失败: {err}")))
                .await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let message = match status.as_u16() {
            401 => AUTH_FAILED_ERROR.to_string(),
            402 => INSUFFICIENT_BALANCE_ERROR.to_string(),
            _ => {
                let body = read_capped_error_body(response).await;
                format!("模型接口错误 {status}: {body}")
            }
        };
        tracing::warn!(%status, "chat-completion endpoint returned an error");
        sink.send(StreamEvent::Error(message)).await;
        return;
    }

    let mut stream = response.bytes_stream();
    let mut lines = LineBuffer::new();
    let mut received_bytes = false;
    let mut emitted_first_delta = false;

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                tracing::warn!(%err, "reading streaming response failed");
                sink.send(StreamEvent::Error(format!("读取流式响应失败: {err}")))
                    .await;
                return;
            }
        };
        received_bytes = true;

        for line in lines.push(&chunk) {
            if emit_line(&line, &sink, &mut emitted_first_delta).await {
                return;
            }
        }
    }

    if let Some(line) = lines.take_remainder()
        && emit_line(&line, &sink, &mut emitted_first_delta).await
    {
        return;
    }

    if received_bytes {
        // Connection closed without an explicit [DONE]; treat the stream as
        // complete rather than discarding the accumulated text.
        sink.send(StreamEvent::Done).await;
    } else {
        sink.send(StreamEvent::Error(EMPTY_RESPONSE_ERROR.to_string()))
            .await;
    }
}

/// Interpret one line and forward its event. Returns `true` when the stream
/// reached its terminal event.
async fn emit_line(line: &str, sink: &EventSink, emitted_first_delta: &mut bool) -> bool {
    match parse_sse_line(line) {
        SseLine::Done => {
            sink.send(StreamEvent::Done).await;
            true
        }
        SseLine::Delta(delta) => {
            let delta = if *emitted_first_delta {
                delta
            } else {
                // Some models lead with whitespace; keep the reply flush.
                delta.trim_start_matches(['\n', '\r']).to_string()
            };
            if !delta.is_empty() {
                *emitted_first_delta = true;
                sink.send(StreamEvent::Delta(delta)).await;
            }
            false
        }
        SseLine::Skip => false,
    }
}

async fn read_capped_error_body(response: Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
