//! Streaming events and per-request identity.

use std::fmt;

/// Opaque identity token for one streaming request.
///
/// Every event from the chat client carries the id of the request that
/// produced it; the flow controller discards events whose id no longer
/// matches the active request (stale-response suppression).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    #[must_use]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One normalized event from a streaming chat-completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text content from the model.
    Delta(String),
    /// Stream completed successfully.
    Done,
    /// Stream terminated with a user-facing error message.
    Error(String),
}

impl StreamEvent {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error(_))
    }
}

/// A stream event tagged with the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    pub request_id: RequestId,
    pub event: StreamEvent,
}

/// Inbound "clipboard captured" notification from the hotkey collaborator.
///
/// Always begins a new session, discarding any in-flight one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeEvent {
    pub text: String,
}
