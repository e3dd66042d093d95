//! Core domain types for ZenReply.
//!
//! This crate holds the vocabulary shared by every other crate: the session
//! stage, the communication-target role selection, the persisted settings
//! value type, streaming events, and transient notices. It is deliberately
//! free of I/O and async so the state machine in `zenreply-engine` and the
//! HTTP client in `zenreply-client` can both depend on it without cycles.

mod notice;
mod role;
mod settings;
mod stream;

pub use notice::{Notice, NoticeVariant};
pub use role::{
    CUSTOM_ROLE_HOTKEY, PresetRole, ROLE_OPTIONS, RoleOption, RoleSelection,
};
pub use settings::{AppSettings, DEFAULT_API_BASE, DEFAULT_MODEL_NAME};
pub use stream::{ChatEvent, RequestId, StreamEvent, WakeEvent};

/// Coarse-grained phase of a session.
///
/// Invariants (enforced by the flow controller):
/// - `Generating` implies exactly one active streaming request.
/// - `Finished` implies the accumulated text is non-empty and the request
///   completed without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Generating,
    Finished,
}

impl Default for Stage {
    fn default() -> Self {
        Self::Input
    }
}
