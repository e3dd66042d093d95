//! Seams for the excluded collaborators.
//!
//! The flow controller talks to its environment exclusively through these
//! traits; the desktop shell provides real implementations and tests provide
//! fakes.

use tokio::sync::mpsc;

use zenreply_client::ChatClient;
use zenreply_types::{AppSettings, ChatEvent, RequestId};

/// Driver for one streaming chat-completion request at a time.
pub trait ReplyStreamer {
    /// Begin a new request, cancelling any previous one. Events are tagged
    /// with the returned id.
    fn start(
        &mut self,
        prompt: String,
        settings: &AppSettings,
        tx: mpsc::Sender<ChatEvent>,
    ) -> RequestId;

    /// Cancel the active request; no further events fire for it.
    fn stop(&mut self);
}

impl ReplyStreamer for ChatClient {
    fn start(
        &mut self,
        prompt: String,
        settings: &AppSettings,
        tx: mpsc::Sender<ChatEvent>,
    ) -> RequestId {
        ChatClient::start(self, prompt, settings, tx)
    }

    fn stop(&mut self) {
        ChatClient::stop(self);
    }
}

/// Async clipboard write; rejects on failure.
pub trait Clipboard {
    fn copy_to_clipboard(&mut self, text: &str) -> impl Future<Output = anyhow::Result<()>>;
}

/// Opaque window surface owned by the desktop shell.
///
/// `hide` must reject if the hide truly failed, not merely no-op: the flow
/// controller aborts session termination on a failed hide so the user is
/// never silently stuck with a live session behind an invisible window.
pub trait WindowSurface {
    fn show(&mut self) -> impl Future<Output = anyhow::Result<()>>;
    fn hide(&mut self) -> impl Future<Output = anyhow::Result<()>>;
    fn focus(&mut self) -> impl Future<Output = anyhow::Result<()>>;
    fn resize(&mut self, width: u32, height: u32) -> impl Future<Output = anyhow::Result<()>>;
}
