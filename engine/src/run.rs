//! The controller event loop.

use std::future::pending;

use tokio::sync::mpsc;
use tokio::time::sleep_until;

use zenreply_config::SettingsStore;
use zenreply_types::{ChatEvent, WakeEvent};

use crate::collaborators::{Clipboard, ReplyStreamer, WindowSurface};
use crate::flow::FlowController;

impl<R, C, W, S> FlowController<R, C, W, S>
where
    R: ReplyStreamer,
    C: Clipboard,
    W: WindowSurface,
    S: SettingsStore,
{
    /// Drive the controller until the wake channel closes, then hand the
    /// controller back for inspection or teardown.
    ///
    /// Selects over wake events, stream events, and the pending hide
    /// deadline. All state mutation stays on this task; the streaming client
    /// only ever communicates back through the event channel.
    pub async fn run(
        mut self,
        mut wake_rx: mpsc::Receiver<WakeEvent>,
        mut chat_rx: mpsc::Receiver<ChatEvent>,
    ) -> Self {
        loop {
            let deadline = self.hide_deadline;
            let hide = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => pending().await,
                }
            };

            tokio::select! {
                wake = wake_rx.recv() => {
                    let Some(event) = wake else { break };
                    self.show_and_focus_window().await;
                    self.on_wake(&event.text);
                }
                chat = chat_rx.recv() => {
                    let Some(event) = chat else { break };
                    self.apply_chat_event(event);
                }
                () = hide => {
                    self.terminate_session().await;
                }
            }
        }

        self.stop_stream();
        tracing::debug!("controller loop stopped");
        self
    }
}
