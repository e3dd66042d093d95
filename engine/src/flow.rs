//! The session flow controller.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use zenreply_client::EMPTY_RESPONSE_ERROR;
use zenreply_config::SettingsStore;
use zenreply_types::{
    ChatEvent, Notice, PresetRole, RequestId, RoleSelection, Stage, StreamEvent,
};

use crate::collaborators::{Clipboard, ReplyStreamer, WindowSurface};
use crate::prompt::{RoleTarget, build_prompt};
use crate::session::Session;
use crate::shortcuts::Gates;

pub const EMPTY_TEXT_ERROR: &str = "原始文本不能为空";
pub const MISSING_API_KEY_ERROR: &str = "请先设置 API Key";
pub const SETTINGS_UNREADABLE_ERROR: &str = "无法读取设置，请稍后重试。";

/// Delay between a successful copy and session termination, long enough for
/// the user to see the confirmation notice.
pub const HIDE_DELAY: Duration = Duration::from_millis(800);

pub(crate) const STREAM_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Owns the session state machine and orchestrates the streaming client and
/// the injected collaborators.
///
/// Every state mutation happens through a named transition on this type;
/// there is no reactive dependency graph. Stream events are applied only
/// when their request id matches the active request, so callbacks from a
/// superseded or cancelled request can never touch the session.
#[derive(Debug)]
pub struct FlowController<R, C, W, S> {
    session: Session,
    streamer: R,
    clipboard: C,
    window: W,
    store: S,
    chat_tx: mpsc::Sender<ChatEvent>,
    active_request: Option<RequestId>,
    notices: VecDeque<Notice>,
    settings_open: bool,
    settings_busy: bool,
    pub(crate) hide_deadline: Option<Instant>,
}

impl<R, C, W, S> FlowController<R, C, W, S>
where
    R: ReplyStreamer,
    C: Clipboard,
    W: WindowSurface,
    S: SettingsStore,
{
    /// Build a controller and the receiving half of its stream-event
    /// channel. The caller (the run loop, or a test) pumps received events
    /// back in through [`FlowController::apply_chat_event`].
    pub fn new(streamer: R, clipboard: C, window: W, store: S) -> (Self, mpsc::Receiver<ChatEvent>) {
        let (chat_tx, chat_rx) = mpsc::channel(STREAM_EVENT_CHANNEL_CAPACITY);
        let controller = Self {
            session: Session::new(),
            streamer,
            clipboard,
            window,
            store,
            chat_tx,
            active_request: None,
            notices: VecDeque::new(),
            settings_open: false,
            settings_busy: false,
            hide_deadline: None,
        };
        (controller, chat_rx)
    }

    // ── Derived state for the presentation layer ──

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.session.stage
    }

    #[must_use]
    pub fn settings_open(&self) -> bool {
        self.settings_open
    }

    #[must_use]
    pub fn settings_busy(&self) -> bool {
        self.settings_busy
    }

    #[must_use]
    pub fn hide_scheduled(&self) -> bool {
        self.hide_deadline.is_some()
    }

    #[must_use]
    pub fn gates(&self, in_text_field: bool) -> Gates {
        Gates {
            stage: self.session.stage,
            settings_open: self.settings_open,
            settings_busy: self.settings_busy,
            blocking_error: self.session.blocking_error.is_some(),
            in_text_field,
        }
    }

    /// Drain queued transient notices in arrival order.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    // ── Input-stage edits ──

    /// `raw_text` is mutable only while the session is in INPUT.
    pub fn set_raw_text(&mut self, text: impl Into<String>) {
        if self.session.stage == Stage::Input {
            self.session.raw_text = text.into();
        }
    }

    pub fn set_context_text(&mut self, text: impl Into<String>) {
        if self.session.stage == Stage::Input {
            self.session.context_text = text.into();
        }
    }

    /// The draft buffer exists only while custom-role editing is active.
    pub fn set_custom_role_draft(&mut self, draft: impl Into<String>) {
        if self.session.is_custom_role_editing {
            self.session.custom_role_draft = draft.into();
        }
    }

    pub fn clear_error(&mut self) {
        self.session.blocking_error = None;
    }

    // ── Settings surface flags (owned here for shortcut gating) ──

    pub fn open_settings(&mut self) {
        self.settings_open = true;
    }

    pub fn close_settings(&mut self) {
        self.settings_open = false;
    }

    pub fn toggle_settings(&mut self) {
        self.settings_open = !self.settings_open;
    }

    pub fn set_settings_busy(&mut self, busy: bool) {
        self.settings_busy = busy;
    }

    // ── Session lifecycle ──

    /// A new wake always wins: any in-flight generation is cancelled and its
    /// late callbacks are invalidated before the new session begins.
    pub fn on_wake(&mut self, text: &str) {
        self.hide_deadline = None;
        self.stop_stream();
        self.session.begin(text);
        tracing::info!(epoch = self.session.epoch, "session woken");
    }

    /// Late async delivery from the capture collaborator. Only refreshes the
    /// source text while the user is still on the input stage.
    pub fn on_captured_text(&mut self, text: &str) {
        let trimmed = text.trim();
        if self.session.stage == Stage::Input && !trimmed.is_empty() {
            self.session.raw_text = trimmed.to_string();
        }
    }

    /// Validate, re-read settings, and start a streaming generation.
    ///
    /// Valid from INPUT and re-triggerable from FINISHED (regenerate). Any
    /// prior request is superseded before the new one starts.
    pub async fn start_generating(&mut self, custom_role_override: Option<&str>) {
        if self.session.raw_text.trim().is_empty() {
            self.session.stage = Stage::Input;
            self.show_blocking_error(EMPTY_TEXT_ERROR);
            return;
        }

        let custom_role = custom_role_override
            .unwrap_or(&self.session.custom_role_name)
            .trim()
            .to_string();
        if self.session.target_role == RoleSelection::Custom && custom_role.is_empty() {
            self.notify(Notice::info("请先输入自定义对象身份"));
            return;
        }

        // Always re-read settings so edits made while the session is open
        // take effect on this attempt.
        let settings = match self.store.read().await {
            Ok(settings) => settings,
            Err(err) => {
                tracing::warn!(%err, "failed to read settings before generation");
                self.session.stage = Stage::Input;
                self.show_blocking_error(SETTINGS_UNREADABLE_ERROR);
                return;
            }
        };
        if !settings.has_api_key() {
            self.session.stage = Stage::Input;
            self.settings_open = true;
            self.show_blocking_error(MISSING_API_KEY_ERROR);
            return;
        }

        let target = match self.session.target_role {
            RoleSelection::Preset(role) => RoleTarget::Preset(role),
            RoleSelection::Custom => RoleTarget::Custom(custom_role),
        };
        let prompt = build_prompt(
            &self.session.raw_text,
            &target,
            Some(&self.session.context_text),
        );

        self.clear_error();
        self.settings_open = false;
        self.session.streamed_text.clear();
        self.session.stage = Stage::Generating;
        self.session.is_streaming = true;

        let id = self.streamer.start(prompt, &settings, self.chat_tx.clone());
        self.active_request = Some(id);
        tracing::info!(request = %id, epoch = self.session.epoch, "generation started");
    }

    /// Apply one event from the streaming client. Events whose request id
    /// does not match the active request are discarded.
    pub fn apply_chat_event(&mut self, event: ChatEvent) {
        let Some(active) = self.active_request else {
            tracing::debug!(request = %event.request_id, "dropping event without active request");
            return;
        };
        if event.request_id != active {
            tracing::debug!(request = %event.request_id, active = %active, "dropping stale event");
            return;
        }

        match event.event {
            StreamEvent::Delta(delta) => {
                self.session.streamed_text.push_str(&delta);
            }
            StreamEvent::Done => {
                self.active_request = None;
                self.session.is_streaming = false;
                if self.session.streamed_text.trim().is_empty() {
                    // FINISHED requires non-empty output; an empty completion
                    // is reported like any other generation failure.
                    self.session.stage = Stage::Input;
                    self.show_blocking_error(EMPTY_RESPONSE_ERROR);
                } else {
                    self.session.stage = Stage::Finished;
                    tracing::info!(epoch = self.session.epoch, "generation finished");
                }
            }
            StreamEvent::Error(message) => {
                self.active_request = None;
                self.session.is_streaming = false;
                // Generation failures are always recoverable from INPUT.
                self.session.stage = Stage::Input;
                let message = if message.trim().is_empty() {
                    "生成失败，请重试".to_string()
                } else {
                    message
                };
                self.show_blocking_error(&message);
            }
        }
    }

    /// Copy the finished reply to the clipboard and schedule termination.
    ///
    /// Clipboard failure never changes stage: the generated content is not
    /// lost and the user stays in control.
    pub async fn confirm_and_copy(&mut self) {
        if self.session.stage != Stage::Finished {
            return;
        }
        let output = self.session.streamed_text.trim().to_string();
        if output.is_empty() {
            return;
        }

        match self.clipboard.copy_to_clipboard(&output).await {
            Ok(()) => {
                self.notify(Notice::success("已复制到剪贴板"));
                self.hide_deadline = Some(Instant::now() + HIDE_DELAY);
            }
            Err(err) => {
                tracing::warn!(%err, "clipboard write failed");
                self.notify(Notice::error("复制失败，请重试"));
            }
        }
    }

    /// Cancel any stream, hide the window, and reset to the initial state.
    ///
    /// A failed hide aborts termination with the session state preserved so
    /// the user is not silently stuck.
    pub async fn terminate_session(&mut self) {
        self.hide_deadline = None;
        self.stop_stream();

        if let Err(err) = self.window.hide().await {
            tracing::warn!(%err, "window hide failed, keeping session alive");
            self.notify(Notice::error("窗口关闭失败，请重试"));
            return;
        }

        self.session.reset();
        self.settings_open = false;
        self.settings_busy = false;
        tracing::info!("session terminated");
    }

    // ── Role selection ──

    pub fn select_preset_role(&mut self, role: PresetRole) {
        self.session.previous_preset = role;
        self.session.target_role = RoleSelection::Preset(role);
        self.session.is_custom_role_editing = false;
    }

    pub fn select_role_by_hotkey(&mut self, digit: u8) {
        if let Some(role) = PresetRole::from_hotkey(digit) {
            self.select_preset_role(role);
        }
    }

    /// Switch into custom mode, remembering the active preset so an
    /// unconfirmed edit can be cancelled back to it.
    pub fn start_custom_role_editing(&mut self) {
        if let RoleSelection::Preset(role) = self.session.target_role {
            self.session.previous_preset = role;
        }
        self.session.target_role = RoleSelection::Custom;
        self.session.custom_role_draft = self.session.custom_role_name.clone();
        self.session.is_custom_role_editing = true;
        self.session.stage = Stage::Input;
    }

    pub fn cancel_custom_role_editing(&mut self) {
        self.session.is_custom_role_editing = false;
        self.session.custom_role_draft.clear();
        if self.session.custom_role_name.is_empty() {
            self.session.target_role = RoleSelection::Preset(self.session.previous_preset);
        }
    }

    /// Commit the drafted label and immediately start generating with it.
    pub async fn confirm_custom_role(&mut self) {
        let confirmed = self.session.custom_role_draft.trim().to_string();
        if confirmed.is_empty() {
            self.notify(Notice::info("请输入自定义对象身份"));
            return;
        }

        self.session.custom_role_name = confirmed.clone();
        self.session.target_role = RoleSelection::Custom;
        self.session.is_custom_role_editing = false;
        self.session.custom_role_draft = confirmed.clone();
        self.start_generating(Some(&confirmed)).await;
    }

    // ── Internals ──

    /// Bring the window forward on wake. Failures are logged, not fatal:
    /// the session still begins so a retried wake can recover.
    pub(crate) async fn show_and_focus_window(&mut self) {
        if let Err(err) = self.window.show().await {
            tracing::warn!(%err, "window show failed");
        }
        if let Err(err) = self.window.focus().await {
            tracing::warn!(%err, "window focus failed");
        }
    }

    pub(crate) fn stop_stream(&mut self) {
        self.streamer.stop();
        self.active_request = None;
        self.session.is_streaming = false;
    }

    fn show_blocking_error(&mut self, message: &str) {
        self.session.blocking_error = Some(message.to_string());
        self.notify(Notice::error(message));
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push_back(notice);
    }
}
