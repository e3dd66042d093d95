//! Session state machine and orchestration for ZenReply.
//!
//! # Architecture
//!
//! The engine owns one [`FlowController`]: the state machine that drives a
//! session from wake through input, generation, and confirmation to
//! termination. It orchestrates the streaming chat client and the excluded
//! collaborators (settings store, clipboard, window surface), which are all
//! injected at construction behind traits so the whole flow is testable
//! without a desktop runtime.
//!
//! ```text
//! hotkey capture ─▶ on_wake(text) ─▶ INPUT ─▶ start_generating()
//!                                              │
//!                       stream error ◀─────────┤ ChatClient::start
//!                       (back to INPUT)        ▼
//!                                          GENERATING ── deltas append ──▶ FINISHED
//!                                                                            │
//!                                         confirm_and_copy ─▶ clipboard ─▶ hide ─▶ reset
//! ```
//!
//! All state mutation happens on the task running the controller; the
//! [`FlowController::run`] loop selects over the wake channel, the stream
//! event channel, and the pending hide deadline.

mod collaborators;
mod flow;
mod prompt;
mod run;
mod session;
mod shortcuts;

pub use collaborators::{Clipboard, ReplyStreamer, WindowSurface};
pub use flow::{
    EMPTY_TEXT_ERROR, FlowController, HIDE_DELAY, MISSING_API_KEY_ERROR, SETTINGS_UNREADABLE_ERROR,
};
pub use prompt::{RoleTarget, build_prompt};
pub use session::Session;
pub use shortcuts::{Gates, ShortcutAction, dispatch};
