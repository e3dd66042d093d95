//! Session state: one wake-to-terminate lifecycle of user interaction.

use zenreply_types::{PresetRole, RoleSelection, Stage};

/// The single live session owned by the flow controller.
///
/// Mutation goes through the controller's named transitions; the fields here
/// are only directly writable inside the engine crate.
#[derive(Debug)]
pub struct Session {
    pub(crate) stage: Stage,
    pub(crate) raw_text: String,
    pub(crate) context_text: String,
    pub(crate) target_role: RoleSelection,
    /// Last confirmed custom label. Survives edit-cancel and wake, so a
    /// later edit is seeded with it.
    pub(crate) custom_role_name: String,
    /// Transient edit buffer; meaningful only while editing.
    pub(crate) custom_role_draft: String,
    pub(crate) is_custom_role_editing: bool,
    /// Preset to revert to when custom editing is cancelled before any
    /// label was ever confirmed.
    pub(crate) previous_preset: PresetRole,
    /// Monotonically growing accumulation of deltas for the current
    /// generation; cleared at the start of each one.
    pub(crate) streamed_text: String,
    pub(crate) is_streaming: bool,
    pub(crate) blocking_error: Option<String>,
    /// Incremented on every wake; in-flight callbacks from an older session
    /// carry a stale request id and are discarded.
    pub(crate) epoch: u64,
    /// Bumped on wake so the presentation layer can remount/animate.
    pub(crate) panel_animate_key: u64,
    pub(crate) is_awake: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            stage: Stage::Input,
            raw_text: String::new(),
            context_text: String::new(),
            target_role: RoleSelection::default(),
            custom_role_name: String::new(),
            custom_role_draft: String::new(),
            is_custom_role_editing: false,
            previous_preset: PresetRole::Boss,
            streamed_text: String::new(),
            is_streaming: false,
            blocking_error: None,
            epoch: 0,
            panel_animate_key: 0,
            is_awake: false,
        }
    }
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a new session from a wake event. Role selection and the
    /// confirmed custom label survive; everything transient is cleared.
    pub(crate) fn begin(&mut self, text: &str) {
        self.stage = Stage::Input;
        self.raw_text = text.trim().to_string();
        self.context_text.clear();
        self.custom_role_draft.clear();
        self.is_custom_role_editing = false;
        self.streamed_text.clear();
        self.is_streaming = false;
        self.blocking_error = None;
        self.epoch += 1;
        self.panel_animate_key += 1;
        self.is_awake = true;
    }

    /// Full reset to the initial INPUT state. The epoch keeps counting so
    /// stale callbacks from before the reset can never match a new session.
    pub(crate) fn reset(&mut self) {
        let epoch = self.epoch;
        let panel_animate_key = self.panel_animate_key;
        *self = Self {
            epoch,
            panel_animate_key,
            ..Self::default()
        };
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    #[must_use]
    pub fn context_text(&self) -> &str {
        &self.context_text
    }

    #[must_use]
    pub fn target_role(&self) -> RoleSelection {
        self.target_role
    }

    #[must_use]
    pub fn custom_role_name(&self) -> &str {
        &self.custom_role_name
    }

    #[must_use]
    pub fn custom_role_draft(&self) -> &str {
        &self.custom_role_draft
    }

    #[must_use]
    pub fn is_custom_role_editing(&self) -> bool {
        self.is_custom_role_editing
    }

    #[must_use]
    pub fn streamed_text(&self) -> &str {
        &self.streamed_text
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.is_streaming
    }

    #[must_use]
    pub fn blocking_error(&self) -> Option<&str> {
        self.blocking_error.as_deref()
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn panel_animate_key(&self) -> u64 {
        self.panel_animate_key
    }

    #[must_use]
    pub fn is_awake(&self) -> bool {
        self.is_awake
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use zenreply_types::{PresetRole, RoleSelection, Stage};

    #[test]
    fn begin_trims_text_and_preserves_role() {
        let mut session = Session::new();
        session.target_role = RoleSelection::Preset(PresetRole::Client);
        session.custom_role_name = "房东".to_string();
        session.streamed_text = "leftover".to_string();
        session.blocking_error = Some("old".to_string());

        session.begin("  明天能开会吗  ");

        assert_eq!(session.raw_text(), "明天能开会吗");
        assert_eq!(session.stage(), Stage::Input);
        assert_eq!(session.target_role(), RoleSelection::Preset(PresetRole::Client));
        assert_eq!(session.custom_role_name(), "房东");
        assert!(session.streamed_text().is_empty());
        assert!(session.blocking_error().is_none());
        assert_eq!(session.epoch(), 1);
        assert!(session.is_awake());
    }

    #[test]
    fn reset_restores_initial_state_but_keeps_epoch_monotonic() {
        let mut session = Session::new();
        session.begin("a");
        session.begin("b");
        session.custom_role_name = "房东".to_string();

        session.reset();

        assert_eq!(session.stage(), Stage::Input);
        assert!(session.raw_text().is_empty());
        assert!(session.custom_role_name().is_empty());
        assert_eq!(session.target_role(), RoleSelection::default());
        assert!(!session.is_awake());
        assert_eq!(session.epoch(), 2);
    }
}
