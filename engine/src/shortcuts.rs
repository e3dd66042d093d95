//! Keyboard shortcut dispatch: pure mapping from a key event plus the
//! current gating state to an action, with no side effects.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use zenreply_types::{CUSTOM_ROLE_HOTKEY, PresetRole, Stage};

/// What a recognized shortcut asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    ToggleSettings,
    SaveSettings,
    TerminateSession,
    CloseSettings,
    SelectRole(PresetRole),
    StartCustomRoleEditing,
    StartGenerating,
    ConfirmAndCopy,
}

/// Snapshot of the controller state that gates shortcut dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gates {
    pub stage: Stage,
    pub settings_open: bool,
    pub settings_busy: bool,
    pub blocking_error: bool,
    /// Whether keyboard focus is inside a free-text field. Plain characters
    /// must reach the field; only Esc and chorded shortcuts bypass it.
    pub in_text_field: bool,
}

/// Map one key event to an action under the given gates.
///
/// Returns `None` for keys that should fall through to normal text input.
#[must_use]
pub fn dispatch(key: &KeyEvent, gates: &Gates) -> Option<ShortcutAction> {
    let chord = key
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::SUPER);

    // Chorded shortcuts and Esc work everywhere, including text fields.
    if chord && key.code == KeyCode::Char(',') {
        return Some(ShortcutAction::ToggleSettings);
    }
    if chord && key.code == KeyCode::Char('s') {
        if gates.settings_open && !gates.settings_busy {
            return Some(ShortcutAction::SaveSettings);
        }
        return None;
    }
    if key.code == KeyCode::Esc {
        if gates.settings_open {
            return Some(ShortcutAction::CloseSettings);
        }
        return Some(ShortcutAction::TerminateSession);
    }

    if gates.settings_open {
        return None;
    }

    match key.code {
        // Enter submits; Shift+Enter stays a newline in the text field.
        KeyCode::Enter if !key.modifiers.contains(KeyModifiers::SHIFT) => match gates.stage {
            Stage::Input if !gates.in_text_field && !gates.blocking_error => {
                Some(ShortcutAction::StartGenerating)
            }
            Stage::Finished if !gates.in_text_field => Some(ShortcutAction::ConfirmAndCopy),
            _ => None,
        },
        // Role changes stay available under a blocking error so the user can
        // pick a different target before retrying.
        KeyCode::Char(ch)
            if !gates.in_text_field && gates.stage == Stage::Input && ch.is_ascii_digit() =>
        {
            let digit = ch as u8 - b'0';
            if digit == CUSTOM_ROLE_HOTKEY {
                return Some(ShortcutAction::StartCustomRoleEditing);
            }
            PresetRole::from_hotkey(digit).map(ShortcutAction::SelectRole)
        }
        _ => None,
    }
}
