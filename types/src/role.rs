//! Communication-target role selection.

/// A fixed, enumerated communication-target persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresetRole {
    Boss,
    Client,
    GreenTea,
    PigTeammate,
}

impl PresetRole {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Boss => "老板",
            Self::Client => "甲方",
            Self::GreenTea => "绿茶",
            Self::PigTeammate => "猪队友",
        }
    }

    /// Resolve a digit hotkey (1..=3) to its preset role.
    ///
    /// Digit 4 is reserved for custom-role editing, see
    /// [`CUSTOM_ROLE_HOTKEY`]. `PigTeammate` has no hotkey and is only
    /// selectable through the presentation layer.
    #[must_use]
    pub fn from_hotkey(digit: u8) -> Option<Self> {
        ROLE_OPTIONS
            .iter()
            .find(|option| option.hotkey == digit)
            .map(|option| option.role)
    }
}

/// Which communication target is active. Exactly one variant at a time.
///
/// The confirmed custom label is stored on the session, not here, so that
/// cancelling an unconfirmed edit can revert to the previously active preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSelection {
    Preset(PresetRole),
    Custom,
}

impl Default for RoleSelection {
    fn default() -> Self {
        Self::Preset(PresetRole::Boss)
    }
}

/// One selectable role with its digit hotkey and UI copy.
#[derive(Debug, Clone, Copy)]
pub struct RoleOption {
    pub hotkey: u8,
    pub role: PresetRole,
    pub label: &'static str,
    pub vibe: &'static str,
}

pub const ROLE_OPTIONS: [RoleOption; 3] = [
    RoleOption {
        hotkey: 1,
        role: PresetRole::Boss,
        label: "老板",
        vibe: "稳重负责，给结论和时间点",
    },
    RoleOption {
        hotkey: 2,
        role: PresetRole::Client,
        label: "甲方",
        vibe: "尊重对方，强调协同与结果",
    },
    RoleOption {
        hotkey: 3,
        role: PresetRole::GreenTea,
        label: "绿茶",
        vibe: "边界清晰，温柔但不暧昧",
    },
];

/// Digit that begins custom-role editing instead of selecting a preset.
pub const CUSTOM_ROLE_HOTKEY: u8 = 4;

#[cfg(test)]
mod tests {
    use super::{CUSTOM_ROLE_HOTKEY, PresetRole, RoleSelection};

    #[test]
    fn hotkeys_resolve_in_declaration_order() {
        assert_eq!(PresetRole::from_hotkey(1), Some(PresetRole::Boss));
        assert_eq!(PresetRole::from_hotkey(2), Some(PresetRole::Client));
        assert_eq!(PresetRole::from_hotkey(3), Some(PresetRole::GreenTea));
    }

    #[test]
    fn custom_hotkey_is_not_a_preset() {
        assert_eq!(PresetRole::from_hotkey(CUSTOM_ROLE_HOTKEY), None);
        assert_eq!(PresetRole::from_hotkey(0), None);
        assert_eq!(PresetRole::from_hotkey(9), None);
    }

    #[test]
    fn default_selection_is_boss() {
        assert_eq!(
            RoleSelection::default(),
            RoleSelection::Preset(PresetRole::Boss)
        );
    }
}
