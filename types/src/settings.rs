//! Persisted API settings.
//!
//! The raw file on disk may carry blank or missing fields; [`AppSettings`]
//! values that cross a read/write boundary are always normalized first
//! (trimmed, defaulted). The store in `zenreply-config` enforces this.

use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE: &str = "https://api.siliconflow.cn/v1";
pub const DEFAULT_MODEL_NAME: &str = "Pro/MiniMaxAI/MiniMax-M2.5";

/// API credentials and model selection for the chat-completion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: String,
    #[serde(default)]
    pub model_name: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
        }
    }
}

impl AppSettings {
    /// Trim every field and fall back to defaults for blank base/model.
    ///
    /// The API key has no default: a blank key normalizes to empty and is
    /// reported by [`AppSettings::has_api_key`].
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            api_key: self.api_key.trim().to_string(),
            api_base: normalize_value(&self.api_base, DEFAULT_API_BASE),
            model_name: normalize_value(&self.model_name, DEFAULT_MODEL_NAME),
        }
    }

    #[must_use]
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

fn normalize_value(value: &str, fallback: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
