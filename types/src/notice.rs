//! Transient user-facing notices.
//!
//! Notices auto-dismiss in the presentation layer; blocking errors live on
//! the session instead and must be explicitly cleared or superseded.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeVariant {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub variant: NoticeVariant,
}

impl Notice {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            variant: NoticeVariant::Success,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            variant: NoticeVariant::Error,
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            variant: NoticeVariant::Info,
        }
    }
}
