use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};
use ts_rs::TS;

use crate::AppError;

pub const NOTICE_VERSION_CREATED: &str = "VERSIONS/CREATED";
pub const NOTICE_VERSION_UPDATED: &str = "VERSIONS/UPDATED";
pub const NOTICE_VERSION_DELETED: &str = "VERSIONS/DELETED";
pub const NOTICE_VERSION_ACTIVATED: &str = "VERSIONS/ACTIVATED";
pub const NOTICE_REQUESTED_VERSION_MISSING: &str = "VERSIONS/REQUESTED_NOT_FOUND";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// User-facing message. The UI looks `code` up for its localized text and
/// falls back to `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct Notice {
    pub level: NoticeLevel,
    pub code: String,
    pub message: String,
}

impl Notice {
    pub fn success(code: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            code: code.to_string(),
            message: message.into(),
        }
    }

    pub fn from_error(err: &AppError) -> Self {
        Self {
            level: NoticeLevel::Error,
            code: err.code().to_string(),
            message: err.message().to_string(),
        }
    }
}

/// Presentation side of the version manager: toasts and confirmations.
#[async_trait]
pub trait UserFeedback: Send + Sync {
    fn notify(&self, notice: Notice);

    /// Asked before switching away from unsaved edits. `false` aborts.
    async fn confirm_discard_changes(&self) -> bool;
}

/// Headless feedback: notices go to the log, confirmations get a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct TracingFeedback {
    discard_unsaved: bool,
}

impl TracingFeedback {
    pub fn new(discard_unsaved: bool) -> Self {
        Self { discard_unsaved }
    }
}

impl Default for TracingFeedback {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl UserFeedback for TracingFeedback {
    fn notify(&self, notice: Notice) {
        match notice.level {
            NoticeLevel::Success => info!(
                target: "grimorium",
                event = "version_notice",
                code = %notice.code,
                message = %notice.message
            ),
            NoticeLevel::Warning => warn!(
                target: "grimorium",
                event = "version_notice",
                code = %notice.code,
                message = %notice.message
            ),
            NoticeLevel::Error => error!(
                target: "grimorium",
                event = "version_notice",
                code = %notice.code,
                message = %notice.message
            ),
        }
    }

    async fn confirm_discard_changes(&self) -> bool {
        self.discard_unsaved
    }
}
