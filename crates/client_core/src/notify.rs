//! Transient user-facing notices and error classification.

use std::time::Duration;

use crate::error::ClientError;

pub const DEFAULT_NOTICE_DURATION: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeCategory {
    Auth,
    Transport,
    Validation,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeContext {
    Login,
    CourseSave,
    SubjectsSave,
    ChaptersSave,
    Upload,
    ChapterContent,
    Tests,
    Packages,
    Publish,
    General,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub category: Option<NoticeCategory>,
    pub context: NoticeContext,
    pub message: String,
    pub duration: Duration,
}

impl Notice {
    pub fn success(context: NoticeContext, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, None, context, message)
    }

    pub fn info(context: NoticeContext, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, None, context, message)
    }

    pub fn error(
        context: NoticeContext,
        category: NoticeCategory,
        message: impl Into<String>,
    ) -> Self {
        Self::new(NoticeLevel::Error, Some(category), context, message)
    }

    pub fn from_error(context: NoticeContext, err: &ClientError) -> Self {
        let category = classify(err);
        let message = match category {
            NoticeCategory::Auth => "Session expired or not authorized; sign in again.".to_string(),
            NoticeCategory::Transport => {
                "Server unreachable; check your connection and retry.".to_string()
            }
            NoticeCategory::Validation | NoticeCategory::Server => err.to_string(),
        };
        Self::error(context, category, message)
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == Some(NoticeCategory::Auth)
    }

    fn new(
        level: NoticeLevel,
        category: Option<NoticeCategory>,
        context: NoticeContext,
        message: impl Into<String>,
    ) -> Self {
        Self {
            level,
            category,
            context,
            message: message.into(),
            duration: DEFAULT_NOTICE_DURATION,
        }
    }
}

pub fn classify(err: &ClientError) -> NoticeCategory {
    if err.is_auth_failure() {
        return NoticeCategory::Auth;
    }
    match err {
        ClientError::Transport(_) => NoticeCategory::Transport,
        ClientError::Validation(_) => NoticeCategory::Validation,
        ClientError::Rejected { status, .. } if (400..500).contains(status) => {
            NoticeCategory::Validation
        }
        _ => NoticeCategory::Server,
    }
}
