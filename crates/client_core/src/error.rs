use shared::error::{ApiError, ApiException, ErrorCode};
use thiserror::Error;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("server rejected request ({status}): {source}")]
    Rejected {
        status: u16,
        #[source]
        source: ApiException,
    },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("not signed in")]
    NotSignedIn,
    #[error("invalid: {0}")]
    Validation(String),
    #[error("session storage failure: {0}")]
    Storage(#[source] anyhow::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ClientError {
    pub fn rejected(status: u16, body: ApiError) -> Self {
        Self::Rejected {
            status,
            source: body.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::NotSignedIn => true,
            Self::Rejected { source, .. } => matches!(
                source.code,
                ErrorCode::Unauthorized | ErrorCode::Forbidden
            ),
            _ => false,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value)
        }
    }
}
