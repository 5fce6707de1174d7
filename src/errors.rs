use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("no confirmed sleep window for {0}")]
    MissingSleepWindow(NaiveDate),
    #[error("workbook already holds {last}, refusing to append earlier date {date}")]
    OutOfOrder { last: NaiveDate, date: NaiveDate },
    #[error("input closed before an answer was given")]
    InputClosed,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{url} returned {status}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
    },
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("token store: {0}")]
    Token(String),
    #[error("workbook error: {0}")]
    Workbook(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl AppError {
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse(message.into())
    }

    pub fn workbook(err: impl std::fmt::Display) -> Self {
        Self::Workbook(err.to_string())
    }

    /// Errors that a fresh credential login can recover from when they occur
    /// while resuming a stored session.
    pub fn is_session_recoverable(&self) -> bool {
        match self {
            Self::Auth(_) | Self::Token(_) | Self::Serde(_) => true,
            Self::Io(err) => err.kind() == std::io::ErrorKind::NotFound,
            Self::Http(err) => err.is_status(),
            Self::Status { .. } => true,
            _ => false,
        }
    }
}

/// Rejection reasons for a single interactive answer.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("please enter a valid {0}")]
    Parse(&'static str),
    #[error("value must be between {min} and {max}")]
    OutOfRange { min: String, max: String },
    #[error("please enter y or n")]
    YesNo,
}

pub type Result<T> = std::result::Result<T, AppError>;
