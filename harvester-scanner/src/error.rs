use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP client setup failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Stable error-kind tags surfaced in outcomes, results and messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    NavigationTimeout,
    NavigationFailure,
    NoCandidatesDiscovered,
    TransferTimeout,
    TransferClientError,
    TransferTransientError,
    ConfigurationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NavigationTimeout => "NavigationTimeout",
            ErrorKind::NavigationFailure => "NavigationFailure",
            ErrorKind::NoCandidatesDiscovered => "NoCandidatesDiscovered",
            ErrorKind::TransferTimeout => "TransferTimeout",
            ErrorKind::TransferClientError => "TransferClientError",
            ErrorKind::TransferTransientError => "TransferTransientError",
            ErrorKind::ConfigurationError => "ConfigurationError",
        }
    }

    /// Whether the transfer manager may try again after this kind.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TransferTimeout | ErrorKind::TransferTransientError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures raised by a navigation engine invocation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine could not be reached or the session could not be
    /// established. Worth another attempt.
    #[error("engine start-up failed: {0}")]
    Startup(String),

    /// The session ran and reported failure.
    #[error("navigation session failed: {0}")]
    Session(String),
}

impl EngineError {
    pub fn is_transient(&self) -> bool {
        matches!(self, EngineError::Startup(_))
    }
}

/// Failures raised by an object store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("access denied for {key}: {message}")]
    Denied { key: String, message: String },

    #[error("store throttled request for {key}: {message}")]
    Throttled { key: String, message: String },

    #[error("store request for {key} failed: {message}")]
    Unavailable { key: String, message: String },
}

const DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccountProblem",
    "AllAccessDisabled",
    "ExpiredToken",
    "InvalidAccessKeyId",
    "InvalidToken",
    "NoSuchBucket",
    "SignatureDoesNotMatch",
];
const THROTTLED_CODES: &[&str] = &[
    "RequestLimitExceeded",
    "ServiceUnavailable",
    "SlowDown",
    "Throttling",
    "ThrottlingException",
];
const UNAVAILABLE_CODES: &[&str] = &["InternalError", "OperationAborted", "RequestTimeout"];

impl StoreError {
    /// Classify from the service error code and HTTP status when the backend
    /// returned them, falling back to the message text.
    pub fn from_response(key: &str, code: Option<&str>, status: Option<u16>, message: String) -> Self {
        let key_owned = key.to_string();
        if let Some(code) = code {
            if DENIED_CODES.contains(&code) {
                return StoreError::Denied { key: key_owned, message };
            }
            if THROTTLED_CODES.contains(&code) {
                return StoreError::Throttled { key: key_owned, message };
            }
            if UNAVAILABLE_CODES.contains(&code) {
                return StoreError::Unavailable { key: key_owned, message };
            }
        }
        match status {
            Some(429 | 503) => StoreError::Throttled { key: key_owned, message },
            Some(408) => StoreError::Unavailable { key: key_owned, message },
            Some(400..=499) => StoreError::Denied { key: key_owned, message },
            Some(500..=599) => StoreError::Unavailable { key: key_owned, message },
            _ => StoreError::classify(key, message),
        }
    }

    /// Classify a raw backend message by the error names S3 reports. Used
    /// when no code or status is available, e.g. for dispatch failures.
    pub fn classify(key: &str, message: String) -> Self {
        let lower = message.to_ascii_lowercase();
        let key = key.to_string();
        if lower.contains("credential")
            || lower.contains("accessdenied")
            || lower.contains("access denied")
            || lower.contains("signaturedoesnotmatch")
            || lower.contains("unauthorized")
            || lower.contains("forbidden")
            || lower.contains("nosuchbucket")
        {
            StoreError::Denied { key, message }
        } else if lower.contains("slowdown")
            || lower.contains("slow down")
            || lower.contains("throttl")
            || lower.contains("too many requests")
        {
            StoreError::Throttled { key, message }
        } else {
            StoreError::Unavailable { key, message }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Denied { .. } => ErrorKind::TransferClientError,
            StoreError::Throttled { .. } | StoreError::Unavailable { .. } => {
                ErrorKind::TransferTransientError
            }
        }
    }
}
