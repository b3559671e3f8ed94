use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Timeout,
    Read,
    Other,
}

impl std::fmt::Display for TransportErrorKind {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Dns => "dns",
            Self::Connect => "connect",
            Self::Tls => "tls",
            Self::Timeout => "timeout",
            Self::Read => "read",
            Self::Other => "other",
        };
        formatter.write_str(text)
    }
}

/// Broad class of an [`Error`], deciding how the fetch loop treats it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Rejected configuration. Raised by the configuring or preparing call.
    Configuration,
    /// The caller broke the fetch-once protocol.
    Usage,
    Transport,
    HttpStatus,
    /// The successful body did not match what the caller asked for.
    ResponseFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    InvalidAttempts,
    SerializeJson,
    SerializeQuery,
    ApplyOption,
    TransportInit,
    AlreadyFetched,
    NotFetched,
    Transport,
    HttpStatus,
    MimeMismatch,
    Deserialize,
    JsonRoot,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidAttempts => "invalid_attempts",
            Self::SerializeJson => "serialize_json",
            Self::SerializeQuery => "serialize_query",
            Self::ApplyOption => "apply_option",
            Self::TransportInit => "transport_init",
            Self::AlreadyFetched => "already_fetched",
            Self::NotFetched => "not_fetched",
            Self::Transport => "transport",
            Self::HttpStatus => "http_status",
            Self::MimeMismatch => "mime_mismatch",
            Self::Deserialize => "deserialize",
            Self::JsonRoot => "json_root",
        }
    }

    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::InvalidAttempts
            | Self::SerializeJson
            | Self::SerializeQuery
            | Self::ApplyOption
            | Self::TransportInit => ErrorCategory::Configuration,
            Self::AlreadyFetched | Self::NotFetched => ErrorCategory::Usage,
            Self::Transport => ErrorCategory::Transport,
            Self::HttpStatus => ErrorCategory::HttpStatus,
            Self::MimeMismatch | Self::Deserialize | Self::JsonRoot => {
                ErrorCategory::ResponseFormat
            }
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid attempt count {times}: at least one attempt is required")]
    InvalidAttempts { times: u32 },
    #[error("failed to serialize request json: {source}")]
    SerializeJson {
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize request query: {source}")]
    SerializeQuery {
        #[source]
        source: serde_urlencoded::ser::Error,
    },
    #[error("failed to apply transport option {option}: {message}")]
    ApplyOption { option: String, message: String },
    #[error("failed to open transport handle: {message}")]
    TransportInit { message: String },
    #[error("request has already been fetched")]
    AlreadyFetched,
    #[error("response is not available before fetch")]
    NotFetched,
    #[error("http transport error ({kind}) on attempt {attempt} for {method} {uri}: {message}")]
    Transport {
        kind: TransportErrorKind,
        attempt: usize,
        method: String,
        uri: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("http status error {status} on attempt {attempt} for {method} {uri}")]
    HttpStatus {
        status: u16,
        attempt: usize,
        method: String,
        uri: String,
    },
    #[error("invalid json mime {mime:?}")]
    MimeMismatch { mime: String },
    #[error("failed to decode response json: {source}; body={body}")]
    Deserialize {
        #[source]
        source: serde_json::Error,
        body: String,
    },
    #[error("response json is neither an object nor an array")]
    JsonRoot,
}

impl Error {
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidAttempts { .. } => ErrorCode::InvalidAttempts,
            Self::SerializeJson { .. } => ErrorCode::SerializeJson,
            Self::SerializeQuery { .. } => ErrorCode::SerializeQuery,
            Self::ApplyOption { .. } => ErrorCode::ApplyOption,
            Self::TransportInit { .. } => ErrorCode::TransportInit,
            Self::AlreadyFetched => ErrorCode::AlreadyFetched,
            Self::NotFetched => ErrorCode::NotFetched,
            Self::Transport { .. } => ErrorCode::Transport,
            Self::HttpStatus { .. } => ErrorCode::HttpStatus,
            Self::MimeMismatch { .. } => ErrorCode::MimeMismatch,
            Self::Deserialize { .. } => ErrorCode::Deserialize,
            Self::JsonRoot => ErrorCode::JsonRoot,
        }
    }

    pub const fn category(&self) -> ErrorCategory {
        self.code().category()
    }

    /// Whether the fetch loop would have retried this error had attempts remained.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::HttpStatus
        )
    }

    /// Attempt number that produced a transport or status failure.
    pub const fn attempt(&self) -> Option<usize> {
        match self {
            Self::Transport { attempt, .. } | Self::HttpStatus { attempt, .. } => Some(*attempt),
            _ => None,
        }
    }

    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// What went wrong in one failed attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    Transport(TransportErrorKind),
    HttpStatus(u16),
}

/// Record of a failed attempt, kept in attempt order after fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptFailure {
    attempt: usize,
    kind: FailureKind,
    message: String,
}

impl AttemptFailure {
    pub(crate) fn from_error(error: &Error) -> Option<Self> {
        let kind = match error {
            Error::Transport { kind, .. } => FailureKind::Transport(*kind),
            Error::HttpStatus { status, .. } => FailureKind::HttpStatus(*status),
            _ => return None,
        };
        Some(Self {
            attempt: error.attempt()?,
            kind,
            message: error.to_string(),
        })
    }

    pub fn attempt(&self) -> usize {
        self.attempt
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> Option<u16> {
        match self.kind {
            FailureKind::HttpStatus(status) => Some(status),
            FailureKind::Transport(_) => None,
        }
    }
}

impl std::fmt::Display for AttemptFailure {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(&self.message)
    }
}
