use credentials::CredentialsError;
use hyper::StatusCode;
use thiserror::Error;

/// Rule a save request broke. Raised before any network call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("emailName must not be empty")]
    EmptyEmailName,

    #[error("fields must contain at least one field")]
    NoFields,

    #[error("{count} fields exceed the maximum of {max}")]
    TooManyFields { count: usize, max: usize },

    #[error("field at position {index} has an empty name")]
    EmptyFieldName { index: usize },

    #[error("field '{name}' has an empty value")]
    EmptyFieldValue { name: String },

    #[error("duplicate field name '{name}' (names are case-insensitive)")]
    DuplicateFieldName { name: String },

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
}

/// Coarse classification used for status codes, logs and metric tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Validation,
    Auth,
    Upsert,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Auth => "auth_error",
            ErrorKind::Upsert => "upsert_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

/// Errors that can occur while relaying a save
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("authentication failed: {0}")]
    Auth(CredentialsError),

    #[error("upsert rejected with status {status}: {body}")]
    UpsertRejected { status: StatusCode, body: String },

    #[error("upsert request failed: {0}")]
    UpsertTransport(reqwest::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CredentialsError> for RelayError {
    fn from(err: CredentialsError) -> Self {
        match err {
            CredentialsError::MissingConfig(_) => RelayError::Config(err.to_string()),
            other => RelayError::Auth(other),
        }
    }
}

impl RelayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RelayError::Config(_) => ErrorKind::Config,
            RelayError::Validation(_) => ErrorKind::Validation,
            RelayError::Auth(_) => ErrorKind::Auth,
            RelayError::UpsertRejected { .. } | RelayError::UpsertTransport(_) => ErrorKind::Upsert,
            RelayError::Internal(_) | RelayError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Status code reported to the caller of the save endpoint.
    pub fn http_status(&self) -> StatusCode {
        match self {
            RelayError::Validation(ValidationError::BodyTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Status code returned by the platform, if the failure came from it.
    pub fn upstream_status(&self) -> Option<StatusCode> {
        match self {
            RelayError::Auth(e) => e.status(),
            RelayError::UpsertRejected { status, .. } => Some(*status),
            RelayError::UpsertTransport(e) => e.status(),
            _ => None,
        }
    }
}
