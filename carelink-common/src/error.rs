// carelink-common/src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// No credential record exists for the user yet; the caller should
    /// start the connect flow rather than retry.
    #[error("Calendar account not connected")]
    NotConnected,

    /// The provider rejected the refresh grant. Distinct from a transient
    /// network failure so the UI prompts re-authorization instead of
    /// retrying silently.
    #[error("Reconnect required: {0}")]
    ReconnectRequired(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid phone format: {0}")]
    InvalidPhoneFormat(String),

    #[error("Provider error: status={status}, body={body}")]
    Provider { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<chrono::format::ParseError> for Error {
    fn from(err: chrono::format::ParseError) -> Self {
        Error::Parse(err.to_string())
    }
}
