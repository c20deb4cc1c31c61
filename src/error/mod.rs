use thiserror::Error;

/// Errors raised while talking to Breadbox or the third-party services it
/// leans on.
#[derive(Debug, Error)]
pub enum BreadboxError {
    /// Connection, timeout or body decoding failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response where no more specific meaning applies.
    #[error("HTTP request to {url} failed with status {status}")]
    Status { status: u16, url: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Media download rejected before any bytes were written.
    #[error("media download failed with status {status}")]
    Stream { status: u16 },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid session: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BreadboxError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BreadboxError::NotFound { .. })
    }
}

/// User input that failed a format check. Always answered with a re-prompt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("IDs must be numeric.")]
    NotNumeric(String),
}

/// The user backed out of a prompt that has no parent to return to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("exit requested")]
pub struct ExitRequested;

/// A screen needed the Breadbox session but there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("not logged in to Breadbox")]
pub struct NotLoggedIn;
