//! Error types for mysql-sidecar

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Database Errors ===
    #[error("MySQL error: {0}")]
    MySql(#[from] mysql_async::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The database answered, but reported a disqualifying state.
    #[error("{0}")]
    State(String),

    // === Bootstrap Errors ===
    #[error("Bootstrap procedure failed: {0}")]
    BootstrapFailed(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an error, used for logging and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connectivity,
    State,
    BootstrapProcedure,
    Timeout,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Connectivity => write!(f, "connectivity"),
            ErrorKind::State => write!(f, "state"),
            ErrorKind::BootstrapProcedure => write!(f, "bootstrap"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::Internal => write!(f, "internal"),
        }
    }
}

impl Error {
    /// Wrap this error with the name of the operation that produced it.
    pub fn context(self, context: impl Into<String>) -> Self {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Classify the innermost cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Context { source, .. } => source.kind(),
            Error::Io(_) | Error::MySql(_) | Error::ConnectionFailed(_) => ErrorKind::Connectivity,
            Error::State(_) => ErrorKind::State,
            Error::BootstrapFailed(_) => ErrorKind::BootstrapProcedure,
            Error::InvalidConfig(_) => ErrorKind::Configuration,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Is this error worth re-probing? Retries belong to the orchestrator,
    /// this only informs log severity.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connectivity | ErrorKind::Timeout)
    }
}

/// Attach an operation name to the error side of a result.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().context(context))
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(e: tokio::time::error::Elapsed) -> Self {
        Error::Timeout(e.to_string())
    }
}
