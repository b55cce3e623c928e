//! Error types for the vcdtool core library.

use std::path::PathBuf;

/// The main error type for vcdtool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error with optional path context.
    #[error("I/O error{}: {source}", path.as_ref().map(|p| format!(" at '{}'", p.display())).unwrap_or_default())]
    Io {
        source: std::io::Error,
        path: Option<PathBuf>,
    },

    /// The HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Login did not produce an authorization token.
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// The server refused to create or accept an upload.
    #[error("Upload rejected ({status}): {body}")]
    UploadRejected { status: u16, body: String },

    /// A read request returned a non-success status.
    #[error("Unexpected status {status} from '{href}'")]
    UnexpectedStatus { status: u16, href: String },

    /// A response body was not well-formed XML.
    #[error("XML error: {message}")]
    Xml { message: String },

    /// A server document lacked an element or link the workflow depends on.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// A polling loop ran out of attempts.
    #[error("Timed out waiting for {operation} after {attempts} attempts")]
    Timeout { operation: String, attempts: u32 },

    /// Invalid or incomplete configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A named organization or catalog does not exist.
    #[error("Not found: {message}")]
    NotFound { message: String },
}

/// A specialized Result type for vcdtool operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an I/O error with path context.
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: Some(path.into()),
        }
    }

    /// Create an I/O error without path context.
    pub fn io_simple(source: std::io::Error) -> Self {
        Self::Io { source, path: None }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an upload rejection from a response status and body.
    pub fn upload_rejected(status: u16, body: impl Into<String>) -> Self {
        Self::UploadRejected {
            status,
            body: body.into(),
        }
    }

    /// Create an unexpected status error for the given href.
    pub fn unexpected_status(status: u16, href: impl Into<String>) -> Self {
        Self::UnexpectedStatus {
            status,
            href: href.into(),
        }
    }

    /// Create an XML parse error.
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml {
            message: message.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, attempts: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            attempts,
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Whether this error was caused by a missing local file.
    pub fn is_file_not_found(&self) -> bool {
        matches!(
            self,
            Self::Io { source, path: Some(_) } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io_simple(source)
    }
}
