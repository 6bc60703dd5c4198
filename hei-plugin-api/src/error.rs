//! Error types for module authors

use thiserror::Error;

/// Why the host refused a registration call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// Another module already owns this key
    #[error("Key is already registered by another module")]
    Duplicate,

    /// Key was empty, not valid UTF-8, or the handler was null
    #[error("Invalid registration key or handler")]
    InvalidKey,

    /// Registration attempted outside the module's init call
    #[error("Registration is only allowed during module initialization")]
    OutsideInit,

    /// Status code this module does not know about
    #[error("Unknown registration status {0}")]
    Unknown(i32),
}

/// Errors from host file services
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FileError {
    /// The host could not open the path
    #[error("Could not open file: {0}")]
    Open(String),

    /// The path contained an interior NUL byte
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The host reported a failed read
    #[error("Read failed on file handle {0}")]
    Read(u64),

    /// The host reported a failed seek
    #[error("Seek failed on file handle {0}")]
    Seek(u64),

    /// Fewer bytes were available than requested
    #[error("Unexpected end of file on handle {0}")]
    UnexpectedEof(u64),

    /// The host's export table predates this call
    #[error("Host interface {0} does not provide this call")]
    Unsupported(String),
}
