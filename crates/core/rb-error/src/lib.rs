//! Error types and classification for rowbridge.
//!
//! This crate provides:
//! - [`RbError`] - Top-level error enum for everything the executor can fail on
//! - Domain-specific errors ([`ProtocolError`], [`CodecError`], [`TransformError`])
//! - [`ErrorCategory`] deciding between a clean shutdown and a fatal exit

use arrow::error::ArrowError;
use thiserror::Error;

/// Top-level error type for rowbridge.
#[derive(Error, Debug)]
pub enum RbError {
    /// Process protocol errors (framing, channels)
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Extension codec errors (storage shape, metadata, packing)
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Transform errors (row evaluation, type inference, rebuilding)
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised by the Arrow libraries
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),

    /// Generic errors (wrapped anyhow)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Errors of the subprocess framing protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The host closed the input stream. This is the regular way to end a session.
    #[error("Input stream closed by host")]
    StreamClosed,

    /// Reading from or writing to one of the channels failed
    #[error("I/O error: {0}")]
    Io(String),

    /// The snippet delivered on the code channel is not valid UTF-8
    #[error("Invalid code: {0}")]
    InvalidCode(String),

    /// A channel descriptor argument could not be used
    #[error("Invalid channel: {0}")]
    InvalidChannel(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(error: std::io::Error) -> Self {
        ProtocolError::Io(error.to_string())
    }
}

/// Extension codec errors.
#[derive(Error, Debug)]
pub enum CodecError {
    /// Physical storage does not match what the extension type declares
    #[error("Storage mismatch for {extension}: {reason}")]
    Mismatch { extension: String, reason: String },

    /// Serialized extension metadata could not be decoded
    #[error("Invalid metadata for {extension}: {reason}")]
    Metadata { extension: String, reason: String },

    /// A packed address has the wrong width
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// A subnet prefix length is out of range for its address family
    #[error("Invalid subnet: {0}")]
    InvalidSubnet(String),

    /// An enumeration value is not a member of the enumeration
    #[error("Unknown enumeration member: {0}")]
    UnknownMember(String),
}

/// Transform-related errors.
#[derive(Error, Debug)]
pub enum TransformError {
    /// Script compilation failed
    #[error("Script compilation failed: {0}")]
    Compilation(String),

    /// Script evaluation failed for a row
    #[error("Script execution failed at row {row}: {message}")]
    Execution { row: usize, message: String },

    /// A row produced no fields at all
    #[error("Empty output not allowed (row {row})")]
    EmptyRowOutput { row: usize },

    /// A changed or new field is null in every row, so its type is unknown
    #[error("Cannot infer type of '{key}': value is null in every row")]
    UnresolvableType { key: String },

    /// A value does not fit the type inferred for its column
    #[error("Failed to write modified '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: String,
        found: String,
    },

    /// A value has no Arrow representation
    #[error("Unsupported value for '{key}': {reason}")]
    Unsupported { key: String, reason: String },

    /// A key is used both as a field and as a record
    #[error("Field conflict: '{0}' is both a field and a record")]
    FieldConflict(String),
}

/// How the executor reacts to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The host ended the session; exit cleanly without an error payload.
    Shutdown,

    /// Report the error on the error channel and exit with failure.
    Fatal,
}

impl ErrorCategory {
    /// Process exit code for this category.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Shutdown => 0,
            Self::Fatal => 1,
        }
    }
}

/// Classifies an error to determine how the executor terminates.
pub fn classify_error(error: &RbError) -> ErrorCategory {
    match error {
        RbError::Protocol(ProtocolError::StreamClosed) => ErrorCategory::Shutdown,
        _ => ErrorCategory::Fatal,
    }
}

/// Result type alias using RbError.
pub type Result<T> = std::result::Result<T, RbError>;
