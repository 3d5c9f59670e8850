//! Error types for framestream-rs.
//!
//! Each concern of the library has its own error enum so callers can tell a
//! broken result stream apart from a misused statement handle or a bad
//! configuration. [`FrameStreamError`] wraps all of them for callers that only
//! want a single error type.

use thiserror::Error;

use crate::query::StatementId;

/// Result type alias using [`FrameStreamError`].
pub type Result<T> = std::result::Result<T, FrameStreamError>;

/// Top-level error type wrapping every failure kind of the library.
#[derive(Error, Debug)]
pub enum FrameStreamError {
    /// A result stream failed while decoding or opening.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// A statement lifecycle call failed.
    #[error(transparent)]
    Statement(#[from] StatementError),

    /// Reading a column value from the current row failed.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Configuration was rejected at construction time.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The backend collaborator failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised while turning a backend token stream into typed rows.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Underlying reader failed.
    #[error("I/O error while reading result stream: {0}")]
    Io(#[from] std::io::Error),

    /// The token stream is not well-formed JSON.
    #[error("Malformed result stream at byte {position}: {message}")]
    Malformed { position: u64, message: String },

    /// The stream ended inside an open object or array.
    #[error("Unexpected end-of-input at byte {position}: expected close marker for {context}")]
    UnexpectedEof { position: u64, context: String },

    /// The column representation cannot be decoded from the stream.
    #[error("Unable to parse {rep} from stream!")]
    UnsupportedRep { rep: String },

    /// A token of the wrong kind was found for a column.
    #[error("Cannot decode {rep} from {found} token")]
    UnexpectedToken { rep: String, found: String },

    /// A numeric token was out of range or not parseable for the target kind.
    #[error("Invalid numeric value '{value}' for {rep}: {message}")]
    InvalidNumber {
        rep: String,
        value: String,
        message: String,
    },

    /// A null element was found in an array whose elements may not be null.
    #[error("Primitive array cannot contain null values")]
    NullInPrimitiveArray,

    /// Arrays nested inside array columns are not supported.
    #[error("Nested arrays are not supported")]
    NestedArray,
}

/// Failure payload of a result stream: the single failure envelope.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Decoding the backend response failed.
    #[error("Failed to decode result stream: {0}")]
    Decode(#[from] DecodeError),

    /// Opening the backend response failed.
    #[error("Failed to open result stream: {0}")]
    Backend(#[from] BackendError),

    /// The producer went away without publishing a terminal envelope.
    #[error("Result stream producer terminated unexpectedly")]
    ProducerGone,
}

/// Errors from the statement lifecycle (prepare, execute, close).
#[derive(Error, Debug)]
pub enum StatementError {
    /// Execute was called for an id that was never prepared or is already closed.
    #[error("Statement {0} not found; prepare it before executing")]
    StatementNotFound(StatementId),

    /// The backend returned a signature that cannot be parsed.
    #[error("Invalid statement signature: {0}")]
    InvalidSignature(String),

    /// The backend rejected the request.
    #[error("Backend request failed: {0}")]
    Backend(#[from] BackendError),

    /// Execution needs a Tokio runtime to drive its producer.
    #[error("Statement execution requires a Tokio runtime")]
    NoRuntime,
}

impl From<serde_json::Error> for StatementError {
    fn from(err: serde_json::Error) -> Self {
        StatementError::InvalidSignature(err.to_string())
    }
}

/// Errors raised while reading a column from the cursor's current row.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AccessError {
    /// Uniform wrapper for any fault raised by the underlying row object.
    #[error("Error while reading column: {0}")]
    Access(String),

    /// The cursor is not positioned on a row.
    #[error("No current row")]
    NoCurrentRow,

    /// The value exists but cannot be converted to the requested type.
    #[error("Cannot convert {from} to {to}")]
    Conversion { from: String, to: String },

    /// The accessor was configured for a column the row shape cannot serve.
    #[error("Invalid accessor: {0}")]
    InvalidAccessor(String),
}

/// Configuration errors. These fail fast at construction, never on the data path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// No endpoint URLs were configured.
    #[error("Endpoint list is empty")]
    EmptyEndpointList,

    /// The endpoint list contains an empty element.
    #[error("Malformed endpoint list '{0}'")]
    MalformedEndpointList(String),

    /// `combined` was called without any limiter.
    #[error("No frame limiters supplied")]
    NoFrameLimiters,

    /// A row-count limiter needs a positive bound.
    #[error("Row count limit must be positive, got {0}")]
    InvalidRowCountLimit(usize),

    /// Unknown load-balancing strategy name.
    #[error("Unknown load balancing strategy '{0}'")]
    UnknownStrategy(String),

    /// A configuration property had an unparseable value.
    #[error("Invalid value '{value}' for property '{key}'")]
    InvalidValue { key: String, value: String },

    /// A required configuration property is missing.
    #[error("Missing required property '{0}'")]
    MissingProperty(String),
}

/// Errors reported by the backend collaborator (transport, authentication, remote engine).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct BackendError {
    /// Human readable description from the collaborator.
    pub message: String,
}

impl BackendError {
    /// Create a backend error from any displayable value.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_rep_message() {
        let err = DecodeError::UnsupportedRep {
            rep: "JAVA_SQL_TIME".to_string(),
        };
        assert_eq!(err.to_string(), "Unable to parse JAVA_SQL_TIME from stream!");
    }

    #[test]
    fn test_statement_not_found_message() {
        let err = StatementError::StatementNotFound(42);
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn test_stream_error_wraps_decode() {
        let err: StreamError = DecodeError::NullInPrimitiveArray.into();
        assert!(matches!(
            err,
            StreamError::Decode(DecodeError::NullInPrimitiveArray)
        ));
        assert!(err.to_string().contains("Primitive array"));
    }

    #[test]
    fn test_top_level_conversion() {
        let err: FrameStreamError = ConfigError::NoFrameLimiters.into();
        assert!(matches!(
            err,
            FrameStreamError::Config(ConfigError::NoFrameLimiters)
        ));
        assert_eq!(err.to_string(), "No frame limiters supplied");
    }

    #[test]
    fn test_invalid_signature_from_serde() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: StatementError = parse_err.into();
        assert!(matches!(err, StatementError::InvalidSignature(_)));
    }
}
