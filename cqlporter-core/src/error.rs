//! Error types for CQLPorter

use thiserror::Error;

/// Result type alias for CQLPorter operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for CQLPorter operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors, detected once during initialization
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Schema resolution errors (keyspace/table/mapping validation)
    #[error("Schema error: {0}")]
    Schema(String),

    /// CQL statement parsing errors
    #[error("Query parse error: {0}")]
    QueryParse(String),

    /// Per-value type conversion errors
    #[error("Type conversion error: {0}")]
    Conversion(String),

    /// No codec registered for a (format, type) pair
    #[error("No codec found: {0}")]
    NoCodecFound(String),

    /// Token range splitting errors
    #[error("Token range error: {0}")]
    TokenRange(String),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a query parse error
    pub fn query_parse(msg: impl Into<String>) -> Self {
        Self::QueryParse(msg.into())
    }

    /// Create a type conversion error
    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    /// Create a no-codec-found error
    pub fn no_codec_found(msg: impl Into<String>) -> Self {
        Self::NoCodecFound(msg.into())
    }

    /// Create a token range error
    pub fn token_range(msg: impl Into<String>) -> Self {
        Self::TokenRange(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error is fatal for the whole run.
    ///
    /// Per-value conversion errors are recovered locally by wrapping the
    /// affected record; everything else aborts before any record is
    /// processed.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Conversion(_))
    }
}

/// Convert from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Conversion(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::schema("test error");
        assert!(matches!(err, Error::Schema(_)));
        assert_eq!(err.to_string(), "Schema error: test error");
    }

    #[test]
    fn test_error_fatality() {
        assert!(Error::configuration("test").is_fatal());
        assert!(Error::schema("test").is_fatal());
        assert!(Error::token_range("test").is_fatal());
        assert!(!Error::conversion("test").is_fatal());
    }
}
