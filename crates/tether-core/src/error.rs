//! Error types for Tether connectors

/// Result type alias using [`Error`]
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Main error type for Tether connectors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Script could not be loaded, compiled, or is missing its entry point
    #[error("Script initialization failed: {0}")]
    Initialization(String),

    /// A script role was invoked without a configured script
    #[error("{function} function has not been initialized")]
    NotInitialized {
        /// Name of the missing script function
        function: String,
    },

    /// Script returned a value of the wrong shape
    #[error("Script function expected to return {expected}, but returned: {actual}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual type name
        actual: String,
    },

    /// Script raised during execution
    #[error("Script execution failed: {0}")]
    ScriptExecution(String),

    /// Intermediate record could not be converted into a canonical record
    #[error("Record conversion failed: {0}")]
    Conversion(String),

    /// Network failure reaching the endpoint
    #[error("Transport error: {0}")]
    Transport(String),

    /// Endpoint answered with an unexpected status
    #[error("Unexpected response status {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// The cycle completed without producing records; the host should back off and retry
    #[error("No records available, retry later")]
    BackoffRetry,

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connector used before `open`
    #[error("Connector has not been opened")]
    NotOpen,

    /// A batch write stopped part-way
    #[error("Write failed after {written} records: {source}")]
    Write {
        /// Number of records written before the failure
        written: usize,
        /// Underlying failure
        #[source]
        source: Box<Error>,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Whether this is the "nothing yet, retry me" signal rather than a failure
    pub fn is_backoff_retry(&self) -> bool {
        matches!(self, Error::BackoffRetry)
    }

    /// Whether this error was caused by cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether this error is fatal to connector startup
    pub fn is_initialization(&self) -> bool {
        matches!(self, Error::Initialization(_) | Error::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message() {
        let err = Error::type_mismatch("Request", "map");
        assert_eq!(
            err.to_string(),
            "Script function expected to return Request, but returned: map"
        );
    }

    #[test]
    fn test_backoff_is_not_cancellation() {
        assert!(Error::BackoffRetry.is_backoff_retry());
        assert!(!Error::BackoffRetry.is_cancelled());
        assert!(Error::Cancelled.is_cancelled());
    }

    #[test]
    fn test_status_error_includes_body() {
        let err = Error::Status {
            status: 503,
            body: "upstream down".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn test_write_error_keeps_source() {
        let err = Error::Write {
            written: 2,
            source: Box::new(Error::Transport("connection reset".to_string())),
        };
        assert!(err.to_string().contains("after 2 records"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
