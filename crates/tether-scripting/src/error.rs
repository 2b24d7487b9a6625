//! Errors raised while loading, compiling, or calling scripts

/// Result alias for script operations
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Failure inside the script sandbox
///
/// Converts into [`tether_core::Error`] at the crate boundary; the
/// initialization variants all collapse into `Error::Initialization`.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScriptError {
    /// Rhai rejected the source text
    #[error("failed to compile script: {message}{}", location(.line, .column))]
    CompilationError {
        /// Parser message
        message: String,
        /// 1-based line
        line: Option<usize>,
        /// 1-based column
        column: Option<usize>,
    },

    /// The entry point threw or evaluated to an error
    #[error("script raised an error: {message}{}", location(.line, &None))]
    RuntimeError {
        /// Rhai error text
        message: String,
        /// 1-based line
        line: Option<usize>,
    },

    /// No function with the expected name and arity
    #[error("script must export {name} taking {arity} parameter(s)")]
    MissingFunction {
        /// Entry point name
        name: String,
        /// Parameter count
        arity: usize,
    },

    /// Called on a context built from an empty script
    #[error("{function} function has not been initialized")]
    NotInitialized {
        /// Entry point name
        function: String,
    },

    /// Entry point returned something other than what the caller reads
    #[error("Script function expected to return {expected}, but returned: {actual}")]
    TypeMismatch {
        /// What was wanted
        expected: String,
        /// What came back
        actual: String,
    },

    /// Source could not be used as a script
    #[error("unusable script source: {message}")]
    InvalidSource {
        /// Reason
        message: String,
    },

    /// Script file could not be read
    #[error("cannot load script: {message}")]
    IoError {
        /// Reason
        message: String,
    },
}

fn location(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" (line {line}, column {column})"),
        (Some(line), None) => format!(" (line {line})"),
        _ => String::new(),
    }
}

impl ScriptError {
    /// Script raised at runtime, position unknown
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::RuntimeError {
            message: message.into(),
            line: None,
        }
    }

    /// Returned value has the wrong shape
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Source rejected before compiling
    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self::InvalidSource {
            message: message.into(),
        }
    }

    /// True when no context can be built from the script
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            Self::CompilationError { .. }
                | Self::MissingFunction { .. }
                | Self::InvalidSource { .. }
                | Self::IoError { .. }
        )
    }
}

impl From<std::io::Error> for ScriptError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            message: err.to_string(),
        }
    }
}

impl From<rhai::ParseError> for ScriptError {
    fn from(err: rhai::ParseError) -> Self {
        let at = err.position();
        Self::CompilationError {
            message: err.err_type().to_string(),
            line: at.line(),
            column: at.position(),
        }
    }
}

impl From<Box<rhai::EvalAltResult>> for ScriptError {
    fn from(err: Box<rhai::EvalAltResult>) -> Self {
        let line = err.position().line();
        Self::RuntimeError {
            message: err.to_string(),
            line,
        }
    }
}

impl From<ScriptError> for tether_core::Error {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::NotInitialized { function } => Self::NotInitialized { function },
            ScriptError::TypeMismatch { expected, actual } => {
                Self::TypeMismatch { expected, actual }
            }
            ScriptError::RuntimeError { .. } => Self::ScriptExecution(err.to_string()),
            other => Self::Initialization(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compilation_error_location() {
        let err = ScriptError::CompilationError {
            message: "unexpected '}'".to_string(),
            line: Some(3),
            column: Some(7),
        };
        assert_eq!(
            err.to_string(),
            "failed to compile script: unexpected '}' (line 3, column 7)"
        );

        let err = ScriptError::CompilationError {
            message: "eof".to_string(),
            line: None,
            column: None,
        };
        assert_eq!(err.to_string(), "failed to compile script: eof");
    }

    #[test]
    fn test_into_core_error() {
        let err: tether_core::Error = ScriptError::type_mismatch("Request", "map").into();
        assert!(matches!(err, tether_core::Error::TypeMismatch { .. }));

        let err: tether_core::Error = ScriptError::runtime("boom").into();
        assert!(matches!(err, tether_core::Error::ScriptExecution(msg) if msg.contains("boom")));

        let err: tether_core::Error = ScriptError::MissingFunction {
            name: "parseResponse".to_string(),
            arity: 1,
        }
        .into();
        assert!(err.is_initialization());
        assert!(err.to_string().contains("parseResponse"));

        let err: tether_core::Error = ScriptError::NotInitialized {
            function: "getRequestData".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "getRequestData function has not been initialized"
        );
    }
}
