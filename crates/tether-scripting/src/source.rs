//! Script sources and the entry points they must export

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, ScriptError};

/// Extension script files must carry
pub const SCRIPT_EXTENSION: &str = "rhai";

/// Where a script's code comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Code held in memory
    Inline {
        /// Rhai source
        code: String,
        /// Name used in log events
        label: String,
    },
    /// A `.rhai` file, read when the script is compiled
    File(PathBuf),
}

impl ScriptSource {
    /// In-memory script labelled `inline`
    pub fn inline(code: impl Into<String>) -> Self {
        Self::inline_named(code, "inline")
    }

    /// In-memory script with its own label
    pub fn inline_named(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self::Inline {
            code: code.into(),
            label: label.into(),
        }
    }

    /// Script file
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    /// Read the code
    pub fn load(&self) -> Result<String> {
        match self {
            Self::Inline { code, .. } => Ok(code.clone()),
            Self::File(path) => {
                check_extension(path)?;
                fs::read_to_string(path).map_err(|e| ScriptError::IoError {
                    message: format!("cannot read {}: {}", path.display(), e),
                })
            }
        }
    }

    /// Label for inline code, file name for files
    pub fn name(&self) -> String {
        match self {
            Self::Inline { label, .. } => label.clone(),
            Self::File(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        }
    }
}

fn check_extension(path: &Path) -> Result<()> {
    match path.extension() {
        Some(ext) if ext.eq_ignore_ascii_case(SCRIPT_EXTENSION) => Ok(()),
        _ => Err(ScriptError::invalid_source(format!(
            "{} is not a .{} script",
            path.display(),
            SCRIPT_EXTENSION
        ))),
    }
}

/// A named entry point a script must export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScriptFunction {
    /// Function name
    pub name: &'static str,
    /// Number of parameters
    pub arity: usize,
}

impl ScriptFunction {
    /// `getRequestData(config, previousResponse, position)`
    pub const GET_REQUEST_DATA: ScriptFunction = ScriptFunction {
        name: "getRequestData",
        arity: 3,
    };

    /// `parseResponse(body)`
    pub const PARSE_RESPONSE: ScriptFunction = ScriptFunction {
        name: "parseResponse",
        arity: 1,
    };
}

impl fmt::Display for ScriptFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_source_names() {
        assert_eq!(ScriptSource::inline("1").name(), "inline");
        assert_eq!(ScriptSource::inline_named("1", "probe").name(), "probe");
        assert_eq!(
            ScriptSource::file("/etc/tether/parse_response.rhai").name(),
            "parse_response.rhai"
        );
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::Builder::new().suffix(".RHAI").tempfile().unwrap();
        write!(file, "fn parseResponse(body) {{ Response() }}").unwrap();

        let code = ScriptSource::file(file.path()).load().unwrap();
        assert!(code.contains("parseResponse"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ScriptSource::file("/nonexistent/script.rhai").load().unwrap_err();
        assert!(matches!(err, ScriptError::IoError { .. }));
        assert!(err.is_initialization());
    }

    #[test]
    fn test_load_rejects_other_extensions() {
        for path in ["get_request_data.js", "get_request_data"] {
            let err = ScriptSource::file(path).load().unwrap_err();
            assert!(matches!(err, ScriptError::InvalidSource { .. }), "{path}");
        }
    }

    #[test]
    fn test_function_display() {
        assert_eq!(ScriptFunction::GET_REQUEST_DATA.to_string(), "getRequestData/3");
    }
}
