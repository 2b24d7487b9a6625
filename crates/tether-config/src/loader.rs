//! Configuration loading
//!
//! A connector file has a `source` and/or `destination` section. Nested keys are
//! flattened with `.` so that
//!
//! ```yaml
//! source:
//!   url: "https://api.example.com/items"
//!   params:
//!     pageSize: 50
//! ```
//!
//! yields the flat keys `url` and `params.pageSize`, the same shape the pipeline
//! host passes to `configure`.

use regex::{Captures, Regex};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;
use tether_core::{Error, RawConfig, Result};

/// Serialization of a connector file, picked from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl FileFormat {
    /// Format for `path`, matching the extension case-insensitively
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "toml" => Ok(Self::Toml),
            "json" => Ok(Self::Json),
            _ => Err(Error::Config(format!(
                "{} must end in .yaml, .yml, .toml or .json",
                path.display()
            ))),
        }
    }

    fn decode(self, content: &str) -> Result<Value> {
        let decoded = match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };
        decoded.map_err(|e| Error::Config(format!("malformed {self:?} config: {e}")))
    }
}

/// Flattened sections of a connector file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorFile {
    /// `source` section
    pub source: Option<RawConfig>,
    /// `destination` section
    pub destination: Option<RawConfig>,
}

impl ConnectorFile {
    /// The source section
    pub fn require_source(&self) -> Result<&RawConfig> {
        section(&self.source, "source")
    }

    /// The destination section
    pub fn require_destination(&self) -> Result<&RawConfig> {
        section(&self.destination, "destination")
    }
}

fn section<'a>(raw: &'a Option<RawConfig>, name: &str) -> Result<&'a RawConfig> {
    raw.as_ref()
        .ok_or_else(|| Error::Config(format!("config has no \"{name}\" section")))
}

/// Read and flatten a connector file
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<ConnectorFile> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path)?;
    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;

    load_from_str(&content, format)
}

/// Substitute `${VAR}` and `${VAR:-fallback}` from the process environment
fn expand_env_vars(content: &str) -> Result<String> {
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .map_err(|e| Error::Config(e.to_string()))?;

    let mut unset = None;
    let expanded = pattern.replace_all(content, |caps: &Captures<'_>| {
        let name = &caps[1];
        match (env::var(name), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(fallback)) => fallback.as_str().to_string(),
            (Err(_), None) => {
                unset.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match unset {
        Some(name) => Err(Error::Config(format!(
            "${{{name}}} is not set and has no :- fallback"
        ))),
        None => Ok(expanded.into_owned()),
    }
}

/// Flatten a connector document held in memory
pub fn load_from_str(content: &str, format: FileFormat) -> Result<ConnectorFile> {
    let Value::Object(mut sections) = format.decode(&expand_env_vars(content)?)? else {
        return Err(Error::Config(
            "config must be a map with \"source\" and/or \"destination\"".to_string(),
        ));
    };

    let mut take = |name: &str| sections.remove(name).map(flatten_section).transpose();
    let file = ConnectorFile {
        source: take("source")?,
        destination: take("destination")?,
    };

    for unknown in sections.keys() {
        tracing::warn!(section = %unknown, "Ignoring unknown config section");
    }

    if file.source.is_none() && file.destination.is_none() {
        return Err(Error::Config(
            "config defines neither \"source\" nor \"destination\"".to_string(),
        ));
    }

    Ok(file)
}

fn flatten_section(section: Value) -> Result<RawConfig> {
    let mut out = RawConfig::new();
    match section {
        Value::Object(map) => {
            for (key, value) in map {
                flatten_into(&key, value, &mut out);
            }
            Ok(out)
        }
        Value::Null => Ok(out),
        other => Err(Error::Config(format!(
            "config section must be a map, got {other}"
        ))),
    }
}

fn flatten_into(prefix: &str, value: Value, out: &mut RawConfig) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                flatten_into(&format!("{prefix}.{key}"), nested, out);
            }
        }
        Value::Array(items) => {
            let joined = items
                .into_iter()
                .map(scalar_to_string)
                .collect::<Vec<_>>()
                .join(",");
            out.insert(prefix.to_string(), joined);
        }
        scalar => {
            out.insert(prefix.to_string(), scalar_to_string(scalar));
        }
    }
}

fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
