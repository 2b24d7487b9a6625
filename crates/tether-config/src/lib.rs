//! # Tether Configuration
//!
//! Configuration management with support for:
//! - The host's flat `key -> value` map (`url`, `headers`, `params.*`, `script.*`, ...)
//! - Config files in YAML, TOML, or JSON with `source` / `destination` sections
//! - Environment variable expansion
//! - Validation and defaults

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod loader;
pub mod parse;
pub mod types;
pub mod validator;

pub use loader::{load_from_file, load_from_str, ConnectorFile, FileFormat};
pub use types::{DestinationConfig, HttpConfig, ScriptPaths, SourceConfig};
pub use validator::{validate_destination, validate_source};
