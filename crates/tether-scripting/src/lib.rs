//! # Tether Scripting
//!
//! Rhai sandbox for user-supplied request builders and response parsers.
//!
//! ## Script surface
//!
//! - `getRequestData(config, previousResponse, position)` returns a `Request()`
//!   with `.URL` set
//! - `parseResponse(body)` returns a `Response()` with `.CustomData` and `.Records`
//! - Constructors: `Record()`, `RawData(..)`, `StructuredData()`, `Request()` /
//!   `RequestData()`, `Response()` / `ResponseData()`, `URL(str)`
//! - Helpers: `logger`, `parse_json`, `to_json`, `as_utf8`
//! - `logger` levels: `Trace`, `Debug`, `Info`, `Warn`, `Error`. `debug` is a Rhai
//!   keyword, so `logger.Debug(..)` has no lowercase form; the other levels also
//!   answer to `trace`, `info`, `warn` and `error`. A script variable named `logger`
//!   takes precedence over the ambient one.
//!
//! ## Execution model
//!
//! Each script is compiled once. Calls run in pooled contexts that each own an
//! engine and globals; a context serves one call at a time.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod bindings;
pub mod builder;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod marshal;
pub mod parser;
pub mod pool;
pub mod source;
pub mod types;
pub mod url;

pub use bindings::{new_engine, ScriptLimits, BINDINGS};
pub use builder::{RequestBuilder, ScriptRequestBuilder};
pub use context::{CompiledScript, ScriptContext};
pub use descriptor::{IntermediateRecord, RequestDescriptor, ResponseDescriptor};
pub use error::{Result, ScriptError};
pub use parser::{ResponseParser, ScriptResponseParser};
pub use pool::{ContextPool, PoolStats, PooledContext};
pub use source::{ScriptFunction, ScriptSource, SCRIPT_EXTENSION};

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::builder::{RequestBuilder, ScriptRequestBuilder};
    pub use crate::descriptor::{IntermediateRecord, RequestDescriptor, ResponseDescriptor};
    pub use crate::parser::{ResponseParser, ScriptResponseParser};
    pub use crate::source::{ScriptFunction, ScriptSource};
}
