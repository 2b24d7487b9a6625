//! Engine construction
//!
//! Every engine gets the same fixed binding table. Nothing is registered on an
//! engine after it is built, so contexts created at different times are identical.

use rhai::{Dynamic, Engine};
use std::fmt;
use tracing::{debug, info};

use crate::types::{self, ScriptLogger};
use crate::{marshal, url};

/// Name under which scripts reach the logger
pub const LOGGER_VAR: &str = "logger";

/// A named group of registrations applied to every new engine
#[derive(Clone, Copy)]
pub struct Binding {
    /// Group name, for diagnostics
    pub name: &'static str,
    install: fn(&mut Engine),
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("name", &self.name).finish()
    }
}

/// The binding table, applied in order
pub const BINDINGS: &[Binding] = &[
    Binding {
        name: "URL",
        install: url::install_url,
    },
    Binding {
        name: "Request",
        install: types::install_request,
    },
    Binding {
        name: "Response",
        install: types::install_response,
    },
    Binding {
        name: "Record",
        install: types::install_record,
    },
    Binding {
        name: "RawData/StructuredData",
        install: types::install_data,
    },
    Binding {
        name: "logger",
        install: types::install_logger,
    },
    Binding {
        name: "json",
        install: marshal::install_json,
    },
];

/// Resource limits applied to every engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    /// Maximum operations per call (guards against infinite loops)
    pub max_operations: u64,
    /// Maximum function call depth
    pub max_call_levels: usize,
    /// Maximum expression depth at global level
    pub max_expr_depth: usize,
    /// Maximum expression depth inside functions
    pub max_function_expr_depth: usize,
    /// Maximum string length in bytes
    pub max_string_size: usize,
    /// Maximum array and blob length
    pub max_array_size: usize,
    /// Maximum number of map entries
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 10_000_000,
            max_call_levels: 64,
            max_expr_depth: 64,
            max_function_expr_depth: 32,
            max_string_size: 16 * 1024 * 1024,
            max_array_size: 16 * 1024 * 1024,
            max_map_size: 100_000,
        }
    }
}

/// Build an engine with the binding table and limits applied
///
/// `script` names the script in log events emitted through `logger`, `print`
/// and `debug`. [`LOGGER_VAR`] is resolved by the engine unless the script
/// declares a variable of that name.
pub fn new_engine(script: &str, limits: &ScriptLimits) -> Engine {
    let mut engine = Engine::new();

    engine.set_max_operations(limits.max_operations);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);

    for binding in BINDINGS {
        (binding.install)(&mut engine);
    }

    // Function bodies cannot see outer scope, so `logger` is resolved on lookup.
    // A variable the script declares itself wins.
    let logger = ScriptLogger::new(script);
    #[allow(deprecated)]
    engine.on_var(move |name, _index, context| {
        if name == LOGGER_VAR && !context.scope().contains(name) {
            Ok(Some(Dynamic::from(logger.clone())))
        } else {
            Ok(None)
        }
    });

    let print_name = script.to_string();
    engine.on_print(move |text| info!(script = %print_name, "{}", text));

    let debug_name = script.to_string();
    engine.on_debug(move |text, source, pos| {
        debug!(script = %debug_name, source = source.unwrap_or(""), line = pos.line(), "{}", text)
    });

    engine
}
