//! Isolated script execution contexts

use rhai::{CallFnOptions, Dynamic, Engine, Scope, AST};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::bindings::{new_engine, ScriptLimits};
use crate::error::{Result, ScriptError};
use crate::marshal;
use crate::source::{ScriptFunction, ScriptSource};

/// A script compiled once and instantiated into any number of contexts
#[derive(Clone)]
pub struct CompiledScript {
    name: Arc<str>,
    ast: AST,
    function: ScriptFunction,
    limits: ScriptLimits,
    exported: bool,
}

impl CompiledScript {
    /// Load, compile and check a script for `function`
    ///
    /// An empty script compiles to a context without an entry point; calling it
    /// fails with [`ScriptError::NotInitialized`].
    pub fn compile(
        source: &ScriptSource,
        function: ScriptFunction,
        limits: ScriptLimits,
    ) -> Result<Self> {
        let name: Arc<str> = source.name().into();
        let code = source.load()?;

        let engine = new_engine(&name, &limits);
        let ast = engine.compile(&code)?;

        let exported = if code.trim().is_empty() {
            false
        } else if ast
            .iter_functions()
            .any(|f| f.name == function.name && f.params.len() == function.arity)
        {
            true
        } else {
            return Err(ScriptError::MissingFunction {
                name: function.name.to_string(),
                arity: function.arity,
            });
        };

        debug!(script = %name, function = %function, "Script compiled");

        Ok(Self {
            name,
            ast,
            function,
            limits,
            exported,
        })
    }

    /// Script name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Entry point this script was compiled for
    pub fn function(&self) -> ScriptFunction {
        self.function
    }

    /// Create a fresh context with its own engine
    ///
    /// Top-level statements run here so a failing script is caught before any
    /// call. They run again at the start of every call, which gives each call its
    /// own globals and lets functions read top-level `const`s through `global::`.
    pub fn instantiate(&self) -> Result<ScriptContext> {
        let engine = new_engine(&self.name, &self.limits);

        engine
            .run_ast_with_scope(&mut Scope::new(), &self.ast)
            .map_err(|e| {
                ScriptError::invalid_source(format!(
                    "top-level statements of {} failed: {}",
                    self.name, e
                ))
            })?;

        trace!(script = %self.name, "Script context created");

        Ok(ScriptContext {
            engine,
            ast: self.ast.clone(),
            scope: Scope::new(),
            function: self.function,
            exported: self.exported,
            name: Arc::clone(&self.name),
        })
    }
}

impl fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledScript")
            .field("name", &self.name)
            .field("function", &self.function)
            .field("exported", &self.exported)
            .finish()
    }
}

/// One interpreter instance with its own globals and compiled entry point
pub struct ScriptContext {
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
    function: ScriptFunction,
    exported: bool,
    name: Arc<str>,
}

impl ScriptContext {
    /// Invoke the entry point
    ///
    /// Top-level statements are evaluated first and the scope is rewound
    /// afterwards, so nothing one call defines survives into the next.
    pub fn call(&mut self, args: Vec<Dynamic>) -> Result<Dynamic> {
        if !self.exported {
            return Err(ScriptError::NotInitialized {
                function: self.function.name.to_string(),
            });
        }

        let options = CallFnOptions::new().eval_ast(true).rewind_scope(true);
        let result = self.engine.call_fn_with_options::<Dynamic>(
            options,
            &mut self.scope,
            &self.ast,
            self.function.name,
            args,
        )?;

        Ok(result)
    }

    /// Engine, for type names and conversions of returned values
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Friendly type name of a value returned by this context
    pub fn type_name(&self, value: &Dynamic) -> String {
        marshal::type_name(&self.engine, value)
    }

    /// Script name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ScriptContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptContext")
            .field("name", &self.name)
            .field("function", &self.function)
            .finish()
    }
}
