//! Pool of script contexts
//!
//! Each loan is exclusive. A context is never handed to two callers at once, and
//! it returns to the pool when the [`PooledContext`] guard drops, on every exit
//! path including errors and panics.

use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

use crate::bindings::ScriptLimits;
use crate::context::{CompiledScript, ScriptContext};
use crate::error::Result;
use crate::source::{ScriptFunction, ScriptSource};

/// Default number of idle contexts kept for reuse
pub fn default_max_idle() -> usize {
    num_cpus::get().max(8)
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Contexts created so far
    pub created: u64,
    /// Loans served by an idle context
    pub reused: u64,
    /// Contexts currently idle
    pub idle: usize,
}

impl PoolStats {
    /// Share of loans served without creating a context (0.0 to 1.0)
    pub fn reuse_rate(&self) -> f64 {
        let total = self.created + self.reused;
        if total == 0 {
            0.0
        } else {
            self.reused as f64 / total as f64
        }
    }
}

/// Lazily-growing pool of contexts for one script
pub struct ContextPool {
    script: CompiledScript,
    idle: Mutex<Vec<ScriptContext>>,
    max_idle: usize,
    created: AtomicU64,
    reused: AtomicU64,
}

impl ContextPool {
    /// Compile `source` and warm one context
    ///
    /// Fails if the script cannot be read, does not compile, does not export
    /// `function`, or its top-level statements fail.
    pub fn new(source: &ScriptSource, function: ScriptFunction) -> Result<Self> {
        Self::with_limits(source, function, ScriptLimits::default())
    }

    /// Like [`ContextPool::new`] with explicit engine limits
    pub fn with_limits(
        source: &ScriptSource,
        function: ScriptFunction,
        limits: ScriptLimits,
    ) -> Result<Self> {
        let script = CompiledScript::compile(source, function, limits)?;
        let pool = Self {
            script,
            idle: Mutex::new(Vec::new()),
            max_idle: default_max_idle(),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        };

        let warm = pool.create()?;
        pool.idle.lock().push(warm);

        debug!(script = %pool.script.name(), function = %function, "Script pool ready");
        Ok(pool)
    }

    /// Bound the number of idle contexts kept
    pub fn with_max_idle(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle.max(1);
        self
    }

    /// Borrow a context, creating one if none is idle
    pub fn acquire(&self) -> Result<PooledContext<'_>> {
        let idle = self.idle.lock().pop();
        let ctx = match idle {
            Some(ctx) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                ctx
            }
            None => self.create()?,
        };

        Ok(PooledContext {
            pool: self,
            ctx: Some(ctx),
        })
    }

    /// Script name
    pub fn name(&self) -> &str {
        self.script.name()
    }

    /// Entry point served by this pool
    pub fn function(&self) -> ScriptFunction {
        self.script.function()
    }

    /// Current statistics
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            idle: self.idle.lock().len(),
        }
    }

    fn create(&self) -> Result<ScriptContext> {
        let ctx = self.script.instantiate()?;
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(ctx)
    }

    fn release(&self, ctx: ScriptContext) {
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(ctx);
        } else {
            trace!(script = %self.script.name(), "Dropping surplus script context");
        }
    }
}

impl fmt::Debug for ContextPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPool")
            .field("script", &self.script)
            .field("max_idle", &self.max_idle)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Exclusive loan of a [`ScriptContext`]
pub struct PooledContext<'a> {
    pool: &'a ContextPool,
    ctx: Option<ScriptContext>,
}

impl Deref for PooledContext<'_> {
    type Target = ScriptContext;

    fn deref(&self) -> &ScriptContext {
        // Only `None` after drop
        self.ctx.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl DerefMut for PooledContext<'_> {
    fn deref_mut(&mut self) -> &mut ScriptContext {
        self.ctx.as_mut().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for PooledContext<'_> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            self.pool.release(ctx);
        }
    }
}

impl fmt::Debug for PooledContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PooledContext").field(&self.ctx).finish()
    }
}
