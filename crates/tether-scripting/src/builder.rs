//! Request builder

use rhai::Dynamic;
use std::fmt;
use tether_core::{Position, RawConfig, Result, StructuredData};
use tracing::trace;

use crate::descriptor::RequestDescriptor;
use crate::error::ScriptError;
use crate::marshal;
use crate::pool::{ContextPool, PoolStats};
use crate::source::{ScriptFunction, ScriptSource};
use crate::types::ScriptRequest;

/// Builds the request for the next poll cycle
pub trait RequestBuilder: Send + Sync + fmt::Debug {
    /// Build the next request from the configuration, the custom data returned by
    /// the previous parse (empty on the first cycle) and the last emitted position
    fn build(
        &self,
        config: &RawConfig,
        previous: &StructuredData,
        position: &Position,
    ) -> Result<RequestDescriptor>;
}

/// [`RequestBuilder`] backed by a script exporting
/// `getRequestData(config, previousResponse, position)`
#[derive(Debug)]
pub struct ScriptRequestBuilder {
    pool: ContextPool,
}

impl ScriptRequestBuilder {
    /// Load and check the script
    pub fn new(source: &ScriptSource) -> Result<Self> {
        let pool = ContextPool::new(source, ScriptFunction::GET_REQUEST_DATA)?;
        Ok(Self { pool })
    }

    /// Use an existing pool
    pub fn from_pool(pool: ContextPool) -> Self {
        Self { pool }
    }

    /// Pool statistics
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl RequestBuilder for ScriptRequestBuilder {
    fn build(
        &self,
        config: &RawConfig,
        previous: &StructuredData,
        position: &Position,
    ) -> Result<RequestDescriptor> {
        let mut ctx = self.pool.acquire()?;

        let result = ctx.call(vec![
            Dynamic::from_map(marshal::config_to_map(config)),
            Dynamic::from_map(marshal::structured_to_map(previous)),
            marshal::position_to_blob(position),
        ])?;

        let actual = ctx.type_name(&result);
        let request = result
            .try_cast::<ScriptRequest>()
            .ok_or_else(|| ScriptError::type_mismatch("Request", actual))?;

        trace!(script = %ctx.name(), url = %request.url, "Request built");
        Ok(RequestDescriptor::new(request.url))
    }
}
