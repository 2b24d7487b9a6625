//! Response parser

use std::fmt;
use tether_core::{Change, Result};
use tracing::trace;

use crate::descriptor::{IntermediateRecord, ResponseDescriptor};
use crate::error::ScriptError;
use crate::marshal;
use crate::pool::{ContextPool, PoolStats};
use crate::source::{ScriptFunction, ScriptSource};
use crate::types::{ScriptRecord, ScriptResponse};

/// Turns a raw response body into custom data and records
pub trait ResponseParser: Send + Sync + fmt::Debug {
    /// Parse one response body
    fn parse(&self, body: &[u8]) -> Result<ResponseDescriptor>;
}

/// [`ResponseParser`] backed by a script exporting `parseResponse(body)`
#[derive(Debug)]
pub struct ScriptResponseParser {
    pool: ContextPool,
}

impl ScriptResponseParser {
    /// Load and check the script
    pub fn new(source: &ScriptSource) -> Result<Self> {
        let pool = ContextPool::new(source, ScriptFunction::PARSE_RESPONSE)?;
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

impl ResponseParser for ScriptResponseParser {
    fn parse(&self, body: &[u8]) -> Result<ResponseDescriptor> {
        let mut ctx = self.pool.acquire()?;

        let result = ctx.call(vec![marshal::bytes_to_blob(body)])?;

        let actual = ctx.type_name(&result);
        let response = result
            .try_cast::<ScriptResponse>()
            .ok_or_else(|| ScriptError::type_mismatch("Response", actual))?;

        let engine = ctx.engine();
        let custom_data = marshal::map_to_structured(engine, response.custom_data)?;

        let records = response
            .records
            .into_iter()
            .map(|value| {
                let actual = ctx.type_name(&value);
                let record = value
                    .try_cast::<ScriptRecord>()
                    .ok_or_else(|| ScriptError::type_mismatch("Record", actual))?;

                Ok(IntermediateRecord {
                    position: marshal::to_position(engine, record.position)?,
                    operation: marshal::to_operation(engine, record.operation)?,
                    metadata: marshal::to_metadata(record.metadata),
                    key: marshal::to_data(engine, "Key", record.key),
                    payload: Change {
                        before: marshal::to_data(engine, "Payload.Before", record.payload.before),
                        after: marshal::to_data(engine, "Payload.After", record.payload.after),
                    },
                })
            })
            .collect::<std::result::Result<Vec<_>, ScriptError>>()?;

        trace!(script = %ctx.name(), records = records.len(), "Response parsed");
        Ok(ResponseDescriptor {
            custom_data,
            records,
        })
    }
}
