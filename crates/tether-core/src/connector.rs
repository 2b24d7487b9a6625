//! Connector lifecycle traits
//!
//! The pipeline host drives connectors through `configure → open → read/write → teardown`.
//! Every call that may block accepts a [`CancellationToken`]; a cancelled token must
//! unblock the call with [`Error::Cancelled`](crate::Error::Cancelled).

use crate::error::Result;
use crate::record::{Position, Record};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Flat host configuration (`key -> value`)
pub type RawConfig = BTreeMap<String, String>;

/// A connector that produces records
#[async_trait]
pub trait Source: Send + fmt::Debug {
    /// Parse and validate configuration
    async fn configure(&mut self, config: &RawConfig) -> Result<()>;

    /// Prepare resources and resume from `position` (if any)
    async fn open(&mut self, position: Option<Position>, cancel: &CancellationToken) -> Result<()>;

    /// Return the next record
    ///
    /// Returns [`Error::BackoffRetry`](crate::Error::BackoffRetry) when nothing is
    /// available yet; the host decides how long to wait before calling again.
    async fn read(&mut self, cancel: &CancellationToken) -> Result<Record>;

    /// Acknowledge that the host durably processed `position`
    async fn ack(&mut self, position: &Position) -> Result<()> {
        let _ = position;
        Ok(())
    }

    /// Release resources. Must succeed even if `open` was never called.
    async fn teardown(&mut self) -> Result<()>;
}

/// A connector that consumes records
#[async_trait]
pub trait Destination: Send + fmt::Debug {
    /// Parse and validate configuration
    async fn configure(&mut self, config: &RawConfig) -> Result<()>;

    /// Prepare resources
    async fn open(&mut self, cancel: &CancellationToken) -> Result<()>;

    /// Write records in order, returning how many were written
    async fn write(&mut self, records: &[Record], cancel: &CancellationToken) -> Result<usize>;

    /// Release resources. Must succeed even if `open` was never called.
    async fn teardown(&mut self) -> Result<()>;
}
