//! # Tether Core
//!
//! Core types, traits, and error handling shared by the Tether HTTP connectors.
//!
//! This crate provides the foundational abstractions used throughout the workspace:
//! - The canonical record model (position, operation, key, payload, metadata)
//! - The `Source` / `Destination` connector lifecycle traits
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod connector;
pub mod error;
pub mod record;

pub use connector::{Destination, RawConfig, Source};
pub use error::{Error, Result};
pub use record::{metadata, Change, Data, Metadata, Operation, Position, Record, StructuredData};

// Re-export the cancellation primitive every blocking connector call accepts
pub use tokio_util::sync::CancellationToken;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::connector::{Destination, RawConfig, Source};
    pub use crate::error::{Error, Result};
    pub use crate::record::{Change, Data, Metadata, Operation, Position, Record, StructuredData};
    pub use tokio_util::sync::CancellationToken;
}
