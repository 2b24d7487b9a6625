//! # Tether HTTP
//!
//! HTTP source and destination connectors.
//!
//! The source polls a URL on a timer. A user script may build each request URL
//! (`getRequestData`) and turn each response into records (`parseResponse`); without
//! scripts every response becomes one record carrying the raw body. Custom data
//! returned by the parser is handed to the next request build, which is how
//! pagination cursors and sync tokens travel between polls.
//!
//! The destination sends one request per record with the record's payload as body.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod client;
pub mod destination;
pub mod fallback;
pub mod limiter;
pub mod poller;
pub mod source;

pub use client::{HttpClient, HttpResponse};
pub use destination::HttpDestination;
pub use limiter::PollLimiter;
pub use poller::{PollEngine, PositionState};
pub use source::HttpSource;

/// Prelude with commonly used types
pub mod prelude {
    pub use crate::destination::HttpDestination;
    pub use crate::source::HttpSource;
    pub use tether_core::prelude::*;
}
