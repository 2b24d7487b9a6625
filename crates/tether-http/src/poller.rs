//! Poll and pagination engine
//!
//! Records are served from an in-memory FIFO buffer. When the buffer runs dry the
//! engine runs one poll cycle:
//!
//! 1. wait for the [`PollLimiter`]
//! 2. build the request URL (request builder, or the static URL plus `params`)
//! 3. send it and fail the cycle on a status of 300 or above
//! 4. parse the body (response parser, or [`fallback_record`])
//! 5. convert every record, buffer them in order and keep the parser's custom
//!    data for the next build
//!
//! A cycle that yields no records is reported as [`Error::BackoffRetry`].
//! Buffered records drain even after the token is cancelled; cancellation
//! interrupts the limiter wait, the HTTP call and script calls.
//!
//! Script calls run on the blocking pool. A cancelled call returns at once but its
//! thread runs on until the script finishes or hits its operation limit, and the
//! result is dropped.

use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tether_config::SourceConfig;
use tether_core::{CancellationToken, Error, Position, Record, Result, StructuredData};
use tether_scripting::{RequestBuilder, ResponseParser};
use tracing::{debug, trace};

use crate::client::HttpClient;
use crate::fallback::fallback_record;
use crate::limiter::PollLimiter;

/// Status at and above which a poll fails
pub const POLL_ERROR_STATUS: u16 = 300;

/// Resumption state owned by the engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionState {
    /// Position of the last record handed out, or the resume position
    pub position: Position,
    /// Custom data returned by the last parse
    pub custom_data: StructuredData,
}

/// Drives polls for one source
#[derive(Debug)]
pub struct PollEngine {
    client: HttpClient,
    config: Arc<SourceConfig>,
    limiter: PollLimiter,
    builder: Option<Arc<dyn RequestBuilder>>,
    parser: Option<Arc<dyn ResponseParser>>,
    state: PositionState,
    buffer: VecDeque<Record>,
    cycles: u64,
}

impl PollEngine {
    /// Create an engine without scripts
    pub fn new(client: HttpClient, config: Arc<SourceConfig>) -> Result<Self> {
        let limiter = PollLimiter::new(config.polling_period)?;
        Ok(Self {
            client,
            config,
            limiter,
            builder: None,
            parser: None,
            state: PositionState::default(),
            buffer: VecDeque::new(),
            cycles: 0,
        })
    }

    /// Build request URLs with `builder`
    pub fn with_request_builder(mut self, builder: Arc<dyn RequestBuilder>) -> Self {
        self.builder = Some(builder);
        self
    }

    /// Parse responses with `parser`
    pub fn with_response_parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Resume from a host-provided position
    pub fn resume_from(mut self, position: Option<Position>) -> Self {
        self.state.position = position.unwrap_or_default();
        self
    }

    /// Current resumption state
    pub fn state(&self) -> &PositionState {
        &self.state
    }

    /// Number of buffered records
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Number of completed poll cycles
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Return the next record, polling when the buffer is empty
    pub async fn next(&mut self, cancel: &CancellationToken) -> Result<Record> {
        if self.buffer.is_empty() {
            self.fill(cancel).await?;
        }

        let record = self.buffer.pop_front().ok_or(Error::BackoffRetry)?;
        self.state.position = record.position.clone();
        Ok(record)
    }

    /// Run one poll cycle and buffer its records
    async fn fill(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.limiter.wait(cancel).await?;

        let url = self.request_url(cancel).await?;
        let response = self
            .client
            .send(&url, None, cancel)
            .await?
            .error_for_status(POLL_ERROR_STATUS)?;

        let records = match &self.parser {
            Some(parser) => {
                let parser = Arc::clone(parser);
                let body = response.body.clone();
                let parsed = run_script(cancel, move || parser.parse(&body)).await?;
                let records = parsed
                    .records
                    .into_iter()
                    .map(|r| r.into_record())
                    .collect::<Result<Vec<_>>>()?;
                self.state.custom_data = parsed.custom_data;
                records
            }
            None => vec![fallback_record(&response, Utc::now())],
        };

        self.cycles += 1;
        debug!(
            url = %url,
            cycle = self.cycles,
            records = records.len(),
            "Poll cycle complete"
        );
        self.buffer.extend(records);
        Ok(())
    }

    async fn request_url(&self, cancel: &CancellationToken) -> Result<String> {
        match &self.builder {
            Some(builder) => {
                let builder = Arc::clone(builder);
                let config = Arc::clone(&self.config);
                let previous = self.state.custom_data.clone();
                let position = self.state.position.clone();
                let request = run_script(cancel, move || {
                    builder.build(&config.raw, &previous, &position)
                })
                .await?;
                trace!(url = %request.url, "Request built by script");
                Ok(request.url)
            }
            None => self.config.http.request_url(),
        }
    }
}

/// Run a script call off the async workers, returning early on cancellation
async fn run_script<T, F>(cancel: &CancellationToken, call: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(call);
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        joined = task => joined
            .map_err(|e| Error::ScriptExecution(format!("script task failed: {e}")))?,
    }
}
