//! HTTP source connector

use async_trait::async_trait;
use std::sync::Arc;
use tether_config::SourceConfig;
use tether_core::{CancellationToken, Error, Position, RawConfig, Record, Result, Source};
use tether_scripting::{ScriptRequestBuilder, ScriptResponseParser, ScriptSource};
use tracing::{debug, info};

use crate::client::HttpClient;
use crate::poller::PollEngine;

/// Polls an HTTP endpoint and emits one record per parsed item
#[derive(Debug, Default)]
pub struct HttpSource {
    config: Option<Arc<SourceConfig>>,
    engine: Option<PollEngine>,
}

impl HttpSource {
    /// Create an unconfigured source
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed configuration, once `configure` succeeded
    pub fn config(&self) -> Option<&SourceConfig> {
        self.config.as_deref()
    }

    /// The poll engine, once `open` succeeded
    pub fn engine(&self) -> Option<&PollEngine> {
        self.engine.as_ref()
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn configure(&mut self, config: &RawConfig) -> Result<()> {
        info!("Configuring source");
        let config = SourceConfig::from_raw(config)?;
        debug!(
            url = %config.http.url,
            method = %config.http.method,
            polling_period = ?config.polling_period,
            "Source configured"
        );
        self.config = Some(Arc::new(config));
        Ok(())
    }

    async fn open(&mut self, position: Option<Position>, cancel: &CancellationToken) -> Result<()> {
        let config = self
            .config
            .clone()
            .ok_or_else(|| Error::Config("source has not been configured".to_string()))?;

        let client = HttpClient::new(&config.http)?;
        if config.http.validate_connection {
            client.validate(&config.http.url, cancel).await?;
        }

        let mut engine = PollEngine::new(client, config.clone())?.resume_from(position);

        if let Some(path) = &config.scripts.get_request_data {
            let builder = ScriptRequestBuilder::new(&ScriptSource::file(path))?;
            engine = engine.with_request_builder(Arc::new(builder));
        }
        if let Some(path) = &config.scripts.parse_response {
            let parser = ScriptResponseParser::new(&ScriptSource::file(path))?;
            engine = engine.with_response_parser(Arc::new(parser));
        }

        info!(
            url = %config.http.url,
            position = %engine.state().position,
            "Source opened"
        );
        self.engine = Some(engine);
        Ok(())
    }

    async fn read(&mut self, cancel: &CancellationToken) -> Result<Record> {
        let engine = self.engine.as_mut().ok_or(Error::NotOpen)?;
        engine.next(cancel).await
    }

    async fn ack(&mut self, position: &Position) -> Result<()> {
        debug!(position = %position, "Got ack");
        Ok(())
    }

    async fn teardown(&mut self) -> Result<()> {
        if let Some(engine) = self.engine.take() {
            info!(cycles = engine.cycles(), buffered = engine.buffered(), "Source torn down");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawConfig {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_read_before_open() {
        let mut source = HttpSource::new();
        let err = source.read(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotOpen));
    }

    #[tokio::test]
    async fn test_open_requires_configure() {
        let mut source = HttpSource::new();
        let err = source
            .open(None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_teardown_without_open() {
        let mut source = HttpSource::new();
        source.teardown().await.unwrap();
    }

    #[tokio::test]
    async fn test_configure_rejects_missing_url() {
        let mut source = HttpSource::new();
        let err = source.configure(&raw(&[("method", "GET")])).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(source.config().is_none());
    }

    #[tokio::test]
    async fn test_missing_script_blocks_open() {
        let mut source = HttpSource::new();
        source
            .configure(&raw(&[
                ("url", "http://localhost:1/"),
                ("script.parseResponse", "/nonexistent/parse.rhai"),
            ]))
            .await
            .unwrap();

        let err = source
            .open(None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_initialization());
        assert!(source.engine().is_none());
    }
}
