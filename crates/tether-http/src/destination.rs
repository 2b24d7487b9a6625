//! HTTP destination connector

use async_trait::async_trait;
use tether_config::DestinationConfig;
use tether_core::{CancellationToken, Data, Destination, Error, RawConfig, Record, Result};
use tracing::{debug, info};

use crate::client::HttpClient;

/// Status at and above which a write fails
pub const WRITE_ERROR_STATUS: u16 = 400;

/// Sends one HTTP request per record
#[derive(Debug, Default)]
pub struct HttpDestination {
    config: Option<DestinationConfig>,
    client: Option<HttpClient>,
    url: String,
}

impl HttpDestination {
    /// Create an unconfigured destination
    pub fn new() -> Self {
        Self::default()
    }

    /// Parsed configuration, once `configure` succeeded
    pub fn config(&self) -> Option<&DestinationConfig> {
        self.config.as_ref()
    }
}

#[async_trait]
impl Destination for HttpDestination {
    async fn configure(&mut self, config: &RawConfig) -> Result<()> {
        info!("Configuring destination");
        let config = DestinationConfig::from_raw(config)?;
        self.url = config.http.request_url()?;
        debug!(url = %self.url, method = %config.http.method, "Destination configured");
        self.config = Some(config);
        Ok(())
    }

    async fn open(&mut self, cancel: &CancellationToken) -> Result<()> {
        let config = self
            .config
            .as_ref()
            .ok_or_else(|| Error::Config("destination has not been configured".to_string()))?;

        let client = HttpClient::new(&config.http)?;
        if config.http.validate_connection {
            client.validate(&config.http.url, cancel).await?;
        }

        info!(url = %self.url, "Destination opened");
        self.client = Some(client);
        Ok(())
    }

    async fn write(&mut self, records: &[Record], cancel: &CancellationToken) -> Result<usize> {
        let client = self.client.as_ref().ok_or(Error::NotOpen)?;

        for (written, record) in records.iter().enumerate() {
            let body = record
                .payload
                .after
                .as_ref()
                .map(Data::to_bytes)
                .unwrap_or_default();

            let result = match client.send(&self.url, Some(body), cancel).await {
                Ok(response) => response.error_for_status(WRITE_ERROR_STATUS).map(|_| ()),
                Err(e) => Err(e),
            };

            if let Err(source) = result {
                return Err(Error::Write {
                    written,
                    source: Box::new(source),
                });
            }
            debug!(position = %record.position, "Record written");
        }

        Ok(records.len())
    }

    async fn teardown(&mut self) -> Result<()> {
        if self.client.take().is_some() {
            info!("Destination torn down");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_core::{Metadata, Position, StructuredData};
    use wiremock::matchers::{body_json, body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn raw(pairs: &[(&str, &str)]) -> RawConfig {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn record(position: &str, after: Data) -> Record {
        Record::create(Position::from(position), Metadata::new(), None, after)
    }

    async fn open(url: &str, extra: &[(&str, &str)]) -> HttpDestination {
        let mut pairs = vec![("url", url)];
        pairs.extend_from_slice(extra);
        let mut dest = HttpDestination::new();
        dest.configure(&raw(&pairs)).await.unwrap();
        dest.open(&CancellationToken::new()).await.unwrap();
        dest
    }

    #[tokio::test]
    async fn test_write_posts_each_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(query_param("source", "tether"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let url = format!("{}/ingest", server.uri());
        let mut dest = open(&url, &[("params.source", "tether")]).await;
        let written = dest
            .write(
                &[record("1", Data::raw("one")), record("2", Data::raw("two"))],
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(written, 2);
    }

    #[tokio::test]
    async fn test_structured_payload_is_json() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(body_json(json!({"id": 1, "name": "x"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut after = StructuredData::new();
        after.insert("id".to_string(), json!(1));
        after.insert("name".to_string(), json!("x"));

        let mut dest = open(&server.uri(), &[("method", "PUT")]).await;
        dest.write(&[record("1", Data::Structured(after))], &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failure_reports_written_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string("bad"))
            .respond_with(ResponseTemplate::new(422).set_body_string("rejected"))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut dest = open(&server.uri(), &[]).await;
        let err = dest
            .write(
                &[
                    record("1", Data::raw("good")),
                    record("2", Data::raw("bad")),
                    record("3", Data::raw("never sent")),
                ],
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            Error::Write { written, source } => {
                assert_eq!(written, 1);
                assert!(matches!(*source, Error::Status { status: 422, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_before_open() {
        let mut dest = HttpDestination::new();
        let err = dest
            .write(&[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotOpen));
    }

    #[tokio::test]
    async fn test_rejects_get_method() {
        let mut dest = HttpDestination::new();
        let err = dest
            .configure(&raw(&[("url", "http://example.com"), ("method", "GET")]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_teardown_without_open() {
        HttpDestination::new().teardown().await.unwrap();
    }
}
