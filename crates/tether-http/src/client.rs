//! HTTP client shared by the source and destination

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tether_config::HttpConfig;
use tether_core::{CancellationToken, Error, Result};
use tracing::{debug, info};

/// Fully read response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body
    pub body: Bytes,
}

impl HttpResponse {
    /// Fail with [`Error::Status`] when the status is `limit` or above
    pub fn error_for_status(self, limit: u16) -> Result<Self> {
        if self.status >= limit {
            return Err(Error::Status {
                status: self.status,
                body: String::from_utf8_lossy(&self.body).into_owned(),
            });
        }
        Ok(self)
    }
}

/// Client configured with a method, static headers and a timeout
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    method: Method,
}

impl HttpClient {
    /// Build a client from connector settings
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let method = Method::from_bytes(config.method.as_bytes())
            .map_err(|_| Error::Config(format!("invalid HTTP method {:?}", config.method)))?;

        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(header_map(&config.headers)?)
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { inner, method })
    }

    /// Configured method
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Send a request with the configured method
    pub async fn send(
        &self,
        url: &str,
        body: Option<Bytes>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let mut request = self.inner.request(self.method.clone(), url);
        if let Some(body) = body {
            request = request.body(body);
        }

        debug!(method = %self.method, url, "Sending request");
        self.execute(request, cancel).await
    }

    /// Ping `url` with a HEAD request; a status of 400 or above fails
    pub async fn validate(&self, url: &str, cancel: &CancellationToken) -> Result<()> {
        let response = self.execute(self.inner.head(url), cancel).await?;
        response.error_for_status(400)?;
        info!(url, "Connection validated");
        Ok(())
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = request.send() => result.map_err(transport_error)?,
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            result = response.bytes() => result.map_err(transport_error)?,
        };

        debug!(status, bytes = body.len(), "Response received");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Transport(format!("request timed out: {}", err))
    } else {
        Error::Transport(err.to_string())
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::Config(format!("invalid header name {:?}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Config(format!("invalid value for header {}: {}", name, e)))?;
        map.append(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(url: &str, method: &str) -> HttpConfig {
        let mut config = HttpConfig::new(url, method);
        config.headers = vec![("Authorization".to_string(), "Bearer token".to_string())];
        config
    }

    #[tokio::test]
    async fn test_send_applies_method_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/items"))
            .and(header("authorization", "Bearer token"))
            .and(body_string("payload"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .expect(1)
            .mount(&server)
            .await;

        let url = format!("{}/items", server.uri());
        let client = HttpClient::new(&config(&url, "PUT")).unwrap();
        let response = client
            .send(&url, Some(Bytes::from_static(b"payload")), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status, 201);
        assert_eq!(response.body, Bytes::from_static(b"created"));
    }

    #[tokio::test]
    async fn test_error_for_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = HttpClient::new(&config(&server.uri(), "GET")).unwrap();
        let err = client
            .send(&server.uri(), None, &CancellationToken::new())
            .await
            .unwrap()
            .error_for_status(300)
            .unwrap_err();

        match err {
            Error::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "upstream down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validate_uses_head() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(&config(&server.uri(), "GET")).unwrap();
        client
            .validate(&server.uri(), &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_validate_rejects_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = HttpClient::new(&config(&server.uri(), "GET")).unwrap();
        let err = client
            .validate(&server.uri(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Status { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let client = HttpClient::new(&config(&server.uri(), "GET")).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = client.send(&server.uri(), None, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let mut config = config(&server.uri(), "GET");
        config.timeout = Duration::from_millis(100);
        let client = HttpClient::new(&config).unwrap();
        let err = client
            .send(&server.uri(), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(msg) if msg.contains("timed out")));
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let mut config = config("http://example.com", "GET");
        config.headers = vec![("Bad Header".to_string(), "x".to_string())];
        assert!(matches!(HttpClient::new(&config), Err(Error::Config(_))));
    }
}
