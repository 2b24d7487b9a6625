//! Configuration validation

use crate::types::{DestinationConfig, HttpConfig, SourceConfig, DESTINATION_METHODS, SOURCE_METHODS};
use tether_core::{Error, Result};
use url::Url;

/// Validate a source configuration
pub fn validate_source(config: &SourceConfig) -> Result<()> {
    validate_http(&config.http, SOURCE_METHODS)?;

    if config.polling_period.is_zero() {
        return Err(Error::Config("pollingPeriod must be > 0".to_string()));
    }

    Ok(())
}

/// Validate a destination configuration
pub fn validate_destination(config: &DestinationConfig) -> Result<()> {
    validate_http(&config.http, DESTINATION_METHODS)
}

fn validate_http(http: &HttpConfig, methods: &[&str]) -> Result<()> {
    let url = Url::parse(&http.url)
        .map_err(|e| Error::Config(format!("invalid url {:?}: {e}", http.url)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::Config(format!(
                "url scheme must be http or https, got {other:?}"
            )));
        }
    }

    if !methods.contains(&http.method.as_str()) {
        return Err(Error::Config(format!(
            "invalid method {:?}, expected one of {}",
            http.method,
            methods.join(", ")
        )));
    }

    if http.timeout.is_zero() {
        return Err(Error::Config("timeout must be > 0".to_string()));
    }

    if http.timeout.as_secs() > 300 {
        tracing::warn!(timeout = ?http.timeout, "timeout is very high (>5 minutes)");
    }

    if http.headers.iter().any(|(name, _)| name.is_empty()) {
        return Err(Error::Config("header name cannot be empty".to_string()));
    }

    Ok(())
}
