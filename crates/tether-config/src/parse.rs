//! Parsing of the host's flat configuration map

use crate::types::{
    keys, DestinationConfig, HttpConfig, ScriptPaths, SourceConfig, DEFAULT_DESTINATION_METHOD,
    DEFAULT_POLLING_PERIOD, DEFAULT_SOURCE_METHOD, DEFAULT_TIMEOUT,
};
use crate::validator::{validate_destination, validate_source};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tether_core::{Error, RawConfig, Result};
use tracing::debug;
use url::Url;

const SHARED_KEYS: &[&str] = &[
    keys::URL,
    keys::METHOD,
    keys::HEADERS,
    keys::TIMEOUT,
    keys::VALIDATE_CONNECTION,
];

const SOURCE_KEYS: &[&str] = &[
    keys::POLLING_PERIOD,
    keys::SCRIPT_GET_REQUEST_DATA,
    keys::SCRIPT_PARSE_RESPONSE,
];

impl SourceConfig {
    /// Parse and validate a source configuration
    pub fn from_raw(raw: &RawConfig) -> Result<Self> {
        log_unknown_keys(raw, SOURCE_KEYS);

        let config = Self {
            http: HttpConfig::from_raw(raw, DEFAULT_SOURCE_METHOD)?,
            polling_period: optional_duration(raw, keys::POLLING_PERIOD)?
                .unwrap_or(DEFAULT_POLLING_PERIOD),
            scripts: ScriptPaths {
                get_request_data: optional_path(raw, keys::SCRIPT_GET_REQUEST_DATA),
                parse_response: optional_path(raw, keys::SCRIPT_PARSE_RESPONSE),
            },
            raw: raw.clone(),
        };

        validate_source(&config)?;
        Ok(config)
    }
}

impl DestinationConfig {
    /// Parse and validate a destination configuration
    pub fn from_raw(raw: &RawConfig) -> Result<Self> {
        log_unknown_keys(raw, &[]);

        let config = Self {
            http: HttpConfig::from_raw(raw, DEFAULT_DESTINATION_METHOD)?,
        };

        validate_destination(&config)?;
        Ok(config)
    }
}

impl HttpConfig {
    fn from_raw(raw: &RawConfig, default_method: &str) -> Result<Self> {
        let url = raw
            .get(keys::URL)
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Config(format!("\"{}\" is required", keys::URL)))?;

        let method = raw
            .get(keys::METHOD)
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .unwrap_or(default_method)
            .to_uppercase();

        let headers = match raw.get(keys::HEADERS) {
            Some(value) => parse_headers(value)?,
            None => Vec::new(),
        };

        let params = raw
            .iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(keys::PARAMS_PREFIX)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_string(), v.clone()))
            })
            .collect();

        let validate_connection = match raw.get(keys::VALIDATE_CONNECTION) {
            Some(value) => value.trim().parse::<bool>().map_err(|_| {
                Error::Config(format!(
                    "\"{}\" must be true or false, got {value:?}",
                    keys::VALIDATE_CONNECTION
                ))
            })?,
            None => false,
        };

        Ok(Self {
            url,
            method,
            headers,
            params,
            validate_connection,
            timeout: optional_duration(raw, keys::TIMEOUT)?.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// The configured URL with the static params merged in
    pub fn request_url(&self) -> Result<String> {
        self.add_params_to_url(&self.url)
    }

    /// Merge the static params into `url`'s query
    ///
    /// Existing query pairs are kept. The resulting query is encoded sorted by key.
    pub fn add_params_to_url(&self, url: &str) -> Result<String> {
        if self.params.is_empty() {
            return Ok(url.to_string());
        }

        let mut parsed =
            Url::parse(url).map_err(|e| Error::Config(format!("invalid URL {url:?}: {e}")))?;

        let mut query: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in parsed.query_pairs() {
            query.entry(k.into_owned()).or_default().push(v.into_owned());
        }
        for (k, v) in &self.params {
            query.entry(k.clone()).or_default().push(v.clone());
        }

        parsed.query_pairs_mut().clear().extend_pairs(
            query
                .iter()
                .flat_map(|(k, values)| values.iter().map(move |v| (k.as_str(), v.as_str()))),
        );

        Ok(parsed.to_string())
    }
}

/// Parse `Name: Value, Other: Value` into header pairs
pub fn parse_headers(value: &str) -> Result<Vec<(String, String)>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, val) = entry.split_once(':').ok_or_else(|| {
                Error::Config(format!(
                    "invalid header {entry:?}, expected format \"Name: Value\""
                ))
            })?;
            Ok((name.trim().to_string(), val.trim().to_string()))
        })
        .collect()
}

fn optional_duration(raw: &RawConfig, key: &str) -> Result<Option<Duration>> {
    raw.get(key)
        .map(|value| {
            humantime::parse_duration(value.trim())
                .map_err(|e| Error::Config(format!("invalid duration for \"{key}\": {e}")))
        })
        .transpose()
}

fn optional_path(raw: &RawConfig, key: &str) -> Option<PathBuf> {
    raw.get(key)
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
}

fn log_unknown_keys(raw: &RawConfig, role_keys: &[&str]) {
    for key in raw.keys() {
        let known = SHARED_KEYS.contains(&key.as_str())
            || role_keys.contains(&key.as_str())
            || key.starts_with(keys::PARAMS_PREFIX);
        if !known {
            debug!(key = %key, "Ignoring unknown configuration key");
        }
    }
}
