//! Configuration types

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tether_core::RawConfig;

/// Recognised configuration keys
pub mod keys {
    /// Endpoint URL
    pub const URL: &str = "url";
    /// HTTP method
    pub const METHOD: &str = "method";
    /// Comma-separated `Name: Value` headers
    pub const HEADERS: &str = "headers";
    /// Prefix of query parameters (`params.<name>`)
    pub const PARAMS_PREFIX: &str = "params.";
    /// How often the source polls
    pub const POLLING_PERIOD: &str = "pollingPeriod";
    /// Per-request timeout
    pub const TIMEOUT: &str = "timeout";
    /// Whether `open` pings the URL with a HEAD request
    pub const VALIDATE_CONNECTION: &str = "validateConnection";
    /// Path of the request builder script
    pub const SCRIPT_GET_REQUEST_DATA: &str = "script.getRequestData";
    /// Path of the response parser script
    pub const SCRIPT_PARSE_RESPONSE: &str = "script.parseResponse";
}

/// Default polling period (5 minutes)
pub const DEFAULT_POLLING_PERIOD: Duration = Duration::from_secs(300);

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default source method
pub const DEFAULT_SOURCE_METHOD: &str = "GET";

/// Default destination method
pub const DEFAULT_DESTINATION_METHOD: &str = "POST";

/// Methods a source may poll with
pub const SOURCE_METHODS: &[&str] = &["GET", "HEAD", "OPTIONS", "POST", "PUT", "PATCH", "DELETE"];

/// Methods a destination may send with
pub const DESTINATION_METHODS: &[&str] = &["POST", "PUT", "DELETE", "PATCH"];

/// Settings shared by the source and destination
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Endpoint URL
    pub url: String,
    /// HTTP method (upper case)
    pub method: String,
    /// Static request headers, in configuration order
    pub headers: Vec<(String, String)>,
    /// Static query parameters
    pub params: BTreeMap<String, String>,
    /// Ping the URL during `open`
    pub validate_connection: bool,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpConfig {
    /// Create a config for `url` with defaults
    pub fn new(url: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: Vec::new(),
            params: BTreeMap::new(),
            validate_connection: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Paths of the user scripts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptPaths {
    /// Script defining `getRequestData`
    pub get_request_data: Option<PathBuf>,
    /// Script defining `parseResponse`
    pub parse_response: Option<PathBuf>,
}

/// Source connector configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    /// HTTP settings
    pub http: HttpConfig,
    /// Minimum spacing between polls
    pub polling_period: Duration,
    /// User scripts
    pub scripts: ScriptPaths,
    /// The raw configuration, as handed to the request builder script
    pub raw: RawConfig,
}

/// Destination connector configuration
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationConfig {
    /// HTTP settings
    pub http: HttpConfig,
}
