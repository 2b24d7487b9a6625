//! Host-shaped values scripts construct and return
//!
//! Scripts create these through constructor functions (`Request()`, `Response()`,
//! `Record()`, `RawData(..)`, `StructuredData()`) and mutate them through
//! properties named after the host fields (`URL`, `CustomData`, `Records`,
//! `Position`, `Operation`, `Metadata`, `Key`, `Payload.Before`, `Payload.After`).

use rhai::{Array, Blob, Dynamic, Engine, Map};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use crate::url::ScriptUrl;

/// Value returned by `getRequestData`
#[derive(Debug, Clone, Default)]
pub struct ScriptRequest {
    /// Fully built request URL
    pub url: String,
}

/// Value returned by `parseResponse`
#[derive(Debug, Clone, Default)]
pub struct ScriptResponse {
    /// Data carried into the next `getRequestData` call
    pub custom_data: Map,
    /// Records, in emission order
    pub records: Array,
}

/// Before/after images of a script record
#[derive(Debug, Clone)]
pub struct ScriptPayload {
    /// State before the change
    pub before: Dynamic,
    /// State after the change
    pub after: Dynamic,
}

impl Default for ScriptPayload {
    fn default() -> Self {
        Self {
            before: Dynamic::UNIT,
            after: Dynamic::UNIT,
        }
    }
}

/// Record built by `parseResponse`
#[derive(Debug, Clone)]
pub struct ScriptRecord {
    /// String, blob, or `RawData`
    pub position: Dynamic,
    /// Operation token
    pub operation: Dynamic,
    /// Always initialised so scripts can index it directly
    pub metadata: Map,
    /// `RawData` or map
    pub key: Dynamic,
    /// Change payload
    pub payload: ScriptPayload,
}

impl Default for ScriptRecord {
    fn default() -> Self {
        Self {
            position: Dynamic::UNIT,
            operation: Dynamic::UNIT,
            metadata: Map::new(),
            key: Dynamic::UNIT,
            payload: ScriptPayload::default(),
        }
    }
}

/// Opaque bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawData(pub Blob);

impl RawData {
    /// Build raw data from any script value
    ///
    /// Strings and blobs keep their bytes; other values use their display form.
    pub fn from_dynamic(value: Dynamic) -> Self {
        if value.is_blob() {
            return Self(value.into_blob().unwrap_or_default());
        }
        if let Some(raw) = value.clone().try_cast::<RawData>() {
            return raw;
        }
        if value.is_unit() {
            return Self::default();
        }
        Self(value.to_string().into_bytes())
    }
}

impl fmt::Display for RawData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// The ambient `logger`
///
/// Messages become `tracing` events tagged with the script name and inherit the
/// caller's span.
#[derive(Debug, Clone)]
pub struct ScriptLogger {
    script: Arc<str>,
}

impl ScriptLogger {
    /// Logger for the named script
    pub fn new(script: impl Into<Arc<str>>) -> Self {
        Self {
            script: script.into(),
        }
    }

    /// Script name attached to every event
    pub fn script(&self) -> &str {
        &self.script
    }
}

fn message(value: &Dynamic) -> String {
    if value.is_string() {
        value.clone().into_string().unwrap_or_default()
    } else {
        value.to_string()
    }
}

/// Register `Request` / `RequestData`
pub(crate) fn install_request(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptRequest>("Request")
        .register_fn("Request", ScriptRequest::default)
        .register_fn("RequestData", ScriptRequest::default)
        .register_get_set(
            "URL",
            |r: &mut ScriptRequest| r.url.clone(),
            |r: &mut ScriptRequest, url: String| r.url = url,
        )
        .register_set("URL", |r: &mut ScriptRequest, url: ScriptUrl| {
            r.url = url.href();
        });
}

/// Register `Response` / `ResponseData`
pub(crate) fn install_response(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptResponse>("Response")
        .register_fn("Response", ScriptResponse::default)
        .register_fn("ResponseData", ScriptResponse::default)
        .register_get_set(
            "CustomData",
            |r: &mut ScriptResponse| r.custom_data.clone(),
            |r: &mut ScriptResponse, data: Map| r.custom_data = data,
        )
        .register_get_set(
            "Records",
            |r: &mut ScriptResponse| r.records.clone(),
            |r: &mut ScriptResponse, records: Array| r.records = records,
        );
}

/// Register `Record` and its payload
pub(crate) fn install_record(engine: &mut Engine) {
    engine
        .register_type_with_name::<ScriptRecord>("Record")
        .register_fn("Record", ScriptRecord::default)
        .register_get_set(
            "Position",
            |r: &mut ScriptRecord| r.position.clone(),
            |r: &mut ScriptRecord, v: Dynamic| r.position = v,
        )
        .register_get_set(
            "Operation",
            |r: &mut ScriptRecord| r.operation.clone(),
            |r: &mut ScriptRecord, v: Dynamic| r.operation = v,
        )
        .register_get_set(
            "Metadata",
            |r: &mut ScriptRecord| r.metadata.clone(),
            |r: &mut ScriptRecord, v: Map| r.metadata = v,
        )
        .register_get_set(
            "Key",
            |r: &mut ScriptRecord| r.key.clone(),
            |r: &mut ScriptRecord, v: Dynamic| r.key = v,
        )
        .register_get_set(
            "Payload",
            |r: &mut ScriptRecord| r.payload.clone(),
            |r: &mut ScriptRecord, v: ScriptPayload| r.payload = v,
        );

    engine
        .register_type_with_name::<ScriptPayload>("Payload")
        .register_get_set(
            "Before",
            |p: &mut ScriptPayload| p.before.clone(),
            |p: &mut ScriptPayload, v: Dynamic| p.before = v,
        )
        .register_get_set(
            "After",
            |p: &mut ScriptPayload| p.after.clone(),
            |p: &mut ScriptPayload, v: Dynamic| p.after = v,
        );
}

/// Register `RawData(..)` and `StructuredData()`
pub(crate) fn install_data(engine: &mut Engine) {
    engine
        .register_type_with_name::<RawData>("RawData")
        .register_fn("RawData", RawData::default)
        .register_fn("RawData", RawData::from_dynamic)
        .register_get("bytes", |r: &mut RawData| r.0.clone())
        .register_fn("len", |r: &mut RawData| r.0.len() as rhai::INT)
        .register_fn("to_string", |r: &mut RawData| r.to_string())
        .register_fn("to_debug", |r: &mut RawData| format!("RawData({r})"))
        .register_fn("==", |a: RawData, b: RawData| a == b)
        .register_fn("!=", |a: RawData, b: RawData| a != b);

    engine.register_fn("StructuredData", Map::new);
}

/// Register the `logger` type; the variable itself is resolved per engine
///
/// Levels are `Trace`, `Debug`, `Info`, `Warn` and `Error`. `debug` is a Rhai
/// keyword, so only the other levels also have lowercase spellings.
pub(crate) fn install_logger(engine: &mut Engine) {
    engine.register_type_with_name::<ScriptLogger>("Logger");

    for name in ["Trace", "trace"] {
        engine.register_fn(name, |l: &mut ScriptLogger, msg: Dynamic| {
            trace!(script = %l.script, "{}", message(&msg));
        });
    }
    engine.register_fn("Debug", |l: &mut ScriptLogger, msg: Dynamic| {
        debug!(script = %l.script, "{}", message(&msg));
    });
    for name in ["Info", "info"] {
        engine.register_fn(name, |l: &mut ScriptLogger, msg: Dynamic| {
            info!(script = %l.script, "{}", message(&msg));
        });
    }
    for name in ["Warn", "warn"] {
        engine.register_fn(name, |l: &mut ScriptLogger, msg: Dynamic| {
            warn!(script = %l.script, "{}", message(&msg));
        });
    }
    for name in ["Error", "error"] {
        engine.register_fn(name, |l: &mut ScriptLogger, msg: Dynamic| {
            error!(script = %l.script, "{}", message(&msg));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        crate::url::install_url(&mut engine);
        install_request(&mut engine);
        install_response(&mut engine);
        install_record(&mut engine);
        install_data(&mut engine);
        engine
    }

    #[test]
    fn test_record_metadata_is_initialised() {
        let rec: ScriptRecord = engine()
            .eval(r#"let r = Record(); r.Metadata["source"] = "api"; r"#)
            .unwrap();
        assert_eq!(rec.metadata["source"].clone().into_string().unwrap(), "api");
    }

    #[test]
    fn test_nested_payload_write_back() {
        let rec: ScriptRecord = engine()
            .eval(r#"let r = Record(); r.Payload.After = RawData("hello"); r"#)
            .unwrap();
        let after = rec.payload.after.try_cast::<RawData>().unwrap();
        assert_eq!(after.0, b"hello".to_vec());
        assert!(rec.payload.before.is_unit());
    }

    #[test]
    fn test_response_records_push_and_custom_data() {
        let resp: ScriptResponse = engine()
            .eval(
                r#"
                let resp = Response();
                resp.CustomData["nextPageToken"] = "tok2";
                resp.Records.push(Record());
                resp.Records.push(Record());
                resp
                "#,
            )
            .unwrap();
        assert_eq!(resp.records.len(), 2);
        assert_eq!(
            resp.custom_data["nextPageToken"].clone().into_string().unwrap(),
            "tok2"
        );
    }

    #[test]
    fn test_request_accepts_url_object() {
        let req: ScriptRequest = engine()
            .eval(r#"let r = RequestData(); r.URL = URL("http://example.com/a"); r"#)
            .unwrap();
        assert_eq!(req.url, "http://example.com/a");

        let req: ScriptRequest = engine()
            .eval(r#"let r = Request(); r.URL = "http://example.com/b"; r.URL += "?x=1"; r"#)
            .unwrap();
        assert_eq!(req.url, "http://example.com/b?x=1");
    }

    #[test]
    fn test_raw_data_variants() {
        let engine = engine();
        let empty: RawData = engine.eval("RawData()").unwrap();
        assert!(empty.0.is_empty());

        let text: RawData = engine.eval(r#"RawData("abc")"#).unwrap();
        assert_eq!(text.0, b"abc".to_vec());

        let number: RawData = engine.eval("RawData(42)").unwrap();
        assert_eq!(number.0, b"42".to_vec());

        let len: rhai::INT = engine.eval(r#"RawData("abcd").len()"#).unwrap();
        assert_eq!(len, 4);
    }
}
