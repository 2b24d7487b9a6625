//! Conversion between host values and script values
//!
//! Inbound values (configuration, previous custom data, positions, response
//! bodies) are converted eagerly. Outbound values are only accepted in the shapes
//! listed on each function.

use rhai::{Blob, Dynamic, Engine, EvalAltResult, Map, NativeCallContext};
use serde_json::{Map as JsonMap, Number, Value};
use tether_core::{Data, Metadata, Position, RawConfig, StructuredData};
use tracing::warn;

use crate::error::{Result, ScriptError};
use crate::types::RawData;
use crate::url::ScriptUrl;

/// Friendly type name of a script value
pub fn type_name(engine: &Engine, value: &Dynamic) -> String {
    engine.map_type_name(value.type_name()).to_string()
}

/// JSON value → script value
///
/// Integers that fit in `INT` stay integers, other numbers become `FLOAT`.
pub fn json_to_dynamic(value: Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from_bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Dynamic::from_int(i),
            None => Dynamic::from_float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => s.into(),
        Value::Array(items) => Dynamic::from_array(items.into_iter().map(json_to_dynamic).collect()),
        Value::Object(map) => Dynamic::from_map(json_object_to_map(map)),
    }
}

fn json_object_to_map(map: JsonMap<String, Value>) -> Map {
    map.into_iter()
        .map(|(k, v)| (k.into(), json_to_dynamic(v)))
        .collect()
}

/// Script value → JSON value
///
/// Blobs and `RawData` become (lossy UTF-8) strings and `URL` becomes its href.
/// Anything else without a JSON form is a type mismatch.
pub fn dynamic_to_json(engine: &Engine, value: Dynamic) -> Result<Value> {
    if value.is_unit() {
        return Ok(Value::Null);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Ok(Value::Number(i.into()));
    }
    if let Ok(f) = value.as_float() {
        return Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| ScriptError::type_mismatch("finite number", f.to_string()));
    }
    if let Ok(c) = value.as_char() {
        return Ok(Value::String(c.to_string()));
    }
    if value.is_string() {
        return Ok(Value::String(value.into_string().unwrap_or_default()));
    }
    if value.is_blob() {
        let blob = value.into_blob().unwrap_or_default();
        return Ok(Value::String(String::from_utf8_lossy(&blob).into_owned()));
    }
    if value.is_array() {
        let items = value.into_array().unwrap_or_default();
        return items
            .into_iter()
            .map(|item| dynamic_to_json(engine, item))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array);
    }
    if value.is_map() {
        let map = value.try_cast::<Map>().unwrap_or_default();
        return map_to_structured(engine, map).map(Value::Object);
    }
    if let Some(raw) = value.clone().try_cast::<RawData>() {
        return Ok(Value::String(raw.to_string()));
    }
    if let Some(url) = value.clone().try_cast::<ScriptUrl>() {
        return Ok(Value::String(url.href()));
    }

    Err(ScriptError::type_mismatch(
        "JSON-compatible value",
        type_name(engine, &value),
    ))
}

/// Script map → structured data
pub fn map_to_structured(engine: &Engine, map: Map) -> Result<StructuredData> {
    map.into_iter()
        .map(|(k, v)| Ok((k.to_string(), dynamic_to_json(engine, v)?)))
        .collect()
}

/// Structured data → script map
pub fn structured_to_map(data: &StructuredData) -> Map {
    json_object_to_map(data.clone())
}

/// Host configuration → script map of strings
pub fn config_to_map(config: &RawConfig) -> Map {
    config
        .iter()
        .map(|(k, v)| (k.as_str().into(), Dynamic::from(v.clone())))
        .collect()
}

/// Position → script blob
pub fn position_to_blob(position: &Position) -> Dynamic {
    Dynamic::from_blob(position.as_bytes().to_vec())
}

/// Bytes → script blob
pub fn bytes_to_blob(bytes: &[u8]) -> Dynamic {
    Dynamic::from_blob(bytes.to_vec())
}

/// Record position: string, blob, `RawData`, integer, or unit (empty)
pub fn to_position(engine: &Engine, value: Dynamic) -> Result<Position> {
    if value.is_unit() {
        return Ok(Position::empty());
    }
    if value.is_string() {
        return Ok(Position::from(value.into_string().unwrap_or_default()));
    }
    if value.is_blob() {
        return Ok(Position::from(value.into_blob().unwrap_or_default()));
    }
    if let Ok(i) = value.as_int() {
        return Ok(Position::from(i.to_string()));
    }
    if let Some(raw) = value.clone().try_cast::<RawData>() {
        return Ok(Position::from(raw.0));
    }
    Err(ScriptError::type_mismatch(
        "Position as string, blob or RawData",
        type_name(engine, &value),
    ))
}

/// Record operation: string or unit
pub fn to_operation(engine: &Engine, value: Dynamic) -> Result<Option<String>> {
    if value.is_unit() {
        return Ok(None);
    }
    if value.is_string() {
        return Ok(Some(value.into_string().unwrap_or_default()));
    }
    Err(ScriptError::type_mismatch(
        "Operation as string",
        type_name(engine, &value),
    ))
}

/// Record metadata; values are stringified
pub fn to_metadata(map: Map) -> Metadata {
    map.into_iter()
        .map(|(k, v)| {
            let value = if v.is_string() {
                v.into_string().unwrap_or_default()
            } else if v.is_unit() {
                String::new()
            } else {
                v.to_string()
            };
            (k.to_string(), value)
        })
        .collect()
}

/// Key or payload image: `RawData` → raw bytes, map → structured data
///
/// Other shapes are dropped with a warning.
pub fn to_data(engine: &Engine, field: &str, value: Dynamic) -> Option<Data> {
    if value.is_unit() {
        return None;
    }
    if let Some(raw) = value.clone().try_cast::<RawData>() {
        return Some(Data::raw(raw.0));
    }
    if value.is_map() {
        return match map_to_structured(engine, value.try_cast::<Map>().unwrap_or_default()) {
            Ok(map) => Some(Data::Structured(map)),
            Err(e) => {
                warn!(field, error = %e, "Dropping structured value that is not JSON-compatible");
                None
            }
        };
    }

    warn!(
        field,
        actual = %type_name(engine, &value),
        "Dropping value that is neither RawData nor a map"
    );
    None
}

fn json_error(e: serde_json::Error) -> Box<EvalAltResult> {
    format!("invalid JSON: {e}").into()
}

/// Register `parse_json`, `to_json` and `as_utf8`
pub(crate) fn install_json(engine: &mut Engine) {
    engine
        .register_fn("parse_json", |s: &str| -> std::result::Result<Dynamic, Box<EvalAltResult>> {
            serde_json::from_str(s).map(json_to_dynamic).map_err(json_error)
        })
        .register_fn("parse_json", |b: Blob| -> std::result::Result<Dynamic, Box<EvalAltResult>> {
            serde_json::from_slice(&b).map(json_to_dynamic).map_err(json_error)
        })
        .register_fn(
            "parse_json",
            |r: RawData| -> std::result::Result<Dynamic, Box<EvalAltResult>> {
                serde_json::from_slice(&r.0).map(json_to_dynamic).map_err(json_error)
            },
        )
        .register_fn(
            "to_json",
            |ctx: NativeCallContext<'_>, value: Dynamic| -> std::result::Result<String, Box<EvalAltResult>> {
                let json = dynamic_to_json(ctx.engine(), value).map_err(|e| e.to_string())?;
                Ok(json.to_string())
            },
        )
        .register_fn("as_utf8", |b: Blob| String::from_utf8_lossy(&b).into_owned())
        .register_fn("as_utf8", |r: RawData| r.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        crate::types::install_data(&mut engine);
        crate::url::install_url(&mut engine);
        install_json(&mut engine);
        engine
    }

    #[test]
    fn test_json_round_trip_through_script_values() {
        let engine = engine();
        let value = json!({
            "nextPageToken": "tok2",
            "count": 3,
            "ratio": 0.5,
            "done": false,
            "tags": ["a", "b"],
            "nested": {"cursor": null}
        });
        let back = dynamic_to_json(&engine, json_to_dynamic(value.clone())).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_function_pointer_is_type_mismatch() {
        let engine = engine();
        let fp: Dynamic = engine.eval(r#"fn next_page() { 1 } Fn("next_page")"#).unwrap();
        assert!(fp.is_fnptr());
        let err = dynamic_to_json(&engine, fp).unwrap_err();
        assert!(matches!(err, ScriptError::TypeMismatch { .. }));
    }

    #[test]
    fn test_structured_data_extraction() {
        let engine = engine();
        let value: Dynamic = engine
            .eval(r#"let s = StructuredData(); s.id = 7; s["name"] = "resource1"; s"#)
            .unwrap();
        let data = to_data(&engine, "Key", value).unwrap();
        let expected = json!({"id": 7, "name": "resource1"});
        assert_eq!(data.as_structured().cloned(), expected.as_object().cloned());
    }

    #[test]
    fn test_unknown_shape_is_absent() {
        let engine = engine();
        assert!(to_data(&engine, "Key", Dynamic::from("plain string")).is_none());
        assert!(to_data(&engine, "Key", Dynamic::from_int(1)).is_none());
        assert!(to_data(&engine, "Key", Dynamic::UNIT).is_none());
    }

    #[test]
    fn test_position_shapes() {
        let engine = engine();
        assert_eq!(
            to_position(&engine, Dynamic::from("xyz")).unwrap(),
            Position::from("xyz")
        );
        assert_eq!(
            to_position(&engine, Dynamic::from_blob(b"abc".to_vec())).unwrap(),
            Position::from("abc")
        );
        assert!(to_position(&engine, Dynamic::UNIT).unwrap().is_empty());
        assert!(to_position(&engine, Dynamic::from_bool(true)).is_err());
    }

    #[test]
    fn test_metadata_values_are_stringified() {
        let mut map = Map::new();
        map.insert("page".into(), Dynamic::from_int(2));
        map.insert("source".into(), Dynamic::from("api"));
        let meta = to_metadata(map);
        assert_eq!(meta["page"], "2");
        assert_eq!(meta["source"], "api");
    }

    #[test]
    fn test_parse_json_and_as_utf8() {
        let engine = engine();
        let mut scope = rhai::Scope::new();
        scope.push("body", Dynamic::from_blob(br#"{"id":"id-a"}"#.to_vec()));
        let id: String = engine
            .eval_with_scope(&mut scope, "parse_json(body).id")
            .unwrap();
        assert_eq!(id, "id-a");

        let text: String = engine
            .eval_with_scope(&mut scope, "as_utf8(body)")
            .unwrap();
        assert_eq!(text, r#"{"id":"id-a"}"#);

        let json: String = engine.eval(r#"to_json(#{a: [1, 2]})"#).unwrap();
        assert_eq!(json, r#"{"a":[1,2]}"#);
    }

    proptest! {
        #[test]
        fn prop_raw_data_preserves_bytes(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            let engine = engine();
            let mut scope = rhai::Scope::new();
            scope.push("input", Dynamic::from_blob(bytes.clone()));
            let value: Dynamic = engine.eval_with_scope(&mut scope, "RawData(input)").unwrap();

            match to_data(&engine, "After", value) {
                Some(Data::Raw(out)) => prop_assert_eq!(out.as_ref(), bytes.as_slice()),
                other => prop_assert!(false, "expected raw data, got {:?}", other),
            }
        }
    }
}
