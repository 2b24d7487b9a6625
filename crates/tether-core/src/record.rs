//! Canonical record model
//!
//! A [`Record`] is the unit of change exchanged with the pipeline host. Sources
//! produce them, destinations consume them.

use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Key-ordered structured payload
pub type StructuredData = serde_json::Map<String, serde_json::Value>;

/// Record metadata (string to string)
pub type Metadata = BTreeMap<String, String>;

/// Well-known metadata keys
pub mod metadata {
    use super::Metadata;
    use chrono::{DateTime, Utc};

    /// Time at which the source read the record, in unix nanoseconds
    pub const READ_AT: &str = "tether.readAt";

    /// Set the read timestamp, keeping any value already present
    pub fn set_read_at(metadata: &mut Metadata, at: DateTime<Utc>) {
        metadata
            .entry(READ_AT.to_string())
            .or_insert_with(|| unix_nanos(at).to_string());
    }

    /// Unix nanoseconds for a timestamp, saturating outside the representable range
    pub fn unix_nanos(at: DateTime<Utc>) -> i64 {
        at.timestamp_nanos_opt().unwrap_or(i64::MAX)
    }
}

/// Opaque resumption checkpoint
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Position(Bytes);

impl Position {
    /// Create a position from raw bytes
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Empty position (start from the beginning)
    pub fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Raw bytes of the position
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether the position carries no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Position {
    fn from(value: &str) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<String> for Position {
    fn from(value: String) -> Self {
        Self(Bytes::from(value))
    }
}

impl From<Vec<u8>> for Position {
    fn from(value: Vec<u8>) -> Self {
        Self(Bytes::from(value))
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl Serialize for Position {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Kind of change a record describes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// A new entity was created
    #[default]
    Create,
    /// An existing entity changed
    Update,
    /// An entity was removed
    Delete,
    /// Entity read as part of a snapshot
    Snapshot,
}

impl Operation {
    /// Literal token for this operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Snapshot => "snapshot",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            "snapshot" => Ok(Operation::Snapshot),
            other => Err(Error::Conversion(format!("unknown operation {other:?}"))),
        }
    }
}

/// Record key or payload content
#[derive(Debug, Clone, PartialEq)]
pub enum Data {
    /// Opaque bytes
    Raw(Bytes),
    /// Key-ordered structured map
    Structured(StructuredData),
}

impl Data {
    /// Create raw data
    pub fn raw(bytes: impl Into<Bytes>) -> Self {
        Data::Raw(bytes.into())
    }

    /// Byte representation; structured data is encoded as JSON
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Data::Raw(bytes) => bytes.clone(),
            Data::Structured(map) => serde_json::to_vec(map)
                .map(Bytes::from)
                .unwrap_or_default(),
        }
    }

    /// Structured view, if this is structured data
    pub fn as_structured(&self) -> Option<&StructuredData> {
        match self {
            Data::Structured(map) => Some(map),
            Data::Raw(_) => None,
        }
    }
}

impl Serialize for Data {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Data::Raw(bytes) => serializer.serialize_str(&String::from_utf8_lossy(bytes)),
            Data::Structured(map) => map.serialize(serializer),
        }
    }
}

/// Before and after images of a change
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Change {
    /// State before the change
    pub before: Option<Data>,
    /// State after the change
    pub after: Option<Data>,
}

/// Canonical record
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Record {
    /// Resumption checkpoint for this record
    pub position: Position,
    /// Kind of change
    pub operation: Operation,
    /// Free-form metadata
    pub metadata: Metadata,
    /// Record key
    pub key: Option<Data>,
    /// Change payload
    pub payload: Change,
}

impl Record {
    /// Build a create record
    pub fn create(position: Position, metadata: Metadata, key: Option<Data>, after: Data) -> Self {
        Self {
            position,
            operation: Operation::Create,
            metadata,
            key,
            payload: Change {
                before: None,
                after: Some(after),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_operation_tokens() {
        for op in [
            Operation::Create,
            Operation::Update,
            Operation::Delete,
            Operation::Snapshot,
        ] {
            assert_eq!(op.as_str().parse::<Operation>().unwrap(), op);
        }
    }

    #[test]
    fn test_unknown_operation_is_conversion_error() {
        let err = "frobnicate".parse::<Operation>().unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn test_structured_to_bytes_is_json() {
        let mut map = StructuredData::new();
        map.insert("id".to_string(), serde_json::json!(1));
        let data = Data::Structured(map);
        assert_eq!(data.to_bytes(), Bytes::from_static(br#"{"id":1}"#));
    }

    #[test]
    fn test_read_at_keeps_existing_value() {
        let at = Utc.timestamp_opt(1, 0).unwrap();
        let mut meta = Metadata::new();
        metadata::set_read_at(&mut meta, at);
        assert_eq!(meta[metadata::READ_AT], "1000000000");

        meta.insert(metadata::READ_AT.to_string(), "42".to_string());
        metadata::set_read_at(&mut meta, at);
        assert_eq!(meta[metadata::READ_AT], "42");
    }

    #[test]
    fn test_record_serializes_raw_as_text() {
        let rec = Record::create(
            Position::from("p1"),
            Metadata::new(),
            Some(Data::raw("k")),
            Data::raw("hello"),
        );
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["position"], "p1");
        assert_eq!(json["operation"], "create");
        assert_eq!(json["payload"]["after"], "hello");
    }
}
