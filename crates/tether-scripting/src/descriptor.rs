//! Typed results of the request builder and response parser

use tether_core::{metadata, Change, Data, Error, Metadata, Operation, Position, Record, Result, StructuredData};

/// The request to issue for one poll cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    /// Fully built URL
    pub url: String,
}

impl RequestDescriptor {
    /// Request for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// What the parser extracted from one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseDescriptor {
    /// Data handed to the next request builder call
    pub custom_data: StructuredData,
    /// Records, in emission order
    pub records: Vec<IntermediateRecord>,
}

/// A record as produced by a parser, before canonical conversion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntermediateRecord {
    /// Resumption checkpoint
    pub position: Position,
    /// Operation token; absent or empty means create
    pub operation: Option<String>,
    /// Free-form metadata
    pub metadata: Metadata,
    /// Record key
    pub key: Option<Data>,
    /// Change payload
    pub payload: Change,
}

impl IntermediateRecord {
    /// Convert into a canonical record
    ///
    /// Fails with [`Error::Conversion`] when the operation token is not one of
    /// `create`, `update`, `delete` or `snapshot`.
    pub fn into_record(self) -> Result<Record> {
        let operation = match self.operation.as_deref() {
            None | Some("") => Operation::Create,
            Some(token) => token.parse::<Operation>().map_err(|_| {
                Error::Conversion(format!(
                    "record at position {:?} has unknown operation {token:?}",
                    self.position.to_string()
                ))
            })?,
        };

        let mut meta = self.metadata;
        metadata::set_read_at(&mut meta, chrono::Utc::now());

        Ok(Record {
            position: self.position,
            operation,
            metadata: meta,
            key: self.key,
            payload: self.payload,
        })
    }
}
