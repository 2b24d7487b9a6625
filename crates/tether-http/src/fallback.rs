//! Default record policy when no response parser is configured
//!
//! Each response becomes exactly one create record carrying the raw body. The
//! position and key are derived from the read time; they only distinguish
//! responses from each other.

use chrono::{DateTime, Utc};
use tether_core::{metadata, Data, Metadata, Position, Record};

use crate::client::HttpResponse;

/// Separator for multi-valued headers
pub const HEADER_VALUE_SEPARATOR: &str = ",";

/// Build the record for a response read at `at`
pub fn fallback_record(response: &HttpResponse, at: DateTime<Utc>) -> Record {
    let nanos = metadata::unix_nanos(at);

    let mut meta = header_metadata(response);
    metadata::set_read_at(&mut meta, at);

    Record::create(
        Position::from(format!("unix-{}", nanos)),
        meta,
        Some(Data::raw(nanos.to_string())),
        Data::Raw(response.body.clone()),
    )
}

fn header_metadata(response: &HttpResponse) -> Metadata {
    response
        .headers
        .keys()
        .map(|name| {
            let values: Vec<_> = response
                .headers
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect();
            (
                canonical_header_name(name.as_str()),
                values.join(HEADER_VALUE_SEPARATOR),
            )
        })
        .collect()
}

/// `x-foo-bar` → `X-Foo-Bar`
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => {
                    let mut word = first.to_ascii_uppercase().to_string();
                    word.push_str(&chars.as_str().to_ascii_lowercase());
                    word
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
