//! Serialized Record Codec
//!
//! Converts a [`Person`] to and from the byte payload stored under a cache
//! entry key.

use bytes::Bytes;

use crate::domain::Person;
use crate::error::{Error, Result};

/// Encodes and decodes cache entry payloads.
pub trait RecordCodec: Send + Sync + std::fmt::Debug {
    /// Codec name, for logs.
    fn name(&self) -> &'static str;

    fn encode(&self, person: &Person) -> Result<Bytes>;

    fn decode(&self, payload: &[u8]) -> Result<Person>;
}

/// JSON payloads, field names in camelCase.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRecordCodec;

impl JsonRecordCodec {
    pub fn new() -> Self {
        Self
    }
}

impl RecordCodec for JsonRecordCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, person: &Person) -> Result<Bytes> {
        serde_json::to_vec(person)
            .map(Bytes::from)
            .map_err(|e| Error::Codec {
                operation: "encode",
                reason: e.to_string(),
            })
    }

    fn decode(&self, payload: &[u8]) -> Result<Person> {
        serde_json::from_slice(payload).map_err(|e| Error::Codec {
            operation: "decode",
            reason: e.to_string(),
        })
    }
}
