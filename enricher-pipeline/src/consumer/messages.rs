//! Message types for the consumer.
//!
//! Defines the envelope read from the input stream and its decoding into
//! input records.

use enricher_repository::StreamEntry;
use enricher_shared::InputRecord;
use serde_json::Value;

use crate::errors::PipelineError;

/// A message delivered from the input stream.
///
/// The `id` is only ever used to acknowledge the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub id: String,
    pub payload: String,
}

impl StreamMessage {
    pub fn new(id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
        }
    }

    /// Build a message from a stream entry, taking the payload from `field`.
    ///
    /// An entry without the field yields an empty payload, which fails to decode.
    pub fn from_entry(entry: StreamEntry, field: &str) -> Self {
        let payload = entry.field(field).unwrap_or_default().to_string();
        Self::new(entry.id, payload)
    }

    /// Decode the payload into input records.
    ///
    /// The payload is either a JSON array of records or a single record.
    pub fn decode(&self) -> Result<Vec<InputRecord>, PipelineError> {
        if self.payload.trim().is_empty() {
            return Err(PipelineError::malformed(&self.id, "payload is empty or missing"));
        }

        let value: Value = serde_json::from_str(&self.payload)
            .map_err(|e| PipelineError::malformed(&self.id, e.to_string()))?;

        let records = match value {
            Value::Array(_) => serde_json::from_value::<Vec<InputRecord>>(value),
            Value::Object(_) => serde_json::from_value::<InputRecord>(value).map(|r| vec![r]),
            other => {
                return Err(PipelineError::malformed(
                    &self.id,
                    format!("expected a record or an array of records, found {}", kind(&other)),
                ))
            }
        };

        records.map_err(|e| PipelineError::malformed(&self.id, e.to_string()))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const RECORD: &str = r#"{"source":"forum","subsource":"threadA","body":"I love this product","posted_in":"general","unix_timestamp":1700000000}"#;

    #[test]
    fn test_decode_single_record() {
        let records = StreamMessage::new("1-0", RECORD).decode().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].body, "I love this product");
    }

    #[test]
    fn test_decode_record_array() {
        let payload = format!("[{},{}]", RECORD, RECORD);
        let records = StreamMessage::new("1-0", payload).decode().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let payload = r#"{"source":"forum","subsource":"threadA","body":"hi","unix_timestamp":1}"#;
        let err = StreamMessage::new("7-0", payload).decode().unwrap_err();

        match err {
            PipelineError::MalformedMessage { message_id, reason } => {
                assert_eq!(message_id, "7-0");
                assert!(reason.contains("posted_in"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_rejects_invalid_json_and_scalars() {
        assert!(StreamMessage::new("1-0", "{not json").decode().is_err());
        assert!(StreamMessage::new("1-0", "42").decode().is_err());
        assert!(StreamMessage::new("1-0", "").decode().is_err());
    }

    #[test]
    fn test_from_entry_without_payload_field() {
        let entry = StreamEntry::new(
            "3-0",
            HashMap::from([("other".to_string(), RECORD.to_string())]),
        );
        let message = StreamMessage::from_entry(entry, "data");

        assert_eq!(message.id, "3-0");
        assert!(message.decode().is_err());
    }
}
