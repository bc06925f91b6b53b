//! Input and enriched record definitions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A post as written to the input stream by the upstream scraper.
///
/// Every field except `utc_timestamp` is required; a payload missing one of
/// them does not deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Site or network the post came from.
    pub source: String,
    /// Sub-area of the source (thread, channel, subreddit...).
    pub subsource: String,
    /// Post text.
    pub body: String,
    /// Surrounding context the post was made in.
    pub posted_in: String,
    /// Seconds since the epoch.
    pub unix_timestamp: i64,
    /// Human readable UTC timestamp, when the upstream provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_timestamp: Option<String>,
}

impl InputRecord {
    /// Identifier used when logging failures for this record.
    pub fn record_id(&self) -> String {
        format!("{}/{}@{}", self.source, self.subsource, self.unix_timestamp)
    }
}

/// An input record with its derived categories and sentiment label.
///
/// The post body is not carried over. Categories serialize under the
/// `category` key as a sorted array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub source: String,
    pub subsource: String,
    pub unix_timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_timestamp: Option<String>,
    pub posted_in: String,
    #[serde(rename = "category")]
    pub categories: BTreeSet<String>,
    pub sentiment: String,
}

impl EnrichedRecord {
    /// Build an enriched record from its source record and derived fields.
    pub fn new(record: &InputRecord, categories: BTreeSet<String>, sentiment: String) -> Self {
        Self {
            source: record.source.clone(),
            subsource: record.subsource.clone(),
            unix_timestamp: record.unix_timestamp,
            utc_timestamp: record.utc_timestamp.clone(),
            posted_in: record.posted_in.clone(),
            categories,
            sentiment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forum_record() -> InputRecord {
        InputRecord {
            source: "forum".to_string(),
            subsource: "threadA".to_string(),
            body: "I love this product".to_string(),
            posted_in: "general".to_string(),
            unix_timestamp: 1_700_000_000,
            utc_timestamp: None,
        }
    }

    #[test]
    fn test_input_record_requires_core_fields() {
        let missing_body = r#"{"source":"forum","subsource":"a","posted_in":"g","unix_timestamp":1}"#;
        assert!(serde_json::from_str::<InputRecord>(missing_body).is_err());

        let complete = r#"{"source":"forum","subsource":"a","body":"hi","posted_in":"g","unix_timestamp":1}"#;
        let record: InputRecord = serde_json::from_str(complete).unwrap();
        assert_eq!(record.utc_timestamp, None);
    }

    #[test]
    fn test_enriched_record_wire_shape() {
        let categories = BTreeSet::from(["PRODUCT".to_string()]);
        let enriched = EnrichedRecord::new(&forum_record(), categories, "positive".to_string());

        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "source": "forum",
                "subsource": "threadA",
                "unix_timestamp": 1700000000,
                "posted_in": "general",
                "category": ["PRODUCT"],
                "sentiment": "positive"
            })
        );
    }

    #[test]
    fn test_enriched_record_keeps_utc_timestamp() {
        let mut record = forum_record();
        record.utc_timestamp = Some("2023-11-14 22:13:20".to_string());

        let enriched = EnrichedRecord::new(&record, BTreeSet::new(), "neutral".to_string());
        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value["utc_timestamp"], "2023-11-14 22:13:20");
        assert_eq!(value["category"], serde_json::json!([]));
    }

    #[test]
    fn test_record_id() {
        assert_eq!(forum_record().record_id(), "forum/threadA@1700000000");
    }
}
