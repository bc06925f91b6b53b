//! Stream client trait definition.
//!
//! This module defines the abstract interface over an append-only stream
//! substrate with consumer groups, so that the pipeline can run against
//! Redis Streams in production and an in-process substrate in tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::StreamError;

/// An entry read from a stream: the substrate-assigned id and its fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Entry id, used only for acknowledgment.
    pub id: String,
    /// Field/value pairs of the entry.
    pub fields: HashMap<String, String>,
}

impl StreamEntry {
    /// Create an entry from its id and fields.
    pub fn new(id: impl Into<String>, fields: HashMap<String, String>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Value of a single field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Which entries a group read should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPosition {
    /// Entries already delivered to this consumer but not yet acknowledged.
    Pending,
    /// Entries never delivered to any consumer of the group.
    New,
}

impl ReadPosition {
    /// The id argument the substrate expects for this position.
    pub fn as_id(&self) -> &'static str {
        match self {
            ReadPosition::Pending => "0",
            ReadPosition::New => ">",
        }
    }
}

/// Parameters of a consumer-group read.
#[derive(Debug, Clone)]
pub struct GroupReadRequest<'a> {
    pub stream: &'a str,
    pub group: &'a str,
    pub consumer: &'a str,
    pub position: ReadPosition,
    /// How long to wait for new entries. Ignored for pending reads.
    pub block: Duration,
    /// Upper bound on the number of entries returned.
    pub count: usize,
}

/// Abstract interface for stream operations.
///
/// Implementations must be `Send + Sync` so a single client can be shared
/// between the consumer and the producer.
#[async_trait]
pub trait StreamClient: Send + Sync {
    /// Create a consumer group on `stream`, creating the stream if absent.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the group was created
    /// * `Err(StreamError::GroupExists)` - If the group already exists
    /// * `Err(StreamError)` - For any other failure
    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start_id: &str,
    ) -> Result<(), StreamError>;

    /// Read entries on behalf of a consumer in a group.
    ///
    /// For [`ReadPosition::New`] this blocks up to `request.block` when no
    /// entry is available and returns an empty vector on timeout.
    async fn read_group(
        &self,
        request: &GroupReadRequest<'_>,
    ) -> Result<Vec<StreamEntry>, StreamError>;

    /// Acknowledge entries, removing them from the group's pending list.
    ///
    /// Returns the number of entries that were pending.
    async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<u64, StreamError>;

    /// Append an entry to `stream`, optionally trimming it to roughly `max_len`.
    ///
    /// Returns the id assigned to the new entry.
    async fn append(
        &self,
        stream: &str,
        fields: &[(&str, &str)],
        max_len: Option<usize>,
    ) -> Result<String, StreamError>;

    /// Check whether the substrate is reachable.
    async fn health_check(&self) -> Result<bool, StreamError>;
}
