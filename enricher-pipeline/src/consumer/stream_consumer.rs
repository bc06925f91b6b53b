//! Consumer-group reader for the input stream.
//!
//! Reads input messages on behalf of a stable consumer identity and
//! acknowledges them once the coordinator is done with them.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use enricher_repository::{GroupReadRequest, ReadPosition, StreamClient, StreamEntry, StreamError};

use crate::consumer::messages::StreamMessage;
use crate::errors::PipelineError;

/// Configuration for the stream consumer.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Stream to read input messages from.
    pub stream: String,
    /// Consumer group name, shared by all pipeline instances.
    pub group: String,
    /// Identity of this instance inside the group. Must survive restarts.
    pub consumer: String,
    /// Entry field holding the JSON payload.
    pub payload_field: String,
    /// How long a read waits for new messages.
    pub block_timeout: Duration,
    /// Maximum number of messages per read.
    pub max_count: usize,
    /// Where a newly created group starts reading.
    pub start_id: String,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            stream: "posts".to_string(),
            group: "enricher".to_string(),
            consumer: "enricher-1".to_string(),
            payload_field: "data".to_string(),
            block_timeout: Duration::from_millis(5000),
            max_count: 10,
            start_id: "0".to_string(),
        }
    }
}

/// Consumer-group reader for input messages.
///
/// Starts by re-reading this consumer's pending entries, which are messages
/// delivered before a crash or left unacknowledged after a failed publish.
/// Once that backlog is empty it reads new messages.
pub struct StreamConsumer {
    client: Arc<dyn StreamClient>,
    config: ConsumerConfig,
    position: ReadPosition,
}

impl StreamConsumer {
    /// Create a new stream consumer.
    pub fn new(client: Arc<dyn StreamClient>, config: ConsumerConfig) -> Self {
        Self {
            client,
            config,
            position: ReadPosition::Pending,
        }
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Whether the next read targets the pending backlog.
    pub fn reading_backlog(&self) -> bool {
        self.position == ReadPosition::Pending
    }

    /// Make the next read go through the pending backlog again.
    pub fn rewind(&mut self) {
        self.position = ReadPosition::Pending;
    }

    /// Create the consumer group if it does not exist yet.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - If the group was created
    /// * `Ok(false)` - If the group already existed
    /// * `Err(PipelineError::GroupCreationFailure)` - For any other failure
    #[instrument(skip(self), fields(stream = %self.config.stream, group = %self.config.group))]
    pub async fn ensure_group(&self) -> Result<bool, PipelineError> {
        match self
            .client
            .create_group(&self.config.stream, &self.config.group, &self.config.start_id)
            .await
        {
            Ok(()) => {
                info!(start_id = %self.config.start_id, "Created consumer group");
                Ok(true)
            }
            Err(StreamError::GroupExists(_)) => {
                debug!("Consumer group already exists");
                Ok(false)
            }
            Err(e) => Err(PipelineError::GroupCreationFailure(e.to_string())),
        }
    }

    /// Receive up to `max_count` messages.
    ///
    /// Returns an empty vector when nothing arrived within the block timeout.
    pub async fn receive(&mut self) -> Result<Vec<StreamMessage>, PipelineError> {
        let mut entries = self.read(self.position).await?;

        if entries.is_empty() && self.position == ReadPosition::Pending {
            debug!(consumer = %self.config.consumer, "Pending backlog drained");
            self.position = ReadPosition::New;
            entries = self.read(ReadPosition::New).await?;
        }

        if !entries.is_empty() {
            debug!(
                count = entries.len(),
                backlog = self.reading_backlog(),
                "Received messages"
            );
        }

        Ok(entries
            .into_iter()
            .map(|entry| StreamMessage::from_entry(entry, &self.config.payload_field))
            .collect())
    }

    async fn read(&mut self, position: ReadPosition) -> Result<Vec<StreamEntry>, PipelineError> {
        let request = GroupReadRequest {
            stream: &self.config.stream,
            group: &self.config.group,
            consumer: &self.config.consumer,
            position,
            block: self.config.block_timeout,
            count: self.config.max_count,
        };

        match self.client.read_group(&request).await {
            Ok(entries) => Ok(entries),
            Err(StreamError::NoSuchGroup(msg)) => {
                // The stream was deleted under us; start over from a fresh group
                warn!(error = %msg, "Consumer group missing, recreating");
                self.ensure_group().await?;
                self.position = ReadPosition::Pending;
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Acknowledge a single message.
    pub async fn ack(&self, message_id: &str) -> Result<(), PipelineError> {
        let acked = self
            .client
            .ack(
                &self.config.stream,
                &self.config.group,
                &[message_id.to_string()],
            )
            .await?;

        if acked == 0 {
            // Already acknowledged, e.g. by a previous delivery of the same entry
            debug!(message_id = %message_id, "Message was not pending");
        }

        Ok(())
    }
}
