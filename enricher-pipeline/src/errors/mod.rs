//! Error types for the enrichment pipeline.

use enricher_repository::StreamError;
use thiserror::Error;

/// Errors that can occur in the enrichment pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A message payload could not be decoded into input records.
    #[error("Malformed message {message_id}: {reason}")]
    MalformedMessage { message_id: String, reason: String },

    /// A collaborator failed to enrich a single record.
    #[error("Enrichment failed for record {record_id}: {cause}")]
    EnrichmentFailure { record_id: String, cause: String },

    /// Enriched records could not be appended to the output stream.
    #[error("Publish failed: {0}")]
    PublishFailure(String),

    /// The consumer group could not be created.
    #[error("Consumer group creation failed: {0}")]
    GroupCreationFailure(String),

    /// The messaging substrate is unreachable or timing out.
    #[error("Substrate unavailable: {0}")]
    SubstrateUnavailable(String),

    /// Non-transient error reported by the messaging substrate.
    #[error("Stream error: {0}")]
    StreamError(StreamError),

    /// Error serializing or parsing JSON.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// IO error, in batch mode.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl PipelineError {
    /// Create a malformed message error.
    pub fn malformed(message_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            message_id: message_id.into(),
            reason: reason.into(),
        }
    }

    /// Create an enrichment failure.
    pub fn enrichment(record_id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::EnrichmentFailure {
            record_id: record_id.into(),
            cause: cause.into(),
        }
    }

    /// Create a publish failure.
    pub fn publish(msg: impl Into<String>) -> Self {
        Self::PublishFailure(msg.into())
    }
}

impl From<StreamError> for PipelineError {
    fn from(err: StreamError) -> Self {
        if err.is_transient() {
            Self::SubstrateUnavailable(err.to_string())
        } else {
            Self::StreamError(err)
        }
    }
}
