//! Producer module for the enrichment pipeline.
//!
//! Publishes enriched records to the output stream.

use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::errors::PipelineError;
use crate::retry::RetryPolicy;
use enricher_repository::StreamClient;
use enricher_shared::EnrichedRecord;

/// Configuration for the stream producer.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Stream to append enriched records to.
    pub stream: String,
    /// Entry field holding the JSON payload.
    pub payload_field: String,
    /// Approximate length cap for the output stream, if any.
    pub max_len: Option<usize>,
    /// Retry policy for transient append failures.
    pub retry: RetryPolicy,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            stream: "posts:enriched".to_string(),
            payload_field: "data".to_string(),
            max_len: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Producer that appends enriched records to the output stream.
///
/// The producer is responsible for:
/// - Serializing the records of one input message into a single entry
/// - Retrying transient substrate failures with backoff
pub struct StreamProducer {
    client: Arc<dyn StreamClient>,
    config: ProducerConfig,
}

impl StreamProducer {
    /// Create a new stream producer with the default configuration.
    pub fn new(client: Arc<dyn StreamClient>) -> Self {
        Self::with_config(client, ProducerConfig::default())
    }

    /// Create a new stream producer with custom configuration.
    pub fn with_config(client: Arc<dyn StreamClient>, config: ProducerConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Publish the enriched records of one input message.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The id of the appended output entry
    /// * `Err(PipelineError::PublishFailure)` - If the append failed with a
    ///   non-transient error or every attempt failed
    #[instrument(
        skip(self, records),
        fields(stream = %self.config.stream, record_count = records.len())
    )]
    pub async fn publish(&self, records: &[EnrichedRecord]) -> Result<String, PipelineError> {
        let payload = serde_json::to_string(records)?;
        let fields = [(self.config.payload_field.as_str(), payload.as_str())];
        let max_attempts = self.config.retry.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self
                .client
                .append(&self.config.stream, &fields, self.config.max_len)
                .await
            {
                Ok(id) => {
                    debug!(entry_id = %id, attempt = attempt, "Published enriched records");
                    return Ok(id);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let delay = self.config.retry.delay_after(attempt);
                    warn!(
                        error = %e,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Publish failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(error = %e, attempt = attempt, "Failed to publish enriched records");
                    return Err(PipelineError::publish(format!(
                        "append to {} failed after {} attempt(s): {}",
                        self.config.stream, attempt, e
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use enricher_repository::{GroupReadRequest, MemoryStreamClient, StreamEntry, StreamError};
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Stream client whose first `failures` appends fail with `error`.
    ///
    /// Everything else is delegated to an in-memory client.
    pub(crate) struct FlakyStreamClient {
        pub(crate) inner: MemoryStreamClient,
        failures: AtomicUsize,
        error: StreamError,
        pub(crate) append_calls: AtomicUsize,
    }

    impl FlakyStreamClient {
        pub(crate) fn new(failures: usize, error: StreamError) -> Self {
            Self {
                inner: MemoryStreamClient::new(),
                failures: AtomicUsize::new(failures),
                error,
                append_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl StreamClient for FlakyStreamClient {
        async fn create_group(
            &self,
            stream: &str,
            group: &str,
            start_id: &str,
        ) -> Result<(), StreamError> {
            self.inner.create_group(stream, group, start_id).await
        }

        async fn read_group(
            &self,
            request: &GroupReadRequest<'_>,
        ) -> Result<Vec<StreamEntry>, StreamError> {
            self.inner.read_group(request).await
        }

        async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<u64, StreamError> {
            self.inner.ack(stream, group, ids).await
        }

        async fn append(
            &self,
            stream: &str,
            fields: &[(&str, &str)],
            max_len: Option<usize>,
        ) -> Result<String, StreamError> {
            self.append_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(self.error.clone());
            }
            self.inner.append(stream, fields, max_len).await
        }

        async fn health_check(&self) -> Result<bool, StreamError> {
            self.inner.health_check().await
        }
    }

    fn record() -> EnrichedRecord {
        EnrichedRecord {
            source: "forum".to_string(),
            subsource: "threadA".to_string(),
            unix_timestamp: 1_700_000_000,
            utc_timestamp: None,
            posted_in: "general".to_string(),
            categories: BTreeSet::from(["PRODUCT".to_string()]),
            sentiment: "positive".to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_appends_json_array() {
        let client = Arc::new(FlakyStreamClient::new(0, StreamError::connection("unused")));
        let producer = StreamProducer::new(client.clone());

        producer.publish(&[record()]).await.unwrap();

        let entries = client.inner.entries("posts:enriched");
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0].field("data"),
            Some(r#"[{"source":"forum","subsource":"threadA","unix_timestamp":1700000000,"posted_in":"general","category":["PRODUCT"],"sentiment":"positive"}]"#)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let client = Arc::new(FlakyStreamClient::new(
            2,
            StreamError::connection("connection reset"),
        ));
        let producer = StreamProducer::new(client.clone());

        producer.publish(&[record()]).await.unwrap();

        assert_eq!(client.append_calls.load(Ordering::SeqCst), 3);
        assert_eq!(client.inner.len("posts:enriched"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail() {
        let client = Arc::new(FlakyStreamClient::new(
            5,
            StreamError::connection("connection reset"),
        ));
        let producer = StreamProducer::new(client.clone());

        let result = producer.publish(&[record()]).await;

        assert!(matches!(result, Err(PipelineError::PublishFailure(_))));
        assert_eq!(client.append_calls.load(Ordering::SeqCst), 3);
        assert!(client.inner.is_empty("posts:enriched"));
    }

    #[tokio::test]
    async fn test_non_transient_failure_is_not_retried() {
        let client = Arc::new(FlakyStreamClient::new(1, StreamError::command("WRONGTYPE")));
        let producer = StreamProducer::new(client.clone());

        let result = producer.publish(&[record()]).await;

        assert!(matches!(result, Err(PipelineError::PublishFailure(_))));
        assert_eq!(client.append_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_publish_trims_output_stream() {
        let client = Arc::new(FlakyStreamClient::new(0, StreamError::connection("unused")));
        let config = ProducerConfig {
            max_len: Some(2),
            ..ProducerConfig::default()
        };
        let producer = StreamProducer::with_config(client.clone(), config);

        for _ in 0..4 {
            producer.publish(&[record()]).await.unwrap();
        }

        assert_eq!(client.inner.len("posts:enriched"), 2);
    }
}
