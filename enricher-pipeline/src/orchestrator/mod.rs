//! Orchestrator module for the enrichment pipeline.
//!
//! Coordinates the consumer, enricher, and producer components and owns the
//! acknowledgment discipline: a message is acknowledged only after its
//! enriched records were published, or when it was dropped on purpose.

use std::fmt;

use futures::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use enricher_shared::{EnrichedRecord, InputRecord};

use crate::consumer::{StreamConsumer, StreamMessage};
use crate::errors::PipelineError;
use crate::processor::Enricher;
use crate::producer::StreamProducer;
use crate::retry::{Backoff, RetryPolicy};

/// States of the pipeline loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Starting,
    GroupReady,
    Polling,
    Processing,
    Publishing,
    Acking,
    ErrorBackoff,
    Stopped,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Starting => "STARTING",
            PipelineState::GroupReady => "GROUP_READY",
            PipelineState::Polling => "POLLING",
            PipelineState::Processing => "PROCESSING",
            PipelineState::Publishing => "PUBLISHING",
            PipelineState::Acking => "ACKING",
            PipelineState::ErrorBackoff => "ERROR_BACKOFF",
            PipelineState::Stopped => "STOPPED",
        };
        f.write_str(name)
    }
}

/// Outcome of one processed batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Messages delivered by the consumer.
    pub received: usize,
    /// Output entries appended, one per input message.
    pub published: usize,
    /// Input messages acknowledged.
    pub acknowledged: usize,
    /// Messages dropped because their payload could not be decoded.
    pub malformed: usize,
    /// Records dropped after exhausting enrichment attempts.
    pub dropped_records: usize,
    /// Messages left unacknowledged, to be delivered again.
    pub left_pending: usize,
}

impl BatchReport {
    /// Whether every received message was acknowledged.
    pub fn is_clean(&self) -> bool {
        self.left_pending == 0
    }
}

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Retry policy for enriching a single record.
    pub enrich_retry: RetryPolicy,
    /// First delay of the error backoff state (in milliseconds).
    pub backoff_initial_ms: u64,
    /// Upper bound of the error backoff delay (in milliseconds).
    pub backoff_max_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enrich_retry: RetryPolicy::default(),
            backoff_initial_ms: 500,
            backoff_max_ms: 30_000,
        }
    }
}

/// Cloneable handle that asks a running orchestrator to stop.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Trigger a graceful shutdown.
    ///
    /// A batch in flight is finished (published and acknowledged) first.
    pub fn shutdown(&self) {
        let _ = self.tx.send(());
    }
}

/// Orchestrator that coordinates the pipeline components.
///
/// The orchestrator:
/// - Makes sure the consumer group exists before reading
/// - Runs each batch through decode, enrich, publish and acknowledge
/// - Backs off on substrate failures and keeps going
/// - Stops between batches when shutdown is requested
pub struct Orchestrator {
    consumer: StreamConsumer,
    enricher: Enricher,
    producer: StreamProducer,
    config: OrchestratorConfig,
    state: PipelineState,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Orchestrator {
    /// Create a new orchestrator with the given components.
    pub fn new(consumer: StreamConsumer, enricher: Enricher, producer: StreamProducer) -> Self {
        Self::with_config(consumer, enricher, producer, OrchestratorConfig::default())
    }

    /// Create a new orchestrator with custom configuration.
    pub fn with_config(
        consumer: StreamConsumer,
        enricher: Enricher,
        producer: StreamProducer,
        config: OrchestratorConfig,
    ) -> Self {
        // Subscribed up front so a shutdown sent before `run` is not lost
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Self {
            consumer,
            enricher,
            producer,
            config,
            state: PipelineState::Starting,
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// A handle that can stop the orchestrator from another task.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Trigger a graceful shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    fn set_state(&mut self, state: PipelineState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Pipeline state change");
            self.state = state;
        }
    }

    /// Run the orchestrator.
    ///
    /// Blocks until a shutdown is requested. Only a failure to create the
    /// consumer group is returned as an error; everything after that is
    /// handled by backing off and retrying.
    #[instrument(
        skip(self),
        fields(
            stream = %self.consumer.config().stream,
            consumer = %self.consumer.config().consumer
        )
    )]
    pub async fn run(&mut self) -> Result<(), PipelineError> {
        info!("Starting enricher orchestrator");

        self.set_state(PipelineState::Starting);
        self.consumer.ensure_group().await?;
        self.set_state(PipelineState::GroupReady);
        info!(group = %self.consumer.config().group, "Consumer group ready");

        let mut backoff = Backoff::new(self.config.backoff_initial_ms, self.config.backoff_max_ms);

        loop {
            self.set_state(PipelineState::Polling);

            let received = tokio::select! {
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
                result = self.consumer.receive() => result,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(e) => {
                    if self.error_backoff(&mut backoff, &e.to_string()).await {
                        break;
                    }
                    continue;
                }
            };

            if messages.is_empty() {
                continue;
            }

            let report = self.process_batch(messages).await;
            if report.is_clean() {
                backoff.reset();
            } else if self
                .error_backoff(&mut backoff, "messages left pending after publish failure")
                .await
            {
                break;
            }
        }

        self.set_state(PipelineState::Stopped);
        info!("Orchestrator shutdown complete");
        Ok(())
    }

    /// Sleep in the error backoff state and rewind the consumer so pending
    /// messages are delivered again.
    ///
    /// Returns `true` if shutdown was requested during the sleep.
    async fn error_backoff(&mut self, backoff: &mut Backoff, reason: &str) -> bool {
        self.set_state(PipelineState::ErrorBackoff);
        self.consumer.rewind();

        let delay = backoff.next_delay();
        error!(
            reason = %reason,
            delay_ms = delay.as_millis() as u64,
            "Pipeline error, backing off"
        );

        tokio::select! {
            biased;
            _ = self.shutdown_rx.recv() => {
                info!("Received shutdown signal during backoff");
                true
            }
            _ = tokio::time::sleep(delay) => false,
        }
    }

    /// Process a batch of messages through the pipeline.
    ///
    /// Records are enriched concurrently; publishing starts once every record
    /// of the batch has been enriched or dropped. After the first failed
    /// publish the remaining messages are left pending untouched.
    #[instrument(skip(self, messages), fields(message_count = messages.len()))]
    pub async fn process_batch(&mut self, messages: Vec<StreamMessage>) -> BatchReport {
        let mut report = BatchReport {
            received: messages.len(),
            ..BatchReport::default()
        };

        self.set_state(PipelineState::Processing);

        let mut decoded: Vec<(StreamMessage, Vec<InputRecord>)> =
            Vec::with_capacity(messages.len());
        for message in messages {
            match message.decode() {
                Ok(records) => decoded.push((message, records)),
                Err(e) => {
                    warn!(message_id = %message.id, error = %e, "Dropping malformed message");
                    report.malformed += 1;
                    self.acknowledge(&message.id, &mut report).await;
                }
            }
        }

        let enricher = &self.enricher;
        let policy = &self.config.enrich_retry;
        let enriched = join_all(decoded.iter().map(|(_, records)| {
            join_all(
                records
                    .iter()
                    .map(|record| enrich_with_retry(enricher, policy, record)),
            )
        }))
        .await;

        self.set_state(PipelineState::Publishing);

        let mut publish_failed = false;
        for ((message, _), results) in decoded.iter().zip(enriched) {
            let records: Vec<EnrichedRecord> = results
                .into_iter()
                .filter_map(|result| match result {
                    Ok(record) => Some(record),
                    Err(e) => {
                        error!(message_id = %message.id, error = %e, "Dropping record");
                        report.dropped_records += 1;
                        None
                    }
                })
                .collect();

            if records.is_empty() {
                debug!(message_id = %message.id, "Nothing left to publish");
                self.acknowledge(&message.id, &mut report).await;
                continue;
            }

            if publish_failed {
                report.left_pending += 1;
                continue;
            }

            self.set_state(PipelineState::Publishing);
            match self.producer.publish(&records).await {
                Ok(entry_id) => {
                    debug!(message_id = %message.id, entry_id = %entry_id, "Published message");
                    report.published += 1;
                    self.set_state(PipelineState::Acking);
                    self.acknowledge(&message.id, &mut report).await;
                }
                Err(e) => {
                    error!(
                        message_id = %message.id,
                        error = %e,
                        "Publish failed, leaving message pending"
                    );
                    publish_failed = true;
                    report.left_pending += 1;
                }
            }
        }

        info!(
            received = report.received,
            published = report.published,
            acknowledged = report.acknowledged,
            malformed = report.malformed,
            dropped_records = report.dropped_records,
            left_pending = report.left_pending,
            "Batch processed"
        );

        report
    }

    async fn acknowledge(&self, message_id: &str, report: &mut BatchReport) {
        match self.consumer.ack(message_id).await {
            Ok(()) => report.acknowledged += 1,
            Err(e) => {
                error!(message_id = %message_id, error = %e, "Failed to acknowledge message");
                report.left_pending += 1;
            }
        }
    }
}

/// Enrich a record, retrying with backoff up to the policy's attempt limit.
async fn enrich_with_retry(
    enricher: &Enricher,
    policy: &RetryPolicy,
    record: &InputRecord,
) -> Result<EnrichedRecord, PipelineError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match enricher.enrich(record).await {
            Ok(enriched) => return Ok(enriched),
            Err(e) if attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    record_id = %record.record_id(),
                    attempt = attempt,
                    error = %e,
                    "Enrichment failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
