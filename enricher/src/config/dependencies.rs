//! Dependency initialization and wiring for the enricher.

use std::sync::Arc;
use tracing::info;

use crate::config::Settings;
use crate::EnricherError;
use enricher_pipeline::{
    consumer::StreamConsumer,
    orchestrator::Orchestrator,
    processor::{
        CapitalizedEntityRecognizer, CombinedCategoryExtractor, Enricher,
        FrequencyKeyphraseExtractor, LexiconSentimentClassifier,
    },
    producer::StreamProducer,
};
use enricher_repository::{RedisStreamClient, StreamClient};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
}

impl Dependencies {
    /// Connect to Redis and wire the pipeline.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(EnricherError)` - If Redis cannot be reached
    pub async fn new(settings: &Settings) -> Result<Self, EnricherError> {
        info!(
            redis_host = %settings.redis.host,
            redis_port = settings.redis.port,
            input_stream = %settings.input_stream,
            output_stream = %settings.output_stream,
            consumer_group = %settings.consumer_group,
            consumer_name = %settings.consumer_name,
            "Initializing dependencies"
        );

        let client = RedisStreamClient::connect(&settings.redis)
            .await
            .map_err(|e| EnricherError::config(format!("Failed to connect to Redis: {}", e)))?;

        // Verify Redis is reachable
        let healthy = client
            .health_check()
            .await
            .map_err(|e| EnricherError::config(format!("Redis health check failed: {}", e)))?;

        if !healthy {
            return Err(EnricherError::config("Redis did not answer PING"));
        }

        info!("Redis connection verified");

        let client: Arc<dyn StreamClient> = Arc::new(client);
        let consumer = StreamConsumer::new(client.clone(), settings.consumer_config());
        let producer = StreamProducer::with_config(client, settings.producer_config());

        let orchestrator = Orchestrator::with_config(
            consumer,
            build_enricher(settings),
            producer,
            settings.orchestrator_config(),
        );

        Ok(Self { orchestrator })
    }
}

/// Build the enrichment stage from the built-in text models.
pub fn build_enricher(settings: &Settings) -> Enricher {
    let categories = CombinedCategoryExtractor::new(
        Arc::new(CapitalizedEntityRecognizer),
        Arc::new(FrequencyKeyphraseExtractor::default()),
    );

    Enricher::new(Arc::new(categories), Arc::new(LexiconSentimentClassifier::new()))
        .with_top_k(settings.category_top_k)
}
