//! Enrichment stage.
//!
//! Derives categories and a sentiment label for input records using the
//! injected text models.

use std::sync::Arc;

use tracing::{debug, instrument};

use enricher_shared::{EnrichedRecord, InputRecord};

use crate::errors::PipelineError;
use crate::processor::categories::{normalize_categories, DEFAULT_TOP_K};
use crate::processor::collaborators::{CategoryExtractor, SentimentClassifier};

/// Enriches input records with categories and sentiment.
///
/// The enricher holds no per-record state: the same record always yields the
/// same output as long as the collaborators are deterministic.
pub struct Enricher {
    categories: Arc<dyn CategoryExtractor>,
    sentiment: Arc<dyn SentimentClassifier>,
    top_k: usize,
}

impl Enricher {
    /// Create a new enricher from its collaborators.
    pub fn new(
        categories: Arc<dyn CategoryExtractor>,
        sentiment: Arc<dyn SentimentClassifier>,
    ) -> Self {
        Self {
            categories,
            sentiment,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Keep `top_k` category candidates instead of the default 5.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Enrich a single record.
    ///
    /// # Returns
    ///
    /// * `Ok(EnrichedRecord)` - The record with its categories and sentiment
    /// * `Err(PipelineError::EnrichmentFailure)` - If a collaborator failed or
    ///   returned a label outside its label set
    #[instrument(skip_all, fields(record_id = %record.record_id()))]
    pub async fn enrich(&self, record: &InputRecord) -> Result<EnrichedRecord, PipelineError> {
        let (candidates, sentiment) = tokio::join!(
            self.categories.extract(&record.body, &record.posted_in),
            self.sentiment.classify(&record.body)
        );

        let candidates = candidates.map_err(|e| {
            PipelineError::enrichment(record.record_id(), format!("category extraction: {}", e))
        })?;
        let sentiment = sentiment.map_err(|e| {
            PipelineError::enrichment(record.record_id(), format!("sentiment: {}", e))
        })?;

        if !self.sentiment.labels().contains(&sentiment) {
            return Err(PipelineError::enrichment(
                record.record_id(),
                format!(
                    "sentiment label '{}' is not one of {:?}",
                    sentiment,
                    self.sentiment.labels()
                ),
            ));
        }

        let categories = normalize_categories(&candidates, self.top_k);
        debug!(categories = categories.len(), sentiment = %sentiment, "Enriched record");

        Ok(EnrichedRecord::new(record, categories, sentiment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::collaborators::ModelError;
    use async_trait::async_trait;
    use std::collections::BTreeSet;

    struct StubExtractor(Vec<String>);

    #[async_trait]
    impl CategoryExtractor for StubExtractor {
        async fn extract(&self, _text: &str, _context: &str) -> Result<Vec<String>, ModelError> {
            Ok(self.0.clone())
        }
    }

    struct StubClassifier {
        labels: Vec<String>,
        answer: Result<String, ModelError>,
    }

    impl StubClassifier {
        fn answering(label: &str) -> Self {
            Self {
                labels: vec!["positive".to_string(), "negative".to_string()],
                answer: Ok(label.to_string()),
            }
        }
    }

    #[async_trait]
    impl SentimentClassifier for StubClassifier {
        fn labels(&self) -> &[String] {
            &self.labels
        }

        async fn classify(&self, _text: &str) -> Result<String, ModelError> {
            self.answer.clone()
        }
    }

    fn record() -> InputRecord {
        InputRecord {
            source: "forum".to_string(),
            subsource: "threadA".to_string(),
            body: "I love this product".to_string(),
            posted_in: "general".to_string(),
            unix_timestamp: 1_700_000_000,
            utc_timestamp: None,
        }
    }

    fn enricher(categories: &[&str], classifier: StubClassifier) -> Enricher {
        let categories = categories.iter().map(|c| c.to_string()).collect();
        Enricher::new(Arc::new(StubExtractor(categories)), Arc::new(classifier))
    }

    #[tokio::test]
    async fn test_enrich_record() {
        let enricher = enricher(&["PRODUCT"], StubClassifier::answering("positive"));

        let enriched = enricher.enrich(&record()).await.unwrap();

        assert_eq!(enriched.categories, BTreeSet::from(["PRODUCT".to_string()]));
        assert_eq!(enriched.sentiment, "positive");
        assert_eq!(enriched.source, "forum");
        assert_eq!(enriched.unix_timestamp, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_enrich_is_repeatable() {
        let enricher = enricher(
            &["Big Data", "rust", "RUST", "async io", "tokio", "serde", "extra"],
            StubClassifier::answering("negative"),
        );

        let first = enricher.enrich(&record()).await.unwrap();
        let second = enricher.enrich(&record()).await.unwrap();

        assert_eq!(first, second);
        assert!(!first.categories.contains("EXTRA"));
        assert!(first.categories.contains("DATA"));
    }

    #[tokio::test]
    async fn test_classifier_error_fails_record() {
        let classifier = StubClassifier {
            labels: vec!["positive".to_string()],
            answer: Err(ModelError::new("model not loaded")),
        };
        let enricher = enricher(&["PRODUCT"], classifier);

        let err = enricher.enrich(&record()).await.unwrap_err();
        match err {
            PipelineError::EnrichmentFailure { record_id, cause } => {
                assert_eq!(record_id, "forum/threadA@1700000000");
                assert!(cause.contains("model not loaded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_label_fails_record() {
        let enricher = enricher(&["PRODUCT"], StubClassifier::answering("ecstatic"));

        let result = enricher.enrich(&record()).await;
        assert!(matches!(result, Err(PipelineError::EnrichmentFailure { .. })));
    }

    #[tokio::test]
    async fn test_custom_top_k() {
        let enricher =
            enricher(&["a", "b", "c"], StubClassifier::answering("positive")).with_top_k(2);

        let enriched = enricher.enrich(&record()).await.unwrap();
        assert_eq!(enriched.categories.len(), 2);
    }
}
