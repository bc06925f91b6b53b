//! Interfaces of the text models the enrichment stage calls into.
//!
//! The models themselves are black boxes; the pipeline only relies on these
//! input/output contracts.

use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a text model.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ModelError(String);

impl ModelError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Proposes topic categories for a post.
#[async_trait]
pub trait CategoryExtractor: Send + Sync {
    /// Candidate categories for `text` posted in `context`, best first.
    ///
    /// Candidates may repeat, differ in case or span several words; the
    /// enrichment stage normalizes them.
    async fn extract(&self, text: &str, context: &str) -> Result<Vec<String>, ModelError>;
}

/// Named-entity recognizer.
#[async_trait]
pub trait EntityRecognizer: Send + Sync {
    /// Entity mentions in `text`, in order of appearance.
    async fn entities(&self, text: &str) -> Result<Vec<String>, ModelError>;
}

/// Keyphrase extractor.
#[async_trait]
pub trait KeyphraseExtractor: Send + Sync {
    /// Keyphrases of `text`, highest scored first.
    async fn keyphrases(&self, text: &str) -> Result<Vec<String>, ModelError>;
}

/// Assigns one sentiment label to a text.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    /// The fixed set of labels `classify` may return.
    fn labels(&self) -> &[String];

    async fn classify(&self, text: &str) -> Result<String, ModelError>;
}
