//! Processor module for the enrichment pipeline.
//!
//! Derives categories and sentiment for input records, plus the default
//! word-list models used when no external model is wired in.

mod categories;
mod collaborators;
mod enricher;
mod sentiment;

pub use categories::{
    normalize_categories, CapitalizedEntityRecognizer, CombinedCategoryExtractor,
    FrequencyKeyphraseExtractor, DEFAULT_TOP_K,
};
pub use collaborators::{
    CategoryExtractor, EntityRecognizer, KeyphraseExtractor, ModelError, SentimentClassifier,
};
pub use enricher::Enricher;
pub use sentiment::{LexiconSentimentClassifier, NEGATIVE, NEUTRAL, POSITIVE};
