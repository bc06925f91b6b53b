//! # Enricher Pipeline
//!
//! This crate provides the pipeline components for consuming posts from an
//! input stream, enriching them with categories and sentiment, and
//! publishing the results to an output stream.
//!
//! ## Architecture
//!
//! The pipeline follows the Consumer-Processor-Producer pattern:
//!
//! 1. **Consumer**: Reads messages from the input stream under a consumer group
//! 2. **Processor**: Enriches records with categories and sentiment
//! 3. **Producer**: Appends enriched records to the output stream
//! 4. **Orchestrator**: Coordinates the flow and acknowledges messages only
//!    once their results are published
//!
//! The **batch** runner reuses the processor for one-shot file-to-file runs.

pub mod batch;
pub mod consumer;
pub mod errors;
pub mod orchestrator;
pub mod processor;
pub mod producer;
pub mod retry;

pub use errors::PipelineError;
