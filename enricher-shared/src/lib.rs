//! # Enricher Shared
//!
//! Record types exchanged between the stream consumer, the enrichment
//! stage and the stream producer.

mod records;

pub use records::{EnrichedRecord, InputRecord};
