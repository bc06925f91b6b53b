//! Consumer module for the enrichment pipeline.
//!
//! Provides consumer-group reads of input messages from the input stream.

mod messages;
mod stream_consumer;

pub use messages::StreamMessage;
pub use stream_consumer::{ConsumerConfig, StreamConsumer};
