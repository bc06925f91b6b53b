//! Error types for the stream repository.

mod stream_error;

pub use stream_error::StreamError;
