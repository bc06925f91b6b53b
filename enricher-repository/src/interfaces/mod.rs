//! Interface definitions for the stream client.
//!
//! This module defines the abstract `StreamClient` trait that allows
//! for dependency injection and swappable messaging backends.

mod stream_client;

pub use stream_client::{GroupReadRequest, ReadPosition, StreamClient, StreamEntry};
