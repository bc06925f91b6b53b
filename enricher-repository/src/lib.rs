//! # Enricher Repository
//!
//! This crate provides the trait and implementations for interacting with
//! the messaging substrate. It includes definitions for errors, the
//! `StreamClient` interface, a Redis Streams implementation and an
//! in-process implementation with the same consumer-group semantics.

pub mod config;
pub mod errors;
pub mod interfaces;
pub mod memory;
pub mod redis_streams;

pub use config::RedisConfig;
pub use errors::StreamError;
pub use interfaces::{GroupReadRequest, ReadPosition, StreamClient, StreamEntry};
pub use memory::MemoryStreamClient;
pub use redis_streams::RedisStreamClient;
