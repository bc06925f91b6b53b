//! Redis Streams implementation of the stream client.

mod client;

pub use client::RedisStreamClient;
