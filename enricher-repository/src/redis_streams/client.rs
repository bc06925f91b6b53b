//! Redis Streams client implementation.
//!
//! This module provides the concrete implementation of `StreamClient` on top
//! of `XGROUP CREATE`, `XREADGROUP`, `XACK` and `XADD`.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamId, StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, Value};
use tracing::{debug, info, instrument};

use crate::config::RedisConfig;
use crate::errors::StreamError;
use crate::interfaces::{GroupReadRequest, ReadPosition, StreamClient, StreamEntry};

/// Redis Streams client with automatic reconnection.
///
/// The connection manager is cheap to clone; every call works on its own
/// clone so the client can be shared behind an `Arc`.
#[derive(Clone)]
pub struct RedisStreamClient {
    conn: ConnectionManager,
}

impl RedisStreamClient {
    /// Connect to the Redis server described by `config`.
    ///
    /// # Returns
    ///
    /// * `Ok(RedisStreamClient)` - A connected client
    /// * `Err(StreamError)` - If the URL is invalid or the server is unreachable
    pub async fn connect(config: &RedisConfig) -> Result<Self, StreamError> {
        let url = config.connection_url();
        let client = redis::Client::open(url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        info!(url = %config.redacted_url(), "Connected to Redis");

        Ok(Self { conn })
    }

    fn convert_entry(stream_id: StreamId) -> StreamEntry {
        let mut fields = HashMap::with_capacity(stream_id.map.len());

        for (key, value) in stream_id.map {
            let value = match value {
                Value::BulkString(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Value::SimpleString(s) => s,
                Value::Int(i) => i.to_string(),
                // Trimmed or deleted entries come back without a body
                _ => continue,
            };
            fields.insert(key, value);
        }

        StreamEntry::new(stream_id.id, fields)
    }
}

#[async_trait]
impl StreamClient for RedisStreamClient {
    #[instrument(skip(self))]
    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start_id: &str,
    ) -> Result<(), StreamError> {
        let mut conn = self.conn.clone();
        let _: () = conn.xgroup_create_mkstream(stream, group, start_id).await?;
        Ok(())
    }

    async fn read_group(
        &self,
        request: &GroupReadRequest<'_>,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        let mut conn = self.conn.clone();

        let mut options = StreamReadOptions::default()
            .group(request.group, request.consumer)
            .count(request.count);
        // BLOCK 0 would wait forever
        if request.position == ReadPosition::New && !request.block.is_zero() {
            options = options.block(request.block.as_millis() as usize);
        }

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[request.stream], &[request.position.as_id()], &options)
            .await?;

        let entries: Vec<StreamEntry> = reply
            .map(|reply| reply.keys)
            .unwrap_or_default()
            .into_iter()
            .flat_map(|key| key.ids)
            .map(Self::convert_entry)
            .collect();

        debug!(
            stream = %request.stream,
            position = ?request.position,
            count = entries.len(),
            "Read entries from stream"
        );

        Ok(entries)
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<u64, StreamError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.clone();
        let acked: u64 = conn.xack(stream, group, ids).await?;
        Ok(acked)
    }

    async fn append(
        &self,
        stream: &str,
        fields: &[(&str, &str)],
        max_len: Option<usize>,
    ) -> Result<String, StreamError> {
        let mut conn = self.conn.clone();

        let id: String = match max_len {
            Some(max_len) => {
                conn.xadd_maxlen(stream, StreamMaxlen::Approx(max_len), "*", fields)
                    .await?
            }
            None => conn.xadd(stream, "*", fields).await?,
        };

        Ok(id)
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        let mut conn = self.conn.clone();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}
