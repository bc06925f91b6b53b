//! In-process stream client.
//!
//! Mirrors the consumer-group semantics of Redis Streams closely enough for
//! the pipeline to be exercised without a server: groups keep a delivery
//! cursor and a pending-entries list per consumer, pending entries are only
//! removed by `ack`, and new-entry reads block until an append or timeout.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::errors::StreamError;
use crate::interfaces::{GroupReadRequest, ReadPosition, StreamClient, StreamEntry};

#[derive(Debug, Default)]
struct GroupState {
    last_delivered: u64,
    /// seq -> consumer the entry was delivered to
    pending: BTreeMap<u64, String>,
}

#[derive(Debug, Default)]
struct MemoryStream {
    entries: BTreeMap<u64, HashMap<String, String>>,
    last_seq: u64,
    groups: HashMap<String, GroupState>,
}

fn entry_id(seq: u64) -> String {
    format!("{}-0", seq)
}

fn parse_seq(id: &str) -> Option<u64> {
    id.split('-').next()?.parse().ok()
}

/// Stream client that keeps every stream in process memory.
#[derive(Debug, Default)]
pub struct MemoryStreamClient {
    streams: Mutex<HashMap<String, MemoryStream>>,
    appended: Notify,
}

impl MemoryStreamClient {
    /// Create an empty substrate.
    pub fn new() -> Self {
        Self::default()
    }

    fn streams(&self) -> MutexGuard<'_, HashMap<String, MemoryStream>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of entries currently stored in `stream`.
    pub fn len(&self, stream: &str) -> usize {
        self.streams()
            .get(stream)
            .map(|s| s.entries.len())
            .unwrap_or(0)
    }

    /// Whether `stream` holds no entries.
    pub fn is_empty(&self, stream: &str) -> bool {
        self.len(stream) == 0
    }

    /// All entries of `stream`, oldest first.
    pub fn entries(&self, stream: &str) -> Vec<StreamEntry> {
        self.streams()
            .get(stream)
            .map(|s| {
                s.entries
                    .iter()
                    .map(|(seq, fields)| StreamEntry::new(entry_id(*seq), fields.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Ids of the entries pending in `group`, across all consumers.
    pub fn pending_ids(&self, stream: &str, group: &str) -> Vec<String> {
        self.streams()
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.keys().map(|seq| entry_id(*seq)).collect())
            .unwrap_or_default()
    }

    /// Take up to `count` entries for the consumer without waiting.
    fn take(&self, request: &GroupReadRequest<'_>) -> Result<Vec<StreamEntry>, StreamError> {
        let mut streams = self.streams();
        let missing = || {
            StreamError::NoSuchGroup(format!(
                "group '{}' on stream '{}'",
                request.group, request.stream
            ))
        };

        let stream = streams.get_mut(request.stream).ok_or_else(missing)?;
        let group = stream.groups.get_mut(request.group).ok_or_else(missing)?;

        let entries = match request.position {
            ReadPosition::Pending => group
                .pending
                .iter()
                .filter(|(_, consumer)| consumer.as_str() == request.consumer)
                .take(request.count)
                .map(|(seq, _)| {
                    // Deleted entries stay pending but come back without fields
                    let fields = stream.entries.get(seq).cloned().unwrap_or_default();
                    StreamEntry::new(entry_id(*seq), fields)
                })
                .collect(),
            ReadPosition::New => {
                let fresh: Vec<(u64, HashMap<String, String>)> = stream
                    .entries
                    .range(group.last_delivered + 1..)
                    .take(request.count)
                    .map(|(seq, fields)| (*seq, fields.clone()))
                    .collect();

                for (seq, _) in &fresh {
                    group.last_delivered = *seq;
                    group.pending.insert(*seq, request.consumer.to_string());
                }

                fresh
                    .into_iter()
                    .map(|(seq, fields)| StreamEntry::new(entry_id(seq), fields))
                    .collect()
            }
        };

        Ok(entries)
    }
}

#[async_trait]
impl StreamClient for MemoryStreamClient {
    async fn create_group(
        &self,
        stream: &str,
        group: &str,
        start_id: &str,
    ) -> Result<(), StreamError> {
        let mut streams = self.streams();
        let stream_state = streams.entry(stream.to_string()).or_default();

        if stream_state.groups.contains_key(group) {
            return Err(StreamError::GroupExists(group.to_string()));
        }

        let last_delivered = if start_id == "$" {
            stream_state.last_seq
        } else {
            parse_seq(start_id)
                .ok_or_else(|| StreamError::command(format!("Invalid stream ID '{}'", start_id)))?
        };

        stream_state.groups.insert(
            group.to_string(),
            GroupState {
                last_delivered,
                pending: BTreeMap::new(),
            },
        );

        Ok(())
    }

    async fn read_group(
        &self,
        request: &GroupReadRequest<'_>,
    ) -> Result<Vec<StreamEntry>, StreamError> {
        let deadline = Instant::now() + request.block;

        loop {
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let entries = self.take(request)?;
            if !entries.is_empty()
                || request.position == ReadPosition::Pending
                || Instant::now() >= deadline
            {
                return Ok(entries);
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, stream: &str, group: &str, ids: &[String]) -> Result<u64, StreamError> {
        let mut streams = self.streams();
        let Some(group) = streams.get_mut(stream).and_then(|s| s.groups.get_mut(group)) else {
            return Ok(0);
        };

        let acked = ids
            .iter()
            .filter_map(|id| parse_seq(id))
            .filter(|seq| group.pending.remove(seq).is_some())
            .count();

        Ok(acked as u64)
    }

    async fn append(
        &self,
        stream: &str,
        fields: &[(&str, &str)],
        max_len: Option<usize>,
    ) -> Result<String, StreamError> {
        let id = {
            let mut streams = self.streams();
            let stream_state = streams.entry(stream.to_string()).or_default();

            stream_state.last_seq += 1;
            let seq = stream_state.last_seq;
            stream_state.entries.insert(
                seq,
                fields
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            );

            if let Some(max_len) = max_len {
                while stream_state.entries.len() > max_len {
                    stream_state.entries.pop_first();
                }
            }

            entry_id(seq)
        };

        self.appended.notify_waiters();
        Ok(id)
    }

    async fn health_check(&self) -> Result<bool, StreamError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn request(position: ReadPosition) -> GroupReadRequest<'static> {
        GroupReadRequest {
            stream: "posts",
            group: "enricher",
            consumer: "worker-1",
            position,
            block: Duration::from_millis(50),
            count: 10,
        }
    }

    #[tokio::test]
    async fn test_create_group_twice_reports_exists() {
        let client = MemoryStreamClient::new();

        client.create_group("posts", "enricher", "0").await.unwrap();
        let second = client.create_group("posts", "enricher", "0").await;

        assert!(matches!(second, Err(StreamError::GroupExists(_))));
    }

    #[tokio::test]
    async fn test_entries_stay_pending_until_acked() {
        let client = MemoryStreamClient::new();
        client.create_group("posts", "enricher", "0").await.unwrap();
        let id = client.append("posts", &[("data", "{}")], None).await.unwrap();

        let delivered = client.read_group(&request(ReadPosition::New)).await.unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(client.pending_ids("posts", "enricher"), vec![id.clone()]);

        // Not redelivered as new, but visible in the consumer's backlog
        let fresh = client.read_group(&request(ReadPosition::New)).await.unwrap();
        assert!(fresh.is_empty());
        let backlog = client.read_group(&request(ReadPosition::Pending)).await.unwrap();
        assert_eq!(backlog[0].id, id);

        assert_eq!(client.ack("posts", "enricher", &[id.clone()]).await.unwrap(), 1);
        assert_eq!(client.ack("posts", "enricher", &[id]).await.unwrap(), 0);
        assert!(client.pending_ids("posts", "enricher").is_empty());
    }

    #[tokio::test]
    async fn test_group_from_tail_skips_existing_entries() {
        let client = MemoryStreamClient::new();
        client.append("posts", &[("data", "old")], None).await.unwrap();
        client.create_group("posts", "enricher", "$").await.unwrap();

        let entries = client.read_group(&request(ReadPosition::New)).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_read_without_group_fails() {
        let client = MemoryStreamClient::new();
        let result = client.read_group(&request(ReadPosition::New)).await;
        assert!(matches!(result, Err(StreamError::NoSuchGroup(_))));
    }

    #[tokio::test]
    async fn test_blocking_read_wakes_on_append() {
        let client = Arc::new(MemoryStreamClient::new());
        client.create_group("posts", "enricher", "0").await.unwrap();

        let reader = {
            let client = client.clone();
            tokio::spawn(async move {
                let mut req = request(ReadPosition::New);
                req.block = Duration::from_secs(5);
                client.read_group(&req).await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        client.append("posts", &[("data", "{}")], None).await.unwrap();

        let entries = reader.await.unwrap().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_append_trims_to_max_len() {
        let client = MemoryStreamClient::new();
        for i in 0..5 {
            let value = i.to_string();
            client
                .append("out", &[("data", value.as_str())], Some(3))
                .await
                .unwrap();
        }

        let entries = client.entries("out");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].field("data"), Some("2"));
    }
}
