//! Fragment reassembly.
//!
//! Buffers are keyed by `(sender address, request id)`. A fragment is stored at its
//! sequence number; once every sequence number in `0..total` is present the payloads
//! are concatenated in order and handed back. Duplicate fragments overwrite nothing and
//! never complete a buffer twice.

use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::protocol::Fragment;

type BufferKey = (SocketAddr, i32);

struct PartialMessage {
    total: i32,
    chunks: BTreeMap<i32, Vec<u8>>,
    started: Instant,
}

pub struct Reassembler {
    buffers: HashMap<BufferKey, PartialMessage>,
    /// Recently completed keys, so late duplicates are not delivered again.
    completed: HashMap<BufferKey, Instant>,
    timeout: Duration,
}

impl Reassembler {
    pub fn new(timeout: Duration) -> Self {
        Self {
            buffers: HashMap::new(),
            completed: HashMap::new(),
            timeout,
        }
    }

    pub fn accept(&mut self, from: SocketAddr, fragment: Fragment) -> Option<Vec<u8>> {
        self.accept_at(from, fragment, Instant::now())
    }

    /// Stores `fragment`; returns the full payload when it completes its message.
    pub fn accept_at(&mut self, from: SocketAddr, fragment: Fragment, now: Instant) -> Option<Vec<u8>> {
        let key = (from, fragment.request_id);

        if self.completed.contains_key(&key) {
            tracing::debug!(
                "Ignoring late fragment {} of completed response {} from {}",
                fragment.sequence,
                fragment.request_id,
                from
            );
            return None;
        }

        let partial = self.buffers.entry(key).or_insert_with(|| PartialMessage {
            total: fragment.total,
            chunks: BTreeMap::new(),
            started: now,
        });

        if partial.total != fragment.total {
            tracing::warn!(
                "Fragment {} of response {} from {} claims {} fragments, buffer expects {}",
                fragment.sequence,
                fragment.request_id,
                from,
                fragment.total,
                partial.total
            );
            return None;
        }

        partial
            .chunks
            .entry(fragment.sequence)
            .or_insert(fragment.payload);

        if partial.chunks.len() as i32 != partial.total {
            return None;
        }

        let partial = self.buffers.remove(&key)?;
        self.completed.insert(key, now);

        Some(partial.chunks.into_values().flatten().collect())
    }

    /// Drops incomplete buffers older than the timeout. Returns how many were dropped.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let before = self.buffers.len();

        self.buffers.retain(|(from, request_id), partial| {
            let alive = now.duration_since(partial.started) < timeout;
            if !alive {
                tracing::warn!(
                    "Discarding incomplete response {} from {} ({}/{} fragments)",
                    request_id,
                    from,
                    partial.chunks.len(),
                    partial.total
                );
            }
            alive
        });
        self.completed
            .retain(|_, finished| now.duration_since(*finished) < timeout);

        before - self.buffers.len()
    }

    /// Number of incomplete buffers.
    pub fn pending(&self) -> usize {
        self.buffers.len()
    }

    /// Number of completed keys still remembered for duplicate suppression.
    pub fn remembered(&self) -> usize {
        self.completed.len()
    }
}
