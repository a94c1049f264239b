//! Bucketed stream table: id lookup, lifecycle, and the recently-reset ring (§4.3, §9).
//!
//! Grounded on the teacher's `proto::streams::store::Store`: a `slab::Slab` arena plus
//! an `id -> key` index, generalized per §9's design note from an unbounded `HashMap`
//! index into `STREAM_BUCKETS` separate chains (`id % B`), since the spec calls for
//! bucketed chaining explicitly while keeping the same observable `find`/`insert`/
//! `remove` shape.

use std::collections::VecDeque;

use slab::Slab;

use crate::error::{Error, Result};
use crate::frame::StreamId;
use crate::stream::{Accept, Stream};

/// Number of hash buckets backing the table (§6 compile-time knobs).
pub const STREAM_BUCKETS: usize = 61;

/// Length of the recently-reset ring (§6 compile-time knobs).
pub const STREAM_RESET_HISTORY: usize = 7;

/// Which endpoint originated a stream id, used for the parity/monotonicity/concurrency
/// invariants of §3. `Local` is this engine; `Remote` is the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Local,
    Remote,
}

struct Entry {
    side: Side,
    stream: Stream,
}

/// Opaque handle into the table, returned by `insert`/`find` and required by `free`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Key(usize);

/// Bucketed separate-chaining stream table plus the per-side id/count bookkeeping that
/// §3's invariants 1-3 require.
pub struct StreamTable {
    slab: Slab<Entry>,
    buckets: Vec<Vec<usize>>,
    is_server: bool,
    last_local: u32,
    last_remote: u32,
    count_local: usize,
    count_remote: usize,
    reset_ring: VecDeque<StreamId>,
}

impl StreamTable {
    pub fn new(is_server: bool) -> StreamTable {
        StreamTable {
            slab: Slab::new(),
            buckets: (0..STREAM_BUCKETS).map(|_| Vec::new()).collect(),
            is_server,
            last_local: 0,
            last_remote: 0,
            count_local: 0,
            count_remote: 0,
            reset_ring: VecDeque::with_capacity(STREAM_RESET_HISTORY),
        }
    }

    fn bucket_of(id: StreamId) -> usize {
        (id.as_u32() as usize) % STREAM_BUCKETS
    }

    fn expects_even(&self, side: Side) -> bool {
        match side {
            Side::Local => self.is_server,
            Side::Remote => !self.is_server,
        }
    }

    fn last_mut(&mut self, side: Side) -> &mut u32 {
        match side {
            Side::Local => &mut self.last_local,
            Side::Remote => &mut self.last_remote,
        }
    }

    pub fn last(&self, side: Side) -> u32 {
        match side {
            Side::Local => self.last_local,
            Side::Remote => self.last_remote,
        }
    }

    pub fn active_count(&self, side: Side) -> usize {
        match side {
            Side::Local => self.count_local,
            Side::Remote => self.count_remote,
        }
    }

    /// The next id this endpoint would use to originate a stream, without reserving it.
    /// Per §9's open-question decision, this errors rather than wrapping once the id
    /// space would be exhausted.
    pub fn next_local_id(&self) -> Result<StreamId> {
        let next = if self.last_local == 0 {
            if self.is_server {
                2
            } else {
                1
            }
        } else {
            self.last_local
                .checked_add(2)
                .ok_or(Error::Assertion("local stream id space exhausted"))?
        };
        if next > StreamId::MAX.as_u32() {
            return Err(Error::Assertion("local stream id space exhausted"));
        }
        Ok(StreamId::new(next))
    }

    /// Validates parity, monotonicity (§3 invariants 1-2), and `max_concurrent` (§3
    /// invariant 3), then inserts at the bucket head. Concurrency violations are
    /// `WouldBlock` for the local side (retriable) and a transport error for the remote
    /// side (peer misbehaved), per §7's propagation policy.
    pub fn insert(
        &mut self,
        id: StreamId,
        side: Side,
        accept: Accept,
        initial_send: i32,
        initial_recv: i32,
        max_concurrent: u32,
    ) -> Result<Key> {
        let want_even = self.expects_even(side);
        let is_even = id.as_u32() % 2 == 0;
        if is_even != want_even {
            return Err(match side {
                Side::Local => Error::Assertion("local stream id has wrong parity"),
                Side::Remote => Error::transport(crate::frame::Reason::PROTOCOL_ERROR),
            });
        }

        if id.as_u32() <= self.last(side) {
            return Err(match side {
                Side::Local => Error::Assertion("local stream id is not monotonically increasing"),
                Side::Remote => Error::transport(crate::frame::Reason::PROTOCOL_ERROR),
            });
        }

        let count = match side {
            Side::Local => self.count_local,
            Side::Remote => self.count_remote,
        };
        if (count as u32) >= max_concurrent {
            return Err(match side {
                Side::Local => Error::WouldBlock("max_concurrent_streams reached locally"),
                Side::Remote => Error::transport(crate::frame::Reason::REFUSED_STREAM),
            });
        }

        let stream = Stream::new(id, accept, initial_send, initial_recv);
        let key = self.slab.insert(Entry { side, stream });
        self.buckets[Self::bucket_of(id)].push(key);

        *self.last_mut(side) = id.as_u32();
        match side {
            Side::Local => self.count_local += 1,
            Side::Remote => self.count_remote += 1,
        }

        Ok(Key(key))
    }

    pub fn find(&self, id: StreamId) -> Option<Key> {
        let bucket = &self.buckets[Self::bucket_of(id)];
        bucket
            .iter()
            .copied()
            .find(|&key| self.slab[key].stream.id() == id)
            .map(Key)
    }

    pub fn get(&self, key: Key) -> &Stream {
        &self.slab[key.0].stream
    }

    pub fn get_mut(&mut self, key: Key) -> &mut Stream {
        &mut self.slab[key.0].stream
    }

    pub fn get_by_id(&self, id: StreamId) -> Option<&Stream> {
        self.find(id).map(|key| self.get(key))
    }

    pub fn get_by_id_mut(&mut self, id: StreamId) -> Option<&mut Stream> {
        self.find(id).map(|key| self.get_mut(key))
    }

    /// Unlinks and frees a stream, decrementing its side's active counter (§3
    /// lifecycle: "Destroyed when ...").
    pub fn free(&mut self, key: Key) {
        let entry = self.slab.remove(key.0);
        let bucket = &mut self.buckets[Self::bucket_of(entry.stream.id())];
        if let Some(pos) = bucket.iter().position(|&k| k == key.0) {
            bucket.swap_remove(pos);
        }
        match entry.side {
            Side::Local => self.count_local -= 1,
            Side::Remote => self.count_remote -= 1,
        }
    }

    /// Records a locally-initiated reset so a later frame for this id doesn't trigger a
    /// spurious connection error (§4.3, §4.5 "invalid-stream check (recently-reset
    /// tolerant)").
    pub fn mark_reset(&mut self, id: StreamId) {
        if self.reset_ring.len() == STREAM_RESET_HISTORY {
            self.reset_ring.pop_front();
        }
        self.reset_ring.push_back(id);
    }

    pub fn was_recently_reset(&self, id: StreamId) -> bool {
        self.reset_ring.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_accepts_odd_remote_even_local() {
        let mut t = StreamTable::new(true);
        assert!(t.insert(StreamId::new(1), Side::Remote, Accept::HEADERS, 0, 0, 10).is_ok());
        assert!(t.insert(StreamId::new(2), Side::Local, Accept::WRITE_HEADERS, 0, 0, 10).is_ok());
    }

    #[test]
    fn rejects_non_monotonic_remote_id() {
        let mut t = StreamTable::new(true);
        t.insert(StreamId::new(3), Side::Remote, Accept::HEADERS, 0, 0, 10).unwrap();
        let err = t.insert(StreamId::new(1), Side::Remote, Accept::HEADERS, 0, 0, 10).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transport);
    }

    #[test]
    fn concurrency_cap_blocks_locally_and_faults_remotely() {
        let mut t = StreamTable::new(true);
        assert_eq!(
            t.insert(StreamId::new(2), Side::Local, Accept::WRITE_HEADERS, 0, 0, 0)
                .unwrap_err()
                .kind(),
            crate::error::ErrorKind::WouldBlock
        );
        assert_eq!(
            t.insert(StreamId::new(1), Side::Remote, Accept::HEADERS, 0, 0, 0)
                .unwrap_err()
                .kind(),
            crate::error::ErrorKind::Transport
        );
    }

    #[test]
    fn find_and_free_round_trip() {
        let mut t = StreamTable::new(false);
        let key = t.insert(StreamId::new(1), Side::Local, Accept::WRITE_HEADERS, 0, 0, 10).unwrap();
        assert!(t.find(StreamId::new(1)).is_some());
        t.free(key);
        assert!(t.find(StreamId::new(1)).is_none());
        assert_eq!(t.active_count(Side::Local), 0);
    }

    #[test]
    fn reset_ring_bounds_at_history_length() {
        let mut t = StreamTable::new(true);
        for i in 0..10u32 {
            t.mark_reset(StreamId::new(i * 2 + 1));
        }
        assert!(!t.was_recently_reset(StreamId::new(1)));
        assert!(t.was_recently_reset(StreamId::new(19)));
    }
}
