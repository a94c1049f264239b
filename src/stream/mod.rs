//! Per-stream state: the acceptance bitmask, flow-control windows, and lifecycle (§3).

pub mod flow_control;
pub mod store;

pub use flow_control::FlowControl;
pub use store::StreamTable;

use crate::frame::StreamId;

bitflags::bitflags! {
    /// What a stream currently accepts inbound and may emit outbound (§3).
    pub struct Accept: u16 {
        /// Inbound HEADERS/CONTINUATION may arrive as initial headers.
        const HEADERS       = 0b0000_0000_0001;
        /// Inbound DATA may arrive.
        const DATA          = 0b0000_0000_0010;
        /// The next inbound HEADERS will be trailers.
        const TRAILERS      = 0b0000_0000_0100;
        /// Local may emit HEADERS.
        const WRITE_HEADERS = 0b0000_0000_1000;
        /// Local may emit DATA.
        const WRITE_DATA    = 0b0000_0001_0000;
        /// Local may emit PUSH_PROMISE on this stream.
        const WRITE_PUSH    = 0b0000_0010_0000;
        /// Remote may PUSH_PROMISE on this stream (client-initiated parent).
        const PUSH          = 0b0000_0100_0000;
        /// Locally reset after the peer already committed to a HEADERS sequence:
        /// continue HPACK decoding for table parity, but drop the result (§9 open
        /// question, §4.5.1).
        const NOP_HEADERS   = 0b0000_1000_0000;

        /// Composite test used when deciding whether the inbound half is closed.
        const INBOUND = Self::HEADERS.bits | Self::DATA.bits | Self::TRAILERS.bits;
        /// Composite test used when deciding whether the outbound half is closed.
        const OUTBOUND = Self::WRITE_HEADERS.bits | Self::WRITE_DATA.bits | Self::WRITE_PUSH.bits;
    }
}

/// A single HTTP/2 stream's mutable state.
#[derive(Debug)]
pub struct Stream {
    id: StreamId,
    accept: Accept,
    send_window: FlowControl,
    recv_window: FlowControl,
}

impl Stream {
    pub fn new(id: StreamId, accept: Accept, initial_send: i32, initial_recv: i32) -> Stream {
        Stream {
            id,
            accept,
            send_window: FlowControl::new(initial_send),
            recv_window: FlowControl::new(initial_recv),
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    pub fn accept(&self) -> Accept {
        self.accept
    }

    pub fn insert_accept(&mut self, flags: Accept) {
        self.accept.insert(flags);
    }

    pub fn remove_accept(&mut self, flags: Accept) {
        self.accept.remove(flags);
    }

    pub fn set_accept(&mut self, flags: Accept) {
        self.accept = flags;
    }

    pub fn send_window(&self) -> &FlowControl {
        &self.send_window
    }

    pub fn send_window_mut(&mut self) -> &mut FlowControl {
        &mut self.send_window
    }

    pub fn recv_window(&self) -> &FlowControl {
        &self.recv_window
    }

    pub fn recv_window_mut(&mut self) -> &mut FlowControl {
        &mut self.recv_window
    }

    /// A stream is destroyed once neither half accepts anything more (§3 lifecycle).
    /// `NOP_HEADERS` keeps a stream alive past an early local reset so the pending
    /// HEADERS/CONTINUATION sequence can still be HPACK-decoded for table parity
    /// (§9's RST_STREAM-mid-CONTINUATION open question).
    pub fn is_closed(&self) -> bool {
        !self.accept.intersects(Accept::INBOUND | Accept::OUTBOUND | Accept::NOP_HEADERS)
    }

    pub fn finalize_inbound(&mut self) {
        self.remove_accept(Accept::INBOUND);
    }

    pub fn finalize_outbound(&mut self) {
        self.remove_accept(Accept::OUTBOUND);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closes_only_once_both_halves_clear() {
        let mut s = Stream::new(StreamId::new(1), Accept::HEADERS | Accept::WRITE_DATA, 0, 0);
        assert!(!s.is_closed());
        s.finalize_inbound();
        assert!(!s.is_closed());
        s.finalize_outbound();
        assert!(s.is_closed());
    }
}
