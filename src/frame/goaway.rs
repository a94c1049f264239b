use bytes::Bytes;

use crate::frame::{FrameError, Head, Kind, Reason, StreamId};

/// A GOAWAY frame: the peer is shutting down the connection (§4.5).
#[derive(Debug, Clone)]
pub struct GoAway {
    last_stream_id: StreamId,
    reason: Reason,
    debug_data: Bytes,
}

impl GoAway {
    pub fn new(last_stream_id: StreamId, reason: Reason) -> GoAway {
        GoAway { last_stream_id, reason, debug_data: Bytes::new() }
    }

    pub fn with_debug_data(last_stream_id: StreamId, reason: Reason, debug_data: Bytes) -> GoAway {
        GoAway { last_stream_id, reason, debug_data }
    }

    pub fn last_stream_id(&self) -> StreamId {
        self.last_stream_id
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn debug_data(&self) -> &Bytes {
        &self.debug_data
    }

    pub fn load(head: Head, payload: Bytes) -> Result<GoAway, FrameError> {
        if !head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }
        if payload.len() < 8 {
            return Err(FrameError::BadFrameSize);
        }

        let last_stream_id = StreamId::parse(&payload[0..4]);
        let code = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
        let debug_data = payload.slice(8..);

        Ok(GoAway { last_stream_id, reason: Reason::new(code), debug_data })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let len = 8 + self.debug_data.len();
        let head = Head::new(Kind::GoAway, 0, StreamId::ZERO, len);
        head.encode(dst);

        let mut id = [0u8; 4];
        self.last_stream_id.write_into(&mut id);
        dst.extend_from_slice(&id);
        dst.extend_from_slice(&self.reason.as_u32().to_be_bytes());
        dst.extend_from_slice(&self.debug_data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let frame = GoAway::new(StreamId::new(7), Reason::PROTOCOL_ERROR);
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        let head = Head::parse(&buf[..9]);
        let loaded = GoAway::load(head, Bytes::copy_from_slice(&buf[9..])).unwrap();
        assert_eq!(loaded.last_stream_id(), StreamId::new(7));
        assert_eq!(loaded.reason(), Reason::PROTOCOL_ERROR);
    }

    #[test]
    fn rejects_short_payload() {
        let head = Head::new(Kind::GoAway, 0, StreamId::ZERO, 4);
        assert!(GoAway::load(head, Bytes::from_static(&[0; 4])).is_err());
    }
}
