use bytes::Bytes;

use crate::frame::{FrameError, Head, Kind, Reason, StreamId};

/// A RST_STREAM frame: abruptly terminates a single stream (§4.5).
#[derive(Debug, Clone, Copy)]
pub struct Reset {
    stream_id: StreamId,
    reason: Reason,
}

impl Reset {
    pub fn new(stream_id: StreamId, reason: Reason) -> Reset {
        Reset { stream_id, reason }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn reason(&self) -> Reason {
        self.reason
    }

    pub fn load(head: Head, payload: Bytes) -> Result<Reset, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }
        if payload.len() != 4 {
            return Err(FrameError::BadFrameSize);
        }
        let code = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        Ok(Reset { stream_id: head.stream_id(), reason: Reason::new(code) })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let head = Head::new(Kind::Reset, 0, self.stream_id, 4);
        head.encode(dst);
        dst.extend_from_slice(&self.reason.as_u32().to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let frame = Reset::new(StreamId::new(3), Reason::CANCEL);
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        let head = Head::parse(&buf[..9]);
        let loaded = Reset::load(head, Bytes::copy_from_slice(&buf[9..])).unwrap();
        assert_eq!(loaded.stream_id(), StreamId::new(3));
        assert_eq!(loaded.reason(), Reason::CANCEL);
    }
}
