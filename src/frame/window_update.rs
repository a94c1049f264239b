use bytes::Bytes;

use crate::frame::{FrameError, Head, Kind, StreamId};

/// A WINDOW_UPDATE frame: extends a connection- or stream-level flow control window
/// (§4.5, §4.7).
#[derive(Debug, Clone, Copy)]
pub struct WindowUpdate {
    stream_id: StreamId,
    increment: u32,
}

impl WindowUpdate {
    pub fn new(stream_id: StreamId, increment: u32) -> WindowUpdate {
        WindowUpdate { stream_id, increment }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn size_increment(&self) -> u32 {
        self.increment
    }

    pub fn load(head: Head, payload: Bytes) -> Result<WindowUpdate, FrameError> {
        if payload.len() != 4 {
            return Err(FrameError::BadFrameSize);
        }
        let raw = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let increment = raw & 0x7FFF_FFFF;
        if increment == 0 {
            return Err(FrameError::InvalidPayloadAckSettings);
        }
        Ok(WindowUpdate { stream_id: head.stream_id(), increment })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let head = Head::new(Kind::WindowUpdate, 0, self.stream_id, 4);
        head.encode(dst);
        dst.extend_from_slice(&self.increment.to_be_bytes());
    }
}
