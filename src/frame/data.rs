use bytes::Bytes;

use crate::frame::{FrameError, Head, Kind, StreamId};

const END_STREAM: u8 = 0x1;
const PADDED: u8 = 0x8;

/// A DATA frame carrying body bytes for a stream (§4.5).
#[derive(Debug, Clone)]
pub struct Data {
    stream_id: StreamId,
    data: Bytes,
    end_stream: bool,
    pad_len: u8,
}

impl Data {
    pub fn new(stream_id: StreamId, data: Bytes, end_stream: bool) -> Data {
        Data { stream_id, data, end_stream, pad_len: 0 }
    }

    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn payload(&self) -> &Bytes {
        &self.data
    }

    pub fn is_end_stream(&self) -> bool {
        self.end_stream
    }

    /// The unpadded payload length, which is what flow control accounts against
    /// (§4.5's "payload.size (pre-unpad length)" note refers to the frame's on-wire
    /// payload before padding is stripped for delivery, i.e. this value).
    pub fn flow_controlled_len(&self) -> usize {
        self.data.len() + self.pad_len as usize + if self.pad_len > 0 { 1 } else { 0 }
    }

    pub fn load(head: Head, mut payload: Bytes) -> Result<Data, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        let padded = head.flag() & PADDED != 0;
        let mut pad_len = 0u8;

        if padded {
            if payload.is_empty() {
                return Err(FrameError::TooMuchPadding);
            }
            pad_len = payload[0];
            payload = payload.split_off(1);
            if pad_len as usize > payload.len() {
                return Err(FrameError::TooMuchPadding);
            }
            let content_len = payload.len() - pad_len as usize;
            payload.truncate(content_len);
        }

        Ok(Data {
            stream_id: head.stream_id(),
            data: payload,
            end_stream: head.flag() & END_STREAM != 0,
            pad_len,
        })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let flags = if self.end_stream { END_STREAM } else { 0 };
        let head = Head::new(Kind::Data, flags, self.stream_id, self.data.len());
        head.encode(dst);
        dst.extend_from_slice(&self.data);
    }
}
