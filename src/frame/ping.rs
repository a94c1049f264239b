use bytes::Bytes;

use crate::frame::{FrameError, Head, Kind, StreamId, HEADER_LEN};

const ACK_FLAG: u8 = 0x1;

/// A PING frame: 8 octets of opaque data, used as a keepalive/round-trip probe (§4.5).
#[derive(Debug, Clone)]
pub struct Ping {
    ack: bool,
    payload: [u8; 8],
}

impl Ping {
    pub fn ping(payload: [u8; 8]) -> Ping {
        Ping { ack: false, payload }
    }

    pub fn pong(payload: [u8; 8]) -> Ping {
        Ping { ack: true, payload }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn payload(&self) -> [u8; 8] {
        self.payload
    }

    pub fn stream_id(&self) -> StreamId {
        StreamId::ZERO
    }

    pub fn load(head: Head, payload: &[u8]) -> Result<Ping, FrameError> {
        if !head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }
        if payload.len() != 8 {
            return Err(FrameError::BadFrameSize);
        }
        let ack = head.flag() & ACK_FLAG != 0;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(payload);
        Ok(Ping { ack, payload: buf })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let flags = if self.ack { ACK_FLAG } else { 0 };
        let head = Head::new(Kind::Ping, flags, StreamId::ZERO, self.payload.len());
        head.encode(dst);
        dst.extend_from_slice(&self.payload);
    }
}

impl From<Bytes> for Ping {
    fn from(bytes: Bytes) -> Ping {
        let mut buf = [0u8; 8];
        let len = bytes.len().min(8);
        buf[..len].copy_from_slice(&bytes[..len]);
        Ping::ping(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_nonzero_stream() {
        let head = Head::new(Kind::Ping, 0, StreamId::new(1), 8);
        assert_eq!(Ping::load(head, &[0; 8]), Err(FrameError::InvalidStreamId));
    }

    #[test]
    fn rejects_wrong_length() {
        let head = Head::new(Kind::Ping, 0, StreamId::ZERO, 4);
        assert_eq!(Ping::load(head, &[0; 4]), Err(FrameError::BadFrameSize));
    }

    #[test]
    fn round_trips() {
        let ping = Ping::ping([1, 2, 3, 4, 5, 6, 7, 8]);
        let mut buf = Vec::new();
        ping.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN + 8);
        let head = Head::parse(&buf[..HEADER_LEN]);
        let loaded = Ping::load(head, &buf[HEADER_LEN..]).unwrap();
        assert!(!loaded.is_ack());
        assert_eq!(loaded.payload(), [1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
