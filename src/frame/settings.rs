use bytes::Bytes;

use crate::frame::{FrameError, Head, Kind, StreamId};

const ACK_FLAG: u8 = 0x1;

/// A SETTINGS frame: either an ACK, or a list of `(identifier, value)` pairs to apply
/// to the peer's view of this endpoint's settings (§4.5).
#[derive(Debug, Clone)]
pub struct Settings {
    ack: bool,
    values: Vec<(u16, u32)>,
}

impl Settings {
    pub fn ack() -> Settings {
        Settings { ack: true, values: Vec::new() }
    }

    pub fn new(values: Vec<(u16, u32)>) -> Settings {
        Settings { ack: false, values }
    }

    pub fn is_ack(&self) -> bool {
        self.ack
    }

    pub fn values(&self) -> &[(u16, u32)] {
        &self.values
    }

    pub fn load(head: Head, payload: Bytes) -> Result<Settings, FrameError> {
        if !head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        let ack = head.flag() & ACK_FLAG != 0;
        if ack {
            if !payload.is_empty() {
                return Err(FrameError::InvalidPayloadAckSettings);
            }
            return Ok(Settings::ack());
        }

        if payload.len() % 6 != 0 {
            return Err(FrameError::PartialSettingLength);
        }

        let mut values = Vec::with_capacity(payload.len() / 6);
        for chunk in payload.chunks_exact(6) {
            let id = u16::from_be_bytes([chunk[0], chunk[1]]);
            let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
            values.push((id, value));
        }

        Ok(Settings::new(values))
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let flags = if self.ack { ACK_FLAG } else { 0 };
        let len = self.values.len() * 6;
        let head = Head::new(Kind::Settings, flags, StreamId::ZERO, len);
        head.encode(dst);

        for (id, value) in &self.values {
            dst.extend_from_slice(&id.to_be_bytes());
            dst.extend_from_slice(&value.to_be_bytes());
        }
    }
}
