use bytes::Bytes;

use crate::frame::{FrameError, Head, Kind, StreamId};

/// A PRIORITY frame. This engine validates it but otherwise ignores the carried
/// dependency/weight, per §4.5 ("otherwise ignored").
#[derive(Debug, Clone, Copy)]
pub struct Priority {
    stream_id: StreamId,
    dependency: StreamId,
    exclusive: bool,
    weight: u8,
}

impl Priority {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn load(head: Head, payload: Bytes) -> Result<Priority, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }
        if payload.len() != 5 {
            return Err(FrameError::BadFrameSize);
        }

        let raw = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let exclusive = raw & 0x8000_0000 != 0;
        let dependency = StreamId::new(raw);
        let weight = payload[4];

        if dependency == head.stream_id() {
            return Err(FrameError::InvalidDependencyId);
        }

        Ok(Priority { stream_id: head.stream_id(), dependency, exclusive, weight })
    }

    pub fn encode(&self, dst: &mut Vec<u8>) {
        let head = Head::new(Kind::Priority, 0, self.stream_id, 5);
        head.encode(dst);

        let mut raw = self.dependency.as_u32();
        if self.exclusive {
            raw |= 0x8000_0000;
        }
        dst.extend_from_slice(&raw.to_be_bytes());
        dst.push(self.weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_self_dependency() {
        let head = Head::new(Kind::Priority, 0, StreamId::new(3), 5);
        let mut payload = vec![0, 0, 0, 3];
        payload.push(10);
        assert_eq!(
            Priority::load(head, Bytes::from(payload)),
            Err(FrameError::InvalidDependencyId)
        );
    }
}
