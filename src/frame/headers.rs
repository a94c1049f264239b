//! HEADERS, PUSH_PROMISE, and CONTINUATION frames (§4.4, §4.5).
//!
//! These frames only carry a block-fragment payload; the HPACK decode itself happens
//! at the connection layer once a full continuation sequence is assembled (§4.4's
//! continuation invariant), because the dynamic table is shared across the whole
//! connection, not per-frame. This mirrors the teacher's `frame::headers::Headers`
//! shape while moving the `hpack::Decoder::decode` call out to the caller.

use bytes::Bytes;
use http::{Method, StatusCode};

use crate::frame::{FrameError, Head, Kind, StreamId};

const END_STREAM: u8 = 0x1;
const END_HEADERS: u8 = 0x4;
const PADDED: u8 = 0x8;
const PRIORITY: u8 = 0x20;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct HeadersFlag(u8);

impl HeadersFlag {
    pub fn load(bits: u8) -> HeadersFlag {
        HeadersFlag(bits & (END_STREAM | END_HEADERS | PADDED | PRIORITY))
    }

    pub fn empty() -> HeadersFlag {
        HeadersFlag(0)
    }

    pub fn is_end_stream(&self) -> bool {
        self.0 & END_STREAM != 0
    }

    pub fn set_end_stream(&mut self, on: bool) {
        if on {
            self.0 |= END_STREAM;
        } else {
            self.0 &= !END_STREAM;
        }
    }

    pub fn is_end_headers(&self) -> bool {
        self.0 & END_HEADERS != 0
    }

    pub fn set_end_headers(&mut self, on: bool) {
        if on {
            self.0 |= END_HEADERS;
        } else {
            self.0 &= !END_HEADERS;
        }
    }

    pub fn is_padded(&self) -> bool {
        self.0 & PADDED != 0
    }

    pub fn is_priority(&self) -> bool {
        self.0 & PRIORITY != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StreamDependency {
    pub stream_id: StreamId,
    pub weight: u8,
    pub is_exclusive: bool,
}

/// A HEADERS frame, still carrying its raw (unindexed) header block fragment.
#[derive(Debug, Clone)]
pub struct Headers {
    stream_id: StreamId,
    stream_dep: Option<StreamDependency>,
    block_fragment: Bytes,
    flags: HeadersFlag,
}

impl Headers {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn flags(&self) -> HeadersFlag {
        self.flags
    }

    pub fn is_end_headers(&self) -> bool {
        self.flags.is_end_headers()
    }

    pub fn is_end_stream(&self) -> bool {
        self.flags.is_end_stream()
    }

    pub fn block_fragment(&self) -> &Bytes {
        &self.block_fragment
    }

    pub fn into_block_fragment(self) -> Bytes {
        self.block_fragment
    }

    pub fn load(head: Head, mut payload: Bytes) -> Result<Headers, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        let flags = HeadersFlag::load(head.flag());

        if flags.is_padded() {
            if payload.is_empty() {
                return Err(FrameError::TooMuchPadding);
            }
            let pad_len = payload[0] as usize;
            payload = payload.slice(1..);
            if pad_len > payload.len() {
                return Err(FrameError::TooMuchPadding);
            }
            let content_len = payload.len() - pad_len;
            payload.truncate(content_len);
        }

        let stream_dep = if flags.is_priority() {
            if payload.len() < 5 {
                return Err(FrameError::InvalidDependencyId);
            }
            let raw = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
            let is_exclusive = raw & 0x8000_0000 != 0;
            let dep_id = StreamId::new(raw);
            let weight = payload[4];
            payload = payload.slice(5..);

            if dep_id == head.stream_id() {
                return Err(FrameError::InvalidDependencyId);
            }

            Some(StreamDependency { stream_id: dep_id, weight, is_exclusive })
        } else {
            None
        };

        Ok(Headers { stream_id: head.stream_id(), stream_dep, block_fragment: payload, flags })
    }

    /// Encodes the frame header for a block fragment of `len` bytes. The caller writes
    /// `len` bytes of HPACK output immediately after (§4.4's write discipline: the
    /// caller, not this type, decides how to split across CONTINUATION frames).
    pub fn encode_head(&self, len: usize, dst: &mut Vec<u8>) {
        let head = Head::new(Kind::Headers, self.flags.bits(), self.stream_id, len);
        head.encode(dst);
    }

    pub fn new(stream_id: StreamId, end_stream: bool) -> Headers {
        let mut flags = HeadersFlag::empty();
        flags.set_end_headers(true);
        flags.set_end_stream(end_stream);
        Headers { stream_id, stream_dep: None, block_fragment: Bytes::new(), flags }
    }
}

/// A PUSH_PROMISE frame, carrying the promised stream id and a raw header block
/// fragment for the server-predicted request.
#[derive(Debug, Clone)]
pub struct PushPromise {
    stream_id: StreamId,
    promised_id: StreamId,
    block_fragment: Bytes,
    flags: HeadersFlag,
}

impl PushPromise {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn promised_id(&self) -> StreamId {
        self.promised_id
    }

    pub fn is_end_headers(&self) -> bool {
        self.flags.is_end_headers()
    }

    pub fn block_fragment(&self) -> &Bytes {
        &self.block_fragment
    }

    pub fn into_block_fragment(self) -> Bytes {
        self.block_fragment
    }

    pub fn load(head: Head, mut payload: Bytes) -> Result<PushPromise, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }

        let flags = HeadersFlag::load(head.flag());

        if flags.is_padded() {
            if payload.is_empty() {
                return Err(FrameError::TooMuchPadding);
            }
            let pad_len = payload[0] as usize;
            payload = payload.slice(1..);
            if pad_len > payload.len() {
                return Err(FrameError::TooMuchPadding);
            }
            let content_len = payload.len() - pad_len;
            payload.truncate(content_len);
        }

        if payload.len() < 4 {
            return Err(FrameError::BadFrameSize);
        }

        let raw = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let promised_id = StreamId::new(raw);
        let block_fragment = payload.slice(4..);

        Ok(PushPromise { stream_id: head.stream_id(), promised_id, block_fragment, flags })
    }

    pub fn encode_head(&self, len: usize, dst: &mut Vec<u8>) {
        let head = Head::new(Kind::PushPromise, self.flags.bits(), self.stream_id, len + 4);
        head.encode(dst);
        let mut id = [0u8; 4];
        self.promised_id.write_into(&mut id);
        dst.extend_from_slice(&id);
    }

    pub fn new(stream_id: StreamId, promised_id: StreamId) -> PushPromise {
        let mut flags = HeadersFlag::empty();
        flags.set_end_headers(true);
        PushPromise { stream_id, promised_id, block_fragment: Bytes::new(), flags }
    }
}

/// A CONTINUATION frame extending a HEADERS or PUSH_PROMISE block fragment (§4.4).
#[derive(Debug, Clone)]
pub struct Continuation {
    stream_id: StreamId,
    block_fragment: Bytes,
    end_headers: bool,
}

impl Continuation {
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }

    pub fn is_end_headers(&self) -> bool {
        self.end_headers
    }

    pub fn block_fragment(&self) -> &Bytes {
        &self.block_fragment
    }

    pub fn into_block_fragment(self) -> Bytes {
        self.block_fragment
    }

    pub fn load(head: Head, payload: Bytes) -> Result<Continuation, FrameError> {
        if head.stream_id().is_zero() {
            return Err(FrameError::InvalidStreamId);
        }
        let end_headers = head.flag() & END_HEADERS != 0;
        Ok(Continuation { stream_id: head.stream_id(), block_fragment: payload, end_headers })
    }

    pub fn encode_head(&self, len: usize, dst: &mut Vec<u8>) {
        let flags = if self.end_headers { END_HEADERS } else { 0 };
        let head = Head::new(Kind::Continuation, flags, self.stream_id, len);
        head.encode(dst);
    }

    pub fn new(stream_id: StreamId, end_headers: bool) -> Continuation {
        Continuation { stream_id, block_fragment: Bytes::new(), end_headers }
    }
}

/// Request/response pseudo-headers, broken out from the regular header map per §3/§4.5.1.
#[derive(Debug, Default, Clone)]
pub struct Pseudo {
    pub method: Option<Method>,
    pub scheme: Option<Bytes>,
    pub authority: Option<Bytes>,
    pub path: Option<Bytes>,
    pub status: Option<StatusCode>,
}

impl Pseudo {
    pub fn request(method: Method, path: Bytes, scheme: Option<Bytes>, authority: Option<Bytes>) -> Pseudo {
        Pseudo { method: Some(method), scheme, authority, path: Some(path), status: None }
    }

    pub fn response(status: StatusCode) -> Pseudo {
        Pseudo { status: Some(status), ..Pseudo::default() }
    }

    pub fn is_request(&self) -> bool {
        self.method.is_some()
    }

    pub fn is_response(&self) -> bool {
        self.status.is_some()
    }

    pub fn is_trailers(&self) -> bool {
        self.method.is_none() && self.status.is_none()
    }
}

/// Errors from validating the pseudo-header set of a HEADERS sequence (§4.5.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoError {
    UppercaseName,
    PseudoAfterRegular,
    UnknownPseudo,
    DuplicatePseudo,
    MissingRequestPseudo,
    MissingResponsePseudo,
    EmptyPath,
    InvalidStatus,
    TrailerHasPseudo,
    TrailerMissingEndStream,
    InvalidHeaderBytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_priority_prefix() {
        let mut payload = vec![0, 0, 0, 1, 16]; // dep=1, weight=16
        payload.extend_from_slice(b"fragment");
        let head = Head::new(Kind::Headers, PRIORITY | END_HEADERS, StreamId::new(3), 0);
        let headers = Headers::load(head, Bytes::from(payload)).unwrap();
        assert_eq!(headers.block_fragment(), &Bytes::from_static(b"fragment"));
    }

    #[test]
    fn push_promise_extracts_promised_id() {
        let mut payload = vec![0, 0, 0, 4];
        payload.extend_from_slice(b"frag");
        let head = Head::new(Kind::PushPromise, END_HEADERS, StreamId::new(1), 0);
        let pp = PushPromise::load(head, Bytes::from(payload)).unwrap();
        assert_eq!(pp.promised_id(), StreamId::new(4));
        assert_eq!(pp.block_fragment(), &Bytes::from_static(b"frag"));
    }

    #[test]
    fn pseudo_trailers_have_neither_method_nor_status() {
        assert!(Pseudo::default().is_trailers());
    }
}
