//! Shared harness for the integration tests: a recording `Callbacks` impl and a
//! helper to pump bytes from one `Connection`'s `on_write` into the other's
//! `data_received`, mirroring the unit-test harness in `src/connection.rs` but
//! exported so multiple integration test binaries can reuse it.

use std::cell::RefCell;
use std::rc::Rc;

use duohttp::{Callbacks, Frame, Result, StreamId};
use http::HeaderMap;

#[derive(Default)]
pub struct Recorder {
    pub written: Vec<u8>,
    pub stream_starts: Vec<StreamId>,
    pub stream_ends: Vec<StreamId>,
    pub messages: Vec<StreamId>,
    pub data: Vec<(StreamId, Vec<u8>)>,
    pub trailers: Vec<(StreamId, HeaderMap)>,
    pub ends: Vec<StreamId>,
    pub pushes: Vec<(StreamId, StreamId)>,
    pub flow_increases: Vec<StreamId>,
    pub pongs: Vec<[u8; 8]>,
    pub frames_in: Vec<String>,
}

pub struct TestCallbacks(pub Rc<RefCell<Recorder>>);

impl Callbacks for TestCallbacks {
    fn on_write(&mut self, bytes: &[u8]) -> Result<()> {
        self.0.borrow_mut().written.extend_from_slice(bytes);
        Ok(())
    }

    fn on_stream_start(&mut self, id: StreamId) -> Result<()> {
        self.0.borrow_mut().stream_starts.push(id);
        Ok(())
    }

    fn on_stream_end(&mut self, id: StreamId) -> Result<()> {
        self.0.borrow_mut().stream_ends.push(id);
        Ok(())
    }

    fn on_message_start(&mut self, id: StreamId, _message: &duohttp::Message) -> Result<()> {
        self.0.borrow_mut().messages.push(id);
        Ok(())
    }

    fn on_message_data(&mut self, id: StreamId, bytes: &[u8]) -> Result<()> {
        self.0.borrow_mut().data.push((id, bytes.to_vec()));
        Ok(())
    }

    fn on_message_trail(&mut self, id: StreamId, trailers: &HeaderMap) -> Result<()> {
        self.0.borrow_mut().trailers.push((id, trailers.clone()));
        Ok(())
    }

    fn on_message_end(&mut self, id: StreamId) -> Result<()> {
        self.0.borrow_mut().ends.push(id);
        Ok(())
    }

    fn on_message_push(&mut self, parent: StreamId, _message: &duohttp::Message, child: StreamId) -> Result<()> {
        self.0.borrow_mut().pushes.push((parent, child));
        Ok(())
    }

    fn on_flow_increase(&mut self, id: StreamId) -> Result<()> {
        self.0.borrow_mut().flow_increases.push(id);
        Ok(())
    }

    fn on_pong(&mut self, opaque: [u8; 8]) -> Result<()> {
        self.0.borrow_mut().pongs.push(opaque);
        Ok(())
    }

    fn on_frame(&mut self, frame: &Frame) -> Result<()> {
        self.0.borrow_mut().frames_in.push(format!("{:?}", frame));
        Ok(())
    }
}

/// Builds a connected client/server pair of `Connection`s over the new sans-I/O API,
/// each with its own `Recorder` for inspecting written bytes and fired callbacks.
pub fn new_pair() -> (
    duohttp::Connection<TestCallbacks>,
    duohttp::Connection<TestCallbacks>,
    Rc<RefCell<Recorder>>,
    Rc<RefCell<Recorder>>,
) {
    let client_rec = Rc::new(RefCell::new(Recorder::default()));
    let server_rec = Rc::new(RefCell::new(Recorder::default()));
    let client = duohttp::Builder::new(duohttp::Role::Client).build(TestCallbacks(client_rec.clone()));
    let server = duohttp::Builder::new(duohttp::Role::Server).build(TestCallbacks(server_rec.clone()));
    (client, server, client_rec, server_rec)
}

/// Takes and clears the bytes a `Recorder` has accumulated via `on_write`.
pub fn drain(from: &Rc<RefCell<Recorder>>) -> Vec<u8> {
    std::mem::take(&mut from.borrow_mut().written)
}

/// Runs the full HTTP/2 preface/SETTINGS handshake between an already-`made` client
/// and server pair, leaving both in the `Ready` state.
pub fn handshake_h2(
    client: &mut duohttp::Connection<TestCallbacks>,
    server: &mut duohttp::Connection<TestCallbacks>,
    client_rec: &Rc<RefCell<Recorder>>,
    server_rec: &Rc<RefCell<Recorder>>,
) {
    client.made(duohttp::Version::Http2).unwrap();
    server.made(duohttp::Version::Http2).unwrap();
    server.data_received(&drain(client_rec)).unwrap();
    client.data_received(&drain(server_rec)).unwrap();
}

/// Hand-assembles a raw HTTP/2 frame (9-byte header + payload) the way the engine's
/// own wire format is defined in §4.4, for tests that need to drive `data_received`
/// with frames the public API has no constructor for (bad lengths, padding, etc.).
pub fn raw_frame(kind: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + payload.len());
    let len = payload.len() as u32;
    out.push((len >> 16) as u8);
    out.push((len >> 8) as u8);
    out.push(len as u8);
    out.push(kind);
    out.push(flags);
    out.extend_from_slice(&stream_id.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

pub const FRAME_DATA: u8 = 0x0;
pub const FRAME_HEADERS: u8 = 0x1;
pub const FRAME_SETTINGS: u8 = 0x4;
pub const FRAME_PING: u8 = 0x6;

pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PADDED: u8 = 0x8;
