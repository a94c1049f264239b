//! The connection state machine: mode negotiation, the drive loop, per-frame dispatch,
//! and the write-side operations (§4.6, §4.7).
//!
//! Grounded on the teacher's `proto::connection::Connection`'s `recv_frame` loop and
//! `Sink::start_send` dispatch, and on `client.rs`/`server.rs`'s `Peer` role split and
//! preface handling — with every `futures::{Stream,Sink}` poll replaced by a plain
//! method a caller invokes directly, since this engine owns no transport (§9).

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};

use crate::buffer::ByteBuffer;
use crate::callbacks::Callbacks;
use crate::error::{Error, Result};
use crate::frame::{self, Frame, Head, Kind, Pseudo, Reason, StreamId};
use crate::h1::{self, Http1Parser, Http1Request, Http1Response, ParseOutcome};
use crate::hpack::{self, Indexing};
use crate::settings::Settings;
use crate::stream::store::Side;
use crate::stream::{Accept, StreamTable};
use crate::validation::{self, Context, Message};

/// The client connection preface (RFC 9113 §3.4): 24 literal octets every client sends,
/// and every server reads, before any HTTP/2 frame.
pub const PREFACE: &[u8; 24] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// How many CONTINUATION frames a single HEADERS/PUSH_PROMISE sequence may carry before
/// this engine gives up and tears the connection down (§4.4, a compile-time knob guarding
/// against unbounded buffering).
const MAX_CONTINUATIONS: usize = 3;

/// Ceiling on the inbound byte accumulator (§4.1's NO_MEMORY note; §6 compile-time knobs).
const INPUT_BUFFER_CEILING: usize = 16 * 1024 * 1024;

const FLAG_END_STREAM: u8 = 0x1;
const FLAG_END_HEADERS: u8 = 0x4;

/// Which side of the connection this engine is playing (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// The protocol a fresh connection starts in (§4.6). A server doesn't know in advance
/// whether it's about to see an HTTP/1.x request line or an HTTP/2 preface; callers that
/// do know (e.g. ALPN negotiated `h2`) should pass [`Version::Http2`] directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    Http1,
    Http2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Http1,
    Http2,
}

/// The connection's top-level state (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Undefined,
    Init,
    Preface,
    ReadyNoSettings,
    Ready,
    H1Ready,
    H1Reading,
    H1ReadingUpgrade,
    UnknownProtocolUpgrade,
    UnknownProtocol,
}

enum Http1Outcome {
    Request(ParseOutcome<Http1Request>),
    Response(ParseOutcome<Http1Response>),
}

/// Buffers a HEADERS/PUSH_PROMISE + CONTINUATION* sequence until END_HEADERS (§4.4).
struct Continued {
    stream_id: StreamId,
    promised_id: Option<StreamId>,
    end_stream: bool,
    is_trailers: bool,
    data: Vec<u8>,
}

/// A sans-I/O dual-mode HTTP/1.x and HTTP/2 connection (§1, §4).
///
/// Feed inbound bytes to [`Connection::data_received`]; the engine calls back into `C`
/// with parsed events and with bytes to write out, in order (§5).
pub struct Connection<C: Callbacks> {
    role: Role,
    state: State,
    buf: ByteBuffer,

    continued: Option<Continued>,

    settings_local: Settings,
    settings_remote: Settings,

    hpack_encoder: hpack::Encoder,
    hpack_decoder: hpack::Decoder,

    streams: StreamTable,
    window_send: crate::stream::FlowControl,
    window_recv: crate::stream::FlowControl,

    goaway_sent: Option<StreamId>,

    /// Bytes remaining in the current HTTP/1 message body; `u32::MAX` means "chunked,
    /// length unknown", `0` means "no body/done".
    http1_remaining: u32,
    currently_writing_chunked: bool,

    manual_flow_control: bool,
    forbid_h2_upgrade: bool,
    forbid_prior_knowledge_h2: bool,

    http1_parser: Box<dyn Http1Parser>,
    callbacks: C,
}

impl<C: Callbacks> Connection<C> {
    pub fn new(role: Role, callbacks: C, http1_parser: Box<dyn Http1Parser>) -> Connection<C> {
        let settings_local = Settings::INITIAL;
        let settings_remote = Settings::CONSERVATIVE;
        Connection {
            role,
            state: State::Undefined,
            buf: ByteBuffer::new(INPUT_BUFFER_CEILING),
            continued: None,
            hpack_decoder: hpack::Decoder::new(
                settings_local.header_table_size as usize,
                settings_local.header_table_size as usize,
            ),
            hpack_encoder: hpack::Encoder::new(settings_remote.header_table_size as usize),
            settings_local,
            settings_remote,
            streams: StreamTable::new(role == Role::Server),
            window_send: crate::stream::FlowControl::new(65_535),
            window_recv: crate::stream::FlowControl::new(65_535),
            goaway_sent: None,
            http1_remaining: 0,
            currently_writing_chunked: false,
            manual_flow_control: false,
            forbid_h2_upgrade: false,
            forbid_prior_knowledge_h2: false,
            http1_parser,
            callbacks,
        }
    }

    fn mode(&self) -> Mode {
        match self.state {
            State::H1Ready
            | State::H1Reading
            | State::H1ReadingUpgrade
            | State::UnknownProtocolUpgrade
            | State::UnknownProtocol => Mode::Http1,
            _ => Mode::Http2,
        }
    }

    // ---- top-level API (§4.6, §4.7) ----------------------------------------------

    /// Starts the connection in the given `version` (§4.6). Must be called exactly once,
    /// before the first `data_received`.
    pub fn made(&mut self, version: Version) -> Result<()> {
        tracing::debug!(role = ?self.role, ?version, "connection made");
        self.state = match version {
            Version::Http2 => State::Init,
            Version::Http1 => State::H1Ready,
        };
        self.drive()
    }

    /// Feeds inbound wire bytes; may synchronously invoke any number of `Callbacks`
    /// methods, including `on_write` (§4.1, §5).
    pub fn data_received(&mut self, bytes: &[u8]) -> Result<()> {
        self.buf.append(bytes)?;
        self.drive()
    }

    /// Marks the connection as torn down at the transport level. No further `data_received`
    /// or `write_*` calls are meaningful afterward.
    pub fn lost(&mut self) {
        self.state = State::Undefined;
    }

    /// Updates the local `Settings`, sending a SETTINGS frame with the delta if the
    /// connection is in HTTP/2 mode (§4.8).
    pub fn set_config(&mut self, settings: Settings) -> Result<()> {
        settings.validate()?;
        let diff = settings.diff(&self.settings_local);
        self.hpack_decoder.set_limit_upper(settings.header_table_size as usize);
        self.settings_local = settings;
        if self.mode() == Mode::Http2 && !diff.is_empty() {
            self.send_frame_simple(Frame::Settings(frame::SettingsFrame::new(diff)))?;
        }
        Ok(())
    }

    /// Enables manual stream-level flow control: `handle_data` no longer auto-emits a
    /// stream-level WINDOW_UPDATE after delivery, leaving that to `increase_flow_window`
    /// (§4.7).
    pub fn set_manual_flow_control(&mut self, manual: bool) {
        self.manual_flow_control = manual;
    }

    pub fn forbid_h2_upgrade(&mut self, forbid: bool) {
        self.forbid_h2_upgrade = forbid;
    }

    pub fn forbid_prior_knowledge_h2(&mut self, forbid: bool) {
        self.forbid_prior_knowledge_h2 = forbid;
    }

    /// Sets the local `Settings` record directly, bypassing the SETTINGS-diff write
    /// `set_config` performs once a connection is already under way. Only meaningful
    /// before [`Connection::made`] (§4.8 `Builder::build`).
    pub fn apply_initial_settings(&mut self, settings: Settings) {
        self.hpack_decoder.set_limit_upper(settings.header_table_size as usize);
        self.settings_local = settings;
    }

    pub fn local_settings(&self) -> Settings {
        self.settings_local
    }

    // ---- the drive loop -----------------------------------------------------------

    fn drive(&mut self) -> Result<()> {
        loop {
            match self.state {
                State::Undefined => return Ok(()),
                State::Init => self.enter_init()?,
                State::Preface => {
                    if !self.try_read_client_preface()? {
                        return Ok(());
                    }
                }
                State::ReadyNoSettings | State::Ready => match self.next_h2_frame()? {
                    None => return Ok(()),
                    Some(frame) => {
                        if self.state == State::ReadyNoSettings {
                            if !matches!(&frame, Frame::Settings(s) if !s.is_ack()) {
                                return self.fatal(Reason::PROTOCOL_ERROR);
                            }
                            self.state = State::Ready;
                        }
                        self.callbacks.on_frame(&frame)?;
                        self.dispatch_frame(frame)?;
                    }
                },
                State::H1Ready => {
                    if !self.try_h1_ready()? {
                        return Ok(());
                    }
                }
                State::H1Reading | State::H1ReadingUpgrade => {
                    if !self.try_h1_body()? {
                        return Ok(());
                    }
                }
                State::UnknownProtocolUpgrade => {
                    self.state = State::UnknownProtocol;
                }
                State::UnknownProtocol => {
                    if self.buf.is_empty() {
                        return Ok(());
                    }
                    let bytes = self.buf.as_view().to_vec();
                    self.buf.shift(bytes.len());
                    self.callbacks.on_message_data(StreamId::new(1), &bytes)?;
                    return Ok(());
                }
            }
        }
    }

    fn enter_init(&mut self) -> Result<()> {
        if self.role == Role::Client {
            self.callbacks.on_write(PREFACE)?;
        }
        self.send_frame_simple(Frame::Settings(frame::SettingsFrame::new(full_settings_values(
            &self.settings_local,
        ))))?;
        self.state = if self.role == Role::Server { State::Preface } else { State::ReadyNoSettings };
        Ok(())
    }

    fn try_read_client_preface(&mut self) -> Result<bool> {
        if self.buf.len() < PREFACE.len() {
            return Ok(false);
        }
        if &self.buf.as_view()[..PREFACE.len()] != &PREFACE[..] {
            return self.fatal(Reason::PROTOCOL_ERROR).map(|_| false);
        }
        self.buf.shift(PREFACE.len());
        self.state = State::ReadyNoSettings;
        Ok(true)
    }

    // ---- HTTP/2 frame reading and dispatch -----------------------------------------

    /// Reads and returns the next known-kind frame, silently skipping any
    /// `Kind::Unknown` frames (§4.4) — except while a HEADERS/PUSH_PROMISE
    /// continuation sequence is in flight, where §3 invariant 5 makes *any*
    /// non-CONTINUATION frame a connection error, unknown types included.
    /// Returns `Ok(None)` when more bytes are needed.
    fn next_h2_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if self.buf.len() < frame::HEADER_LEN {
                return Ok(None);
            }
            let head = Head::parse(self.buf.as_view());
            if head.length() as u32 > self.settings_local.max_frame_size {
                return self.fatal(Reason::FRAME_SIZE_ERROR).map(|_| None);
            }
            let total = frame::HEADER_LEN + head.length();
            if self.buf.len() < total {
                return Ok(None);
            }

            let payload = Bytes::copy_from_slice(&self.buf.as_view()[frame::HEADER_LEN..total]);
            self.buf.shift(total);

            if matches!(head.kind(), Kind::Unknown(_)) {
                if self.continued.is_some() {
                    return self.fatal(Reason::PROTOCOL_ERROR).map(|_| None);
                }
                continue;
            }

            return self.load_frame(head, payload).map(Some);
        }
    }

    fn load_frame(&mut self, head: Head, payload: Bytes) -> Result<Frame> {
        let result = match head.kind() {
            Kind::Data => frame::Data::load(head, payload).map(Frame::Data),
            Kind::Headers => frame::Headers::load(head, payload).map(Frame::Headers),
            Kind::Priority => frame::Priority::load(head, payload).map(Frame::Priority),
            Kind::Reset => frame::Reset::load(head, payload).map(Frame::Reset),
            Kind::Settings => frame::SettingsFrame::load(head, payload).map(Frame::Settings),
            Kind::PushPromise => frame::PushPromise::load(head, payload).map(Frame::PushPromise),
            Kind::Ping => frame::Ping::load(head, &payload).map(Frame::Ping),
            Kind::GoAway => frame::GoAway::load(head, payload).map(Frame::GoAway),
            Kind::WindowUpdate => frame::WindowUpdate::load(head, payload).map(Frame::WindowUpdate),
            Kind::Continuation => frame::Continuation::load(head, payload).map(Frame::Continuation),
            Kind::Unknown(_) => unreachable!("unknown frames are skipped by the caller"),
        };

        match result {
            Ok(frame) => Ok(frame),
            Err(_) => {
                self.emit_goaway(Reason::PROTOCOL_ERROR)?;
                Err(Error::transport(Reason::PROTOCOL_ERROR))
            }
        }
    }

    fn dispatch_frame(&mut self, frame: Frame) -> Result<()> {
        tracing::trace!(?frame, "dispatching frame");
        if let Some(continued) = &self.continued {
            let matches_continuation =
                matches!(&frame, Frame::Continuation(c) if c.stream_id() == continued.stream_id);
            if !matches_continuation {
                return self.fatal(Reason::PROTOCOL_ERROR);
            }
        }

        match frame {
            Frame::Data(f) => self.handle_data(f),
            Frame::Headers(f) => self.handle_headers(f),
            Frame::Priority(f) => self.handle_priority(f),
            Frame::Reset(f) => self.handle_reset(f),
            Frame::Settings(f) => self.handle_settings(f),
            Frame::PushPromise(f) => self.handle_push_promise(f),
            Frame::Ping(f) => self.handle_ping(f),
            Frame::GoAway(f) => self.handle_goaway(f),
            Frame::WindowUpdate(f) => self.handle_window_update(f),
            Frame::Continuation(f) => self.handle_continuation(f),
        }
    }

    fn handle_data(&mut self, frame: frame::Data) -> Result<()> {
        let stream_id = frame.stream_id();
        let consumed = frame.flow_controlled_len();

        self.window_recv.consume(consumed);
        self.send_window_update(StreamId::ZERO, consumed as u32)?;

        let key = match self.streams.find(stream_id) {
            Some(k) => k,
            None => {
                return if self.streams.was_recently_reset(stream_id) {
                    Ok(())
                } else {
                    self.fatal(Reason::PROTOCOL_ERROR)
                };
            }
        };

        if !self.streams.get(key).accept().contains(Accept::DATA) {
            return self.reset_stream(stream_id, Reason::STREAM_CLOSED);
        }

        self.callbacks.on_message_data(stream_id, frame.payload())?;

        if frame.is_end_stream() {
            self.streams.get_mut(key).finalize_inbound();
            self.callbacks.on_message_end(stream_id)?;
            if self.streams.get(key).is_closed() {
                self.streams.free(key);
                self.callbacks.on_stream_end(stream_id)?;
                return Ok(());
            }
        }

        if !self.manual_flow_control {
            self.streams.get_mut(key).recv_window_mut().consume(consumed);
            self.send_window_update(stream_id, consumed as u32)?;
        }

        Ok(())
    }

    fn handle_headers(&mut self, frame: frame::Headers) -> Result<()> {
        let stream_id = frame.stream_id();
        let end_stream = frame.is_end_stream();
        let end_headers = frame.is_end_headers();

        let key = match self.streams.find(stream_id) {
            Some(k) => k,
            None => {
                if self.role == Role::Client {
                    return self.fatal(Reason::PROTOCOL_ERROR);
                }
                let max = self.settings_local.max_concurrent_streams;
                self.streams.insert(
                    stream_id,
                    Side::Remote,
                    Accept::HEADERS | Accept::WRITE_HEADERS | Accept::WRITE_PUSH,
                    self.settings_remote.initial_window_size as i32,
                    self.settings_local.initial_window_size as i32,
                    max,
                )?
            }
        };

        if self.streams.get(key).accept().contains(Accept::TRAILERS) {
            if !end_stream {
                return self.reset_stream(stream_id, Reason::PROTOCOL_ERROR);
            }
            self.continued = Some(Continued {
                stream_id,
                promised_id: None,
                end_stream,
                is_trailers: true,
                data: frame.into_block_fragment().to_vec(),
            });
        } else {
            if !self.streams.get(key).accept().contains(Accept::HEADERS) {
                return self.reset_stream(stream_id, Reason::PROTOCOL_ERROR);
            }
            self.streams.get_mut(key).insert_accept(Accept::HEADERS);
            self.continued = Some(Continued {
                stream_id,
                promised_id: None,
                end_stream,
                is_trailers: false,
                data: frame.into_block_fragment().to_vec(),
            });
        }

        if end_headers {
            self.finish_continuation()?;
        }
        Ok(())
    }

    fn handle_push_promise(&mut self, frame: frame::PushPromise) -> Result<()> {
        let parent_id = frame.stream_id();
        let promised_id = frame.promised_id();
        let end_headers = frame.is_end_headers();

        let parent_key = match self.streams.find(parent_id) {
            Some(k) => k,
            None => return self.fatal(Reason::PROTOCOL_ERROR),
        };
        if !self.streams.get(parent_key).accept().contains(Accept::PUSH)
            || self.settings_local.enable_push != 1
        {
            return self.fatal(Reason::PROTOCOL_ERROR);
        }

        let max = self.settings_local.max_concurrent_streams;
        self.streams.insert(
            promised_id,
            Side::Remote,
            Accept::HEADERS,
            self.settings_remote.initial_window_size as i32,
            self.settings_local.initial_window_size as i32,
            max,
        )?;
        self.callbacks.on_stream_start(promised_id)?;

        self.continued = Some(Continued {
            stream_id: parent_id,
            promised_id: Some(promised_id),
            end_stream: false,
            is_trailers: false,
            data: frame.into_block_fragment().to_vec(),
        });

        if end_headers {
            self.finish_continuation()?;
        }
        Ok(())
    }

    fn handle_continuation(&mut self, frame: frame::Continuation) -> Result<()> {
        let end_headers = frame.is_end_headers();
        let fragment = frame.into_block_fragment();

        let limit = (MAX_CONTINUATIONS + 1) * self.settings_local.max_frame_size as usize;
        let continued = self.continued.as_mut().expect("dispatch_frame guarantees this is Some");
        continued.data.extend_from_slice(&fragment);
        if continued.data.len() > limit {
            return self.fatal(Reason::ENHANCE_YOUR_CALM);
        }

        if end_headers {
            self.finish_continuation()?;
        }
        Ok(())
    }

    /// Runs whenever an END_HEADERS flag closes out a HEADERS/PUSH_PROMISE/CONTINUATION*
    /// sequence: HPACK-decodes the buffered fragment and dispatches the resulting message
    /// to the right per-stream handler (§4.4, §4.5.1).
    fn finish_continuation(&mut self) -> Result<()> {
        let continued = self.continued.take().expect("only called once a sequence is buffered");

        let decoded = match self.hpack_decoder.decode(&continued.data) {
            Ok(d) => d,
            Err(_) => return self.fatal(Reason::COMPRESSION_ERROR),
        };

        let stream_id = continued.stream_id;
        let key = match self.streams.find(stream_id) {
            Some(k) => k,
            None => return Ok(()),
        };

        if self.streams.get(key).accept() == Accept::NOP_HEADERS {
            self.streams.free(key);
            self.callbacks.on_stream_end(stream_id)?;
            return Ok(());
        }

        if let Some(promised_id) = continued.promised_id {
            let message = match validation::validate(&decoded, Context::Request) {
                Ok(m) => m,
                Err(_) => return self.reset_stream(promised_id, Reason::PROTOCOL_ERROR),
            };
            return self.callbacks.on_message_push(stream_id, &message, promised_id);
        }

        if continued.is_trailers {
            let message = match validation::validate(&decoded, Context::Trailers) {
                Ok(m) => m,
                Err(_) => return self.reset_stream(stream_id, Reason::PROTOCOL_ERROR),
            };
            self.callbacks.on_message_trail(stream_id, &message.headers)?;
            self.streams.get_mut(key).finalize_inbound();
            self.callbacks.on_message_end(stream_id)?;
            if self.streams.get(key).is_closed() {
                self.streams.free(key);
                self.callbacks.on_stream_end(stream_id)?;
            }
            return Ok(());
        }

        let ctx = if self.role == Role::Server { Context::Request } else { Context::Response };
        let message = match validation::validate(&decoded, ctx) {
            Ok(m) => m,
            Err(_) => return self.reset_stream(stream_id, Reason::PROTOCOL_ERROR),
        };

        {
            let stream = self.streams.get_mut(key);
            stream.remove_accept(Accept::HEADERS);
            stream.insert_accept(Accept::TRAILERS | Accept::DATA);
        }
        self.callbacks.on_message_start(stream_id, &message)?;

        if continued.end_stream {
            self.streams.get_mut(key).finalize_inbound();
            self.callbacks.on_message_end(stream_id)?;
            if self.streams.get(key).is_closed() {
                self.streams.free(key);
                self.callbacks.on_stream_end(stream_id)?;
            }
        }
        Ok(())
    }

    fn handle_priority(&mut self, frame: frame::Priority) -> Result<()> {
        let _ = frame;
        Ok(())
    }

    fn handle_reset(&mut self, frame: frame::Reset) -> Result<()> {
        let stream_id = frame.stream_id();
        match self.streams.find(stream_id) {
            Some(key) => {
                self.streams.free(key);
                self.callbacks.on_stream_end(stream_id)
            }
            None => {
                if self.streams.was_recently_reset(stream_id) {
                    Ok(())
                } else {
                    self.fatal(Reason::PROTOCOL_ERROR)
                }
            }
        }
    }

    fn handle_settings(&mut self, frame: frame::SettingsFrame) -> Result<()> {
        if frame.is_ack() {
            return self.callbacks.on_settings();
        }

        for &(id, value) in frame.values() {
            match id {
                2 if value > 1 => return self.fatal(Reason::PROTOCOL_ERROR),
                4 if value > 0x7FFF_FFFF => return self.fatal(Reason::FLOW_CONTROL_ERROR),
                5 if !(crate::settings::MIN_MAX_FRAME_SIZE..=crate::settings::MAX_MAX_FRAME_SIZE)
                    .contains(&value) =>
                {
                    return self.fatal(Reason::PROTOCOL_ERROR);
                }
                _ => {}
            }
        }

        for &(id, value) in frame.values() {
            self.settings_remote.apply(id, value);
        }
        tracing::debug!(settings = ?self.settings_remote, "applied remote settings");
        self.hpack_encoder.set_limit_upper(self.settings_remote.header_table_size as usize);
        self.hpack_encoder.set_limit(self.settings_remote.header_table_size as usize);

        self.send_frame_simple(Frame::Settings(frame::SettingsFrame::ack()))?;
        self.callbacks.on_settings()
    }

    fn handle_ping(&mut self, frame: frame::Ping) -> Result<()> {
        if frame.is_ack() {
            self.callbacks.on_pong(frame.payload())
        } else {
            self.send_frame_simple(Frame::Ping(frame::Ping::pong(frame.payload())))
        }
    }

    fn handle_goaway(&mut self, frame: frame::GoAway) -> Result<()> {
        Err(Error::transport(frame.reason()))
    }

    fn handle_window_update(&mut self, frame: frame::WindowUpdate) -> Result<()> {
        let stream_id = frame.stream_id();
        let increment = frame.size_increment();

        if stream_id.is_zero() {
            if self.window_send.increase(increment).is_err() {
                return self.fatal(Reason::FLOW_CONTROL_ERROR);
            }
            return self.callbacks.on_flow_increase(StreamId::ZERO);
        }

        match self.streams.find(stream_id) {
            Some(key) => {
                if self.streams.get_mut(key).send_window_mut().increase(increment).is_err() {
                    return self.reset_stream(stream_id, Reason::FLOW_CONTROL_ERROR);
                }
                self.callbacks.on_flow_increase(stream_id)
            }
            None => {
                if self.streams.was_recently_reset(stream_id) {
                    Ok(())
                } else {
                    self.fatal(Reason::PROTOCOL_ERROR)
                }
            }
        }
    }

    /// Resets a stream: sends RST_STREAM and either frees it immediately, or (if a
    /// HEADERS/CONTINUATION sequence for it is in flight) latches `NOP_HEADERS` so the
    /// sequence can still be HPACK-decoded for dynamic-table parity once it completes
    /// (§9's RST_STREAM-mid-CONTINUATION open question).
    fn reset_stream(&mut self, stream_id: StreamId, reason: Reason) -> Result<()> {
        tracing::debug!(?stream_id, ?reason, "resetting stream");
        self.send_frame_simple(Frame::Reset(frame::Reset::new(stream_id, reason)))?;
        self.streams.mark_reset(stream_id);

        let key = match self.streams.find(stream_id) {
            Some(k) => k,
            None => return Ok(()),
        };

        let mid_continuation =
            matches!(&self.continued, Some(c) if c.stream_id == stream_id);
        if mid_continuation {
            self.streams.get_mut(key).set_accept(Accept::NOP_HEADERS);
            Ok(())
        } else {
            self.streams.free(key);
            self.callbacks.on_stream_end(stream_id)
        }
    }

    fn fatal(&mut self, reason: Reason) -> Result<()> {
        tracing::warn!(?reason, "connection fatal, sending GOAWAY");
        self.emit_goaway(reason)?;
        Err(Error::transport(reason))
    }

    fn emit_goaway(&mut self, reason: Reason) -> Result<()> {
        let last = StreamId::new(self.streams.last(Side::Remote));
        self.goaway_sent = Some(last);
        self.send_frame_simple(Frame::GoAway(frame::GoAway::new(last, reason)))
    }

    fn send_window_update(&mut self, stream_id: StreamId, increment: u32) -> Result<()> {
        if increment == 0 {
            return Ok(());
        }
        self.send_frame_simple(Frame::WindowUpdate(frame::WindowUpdate::new(stream_id, increment)))
    }

    /// Encodes and writes a frame whose wire form is a single, self-contained `encode()`
    /// call (everything but HEADERS/PUSH_PROMISE/CONTINUATION, which need CONTINUATION
    /// splitting and are written via [`Connection::write_header_block`] instead).
    fn send_frame_simple(&mut self, frame: Frame) -> Result<()> {
        let mut buf = Vec::new();
        match &frame {
            Frame::Data(f) => f.encode(&mut buf),
            Frame::Settings(f) => f.encode(&mut buf),
            Frame::GoAway(f) => f.encode(&mut buf),
            Frame::Ping(f) => f.encode(&mut buf),
            Frame::Reset(f) => f.encode(&mut buf),
            Frame::Priority(f) => f.encode(&mut buf),
            Frame::WindowUpdate(f) => f.encode(&mut buf),
            Frame::Headers(_) | Frame::PushPromise(_) | Frame::Continuation(_) => {
                unreachable!("header-bearing frames go through write_header_block")
            }
        }
        self.callbacks.on_frame_send(&frame)?;
        self.callbacks.on_write(&buf)
    }

    /// Writes a HEADERS or PUSH_PROMISE frame (carrying `block`'s first chunk) followed
    /// by as many CONTINUATION frames as needed to carry the rest, splitting on the
    /// peer's advertised `max_frame_size` (§4.4, §4.7).
    fn write_header_block(
        &mut self,
        stream_id: StreamId,
        promised_id: Option<StreamId>,
        block: &[u8],
        end_stream: bool,
    ) -> Result<()> {
        let max_frame = self.settings_remote.max_frame_size as usize;
        let mut offset = 0;
        let mut first = true;

        loop {
            let header_room = if first { promised_id.map_or(0, |_| 4) } else { 0 };
            let cap = max_frame.saturating_sub(header_room).max(1);
            let take = (block.len() - offset).min(cap);
            let chunk = &block[offset..offset + take];
            offset += take;
            let is_last = offset >= block.len();

            let mut buf = Vec::new();
            if first {
                let mut flags = if is_last { FLAG_END_HEADERS } else { 0 };
                if end_stream {
                    flags |= FLAG_END_STREAM;
                }
                match promised_id {
                    Some(pid) => {
                        Head::new(Kind::PushPromise, flags, stream_id, chunk.len() + 4).encode(&mut buf);
                        let mut idbuf = [0u8; 4];
                        pid.write_into(&mut idbuf);
                        buf.extend_from_slice(&idbuf);
                    }
                    None => {
                        Head::new(Kind::Headers, flags, stream_id, chunk.len()).encode(&mut buf);
                    }
                }
            } else {
                let flags = if is_last { FLAG_END_HEADERS } else { 0 };
                Head::new(Kind::Continuation, flags, stream_id, chunk.len()).encode(&mut buf);
            }
            buf.extend_from_slice(chunk);
            self.callbacks.on_write(&buf)?;

            first = false;
            if is_last {
                return Ok(());
            }
        }
    }

    fn write_data_frames(&mut self, stream_id: StreamId, bytes: &[u8], end_stream: bool) -> Result<()> {
        let max_frame = self.settings_remote.max_frame_size as usize;
        if bytes.is_empty() {
            return self.send_frame_simple(Frame::Data(frame::Data::new(stream_id, Bytes::new(), end_stream)));
        }

        let mut offset = 0;
        while offset < bytes.len() {
            let take = (bytes.len() - offset).min(max_frame);
            let chunk = Bytes::copy_from_slice(&bytes[offset..offset + take]);
            offset += take;
            let is_last = offset >= bytes.len();
            self.send_frame_simple(Frame::Data(frame::Data::new(stream_id, chunk, is_last && end_stream)))?;
        }
        Ok(())
    }

    // ---- HTTP/1.x mode (§4.6) -------------------------------------------------------

    fn try_h1_ready(&mut self) -> Result<bool> {
        loop {
            if self.buf.as_view().starts_with(b"\r\n") {
                self.buf.shift(2);
            } else {
                break;
            }
        }

        let view = self.buf.as_view();
        if self.role == Role::Server && !self.forbid_prior_knowledge_h2 {
            let n = view.len().min(PREFACE.len());
            if view[..n] == PREFACE[..n] {
                if view.len() < PREFACE.len() {
                    return Ok(false);
                }
                self.buf.shift(PREFACE.len());
                return self.begin_h2_after_consumed_preface().map(|_| true);
            }
        }

        let outcome = if self.role == Role::Server {
            self.http1_parser.parse_request(view).map(Http1Outcome::Request)
        } else {
            self.http1_parser.parse_response(view).map(Http1Outcome::Response)
        };

        match outcome {
            Err(_) => Err(Error::transport(Reason::PROTOCOL_ERROR)),
            Ok(Http1Outcome::Request(ParseOutcome::NeedMoreData))
            | Ok(Http1Outcome::Response(ParseOutcome::NeedMoreData)) => Ok(false),
            Ok(Http1Outcome::Request(ParseOutcome::Parsed { message, consumed })) => {
                self.buf.shift(consumed);
                self.begin_h1_message(true, Some(message.method), Some(message.path), None, message.headers)?;
                Ok(true)
            }
            Ok(Http1Outcome::Response(ParseOutcome::Parsed { message, consumed })) => {
                self.buf.shift(consumed);
                self.begin_h1_message(false, None, None, Some(message.status), message.headers)?;
                Ok(true)
            }
        }
    }

    fn begin_h2_after_consumed_preface(&mut self) -> Result<()> {
        self.send_frame_simple(Frame::Settings(frame::SettingsFrame::new(full_settings_values(
            &self.settings_local,
        ))))?;
        self.state = State::ReadyNoSettings;
        Ok(())
    }

    fn begin_h1_message(
        &mut self,
        is_request: bool,
        method: Option<Method>,
        path: Option<Bytes>,
        status: Option<StatusCode>,
        raw_headers: Vec<h1::Http1Header>,
    ) -> Result<()> {
        let mut headers = HeaderMap::new();
        let mut content_length: Option<u32> = None;
        let mut saw_content_length = false;
        let mut chunked = false;
        let mut authority: Option<Bytes> = None;
        let mut upgrade_value: Option<Bytes> = None;

        for header in raw_headers {
            let lower: Vec<u8> = header.name.iter().map(u8::to_ascii_lowercase).collect();
            match lower.as_slice() {
                b"host" => {
                    authority = Some(header.value.clone());
                    continue;
                }
                b"content-length" => {
                    if saw_content_length {
                        return Err(Error::transport(Reason::PROTOCOL_ERROR));
                    }
                    saw_content_length = true;
                    let text = std::str::from_utf8(&header.value)
                        .map_err(|_| Error::transport(Reason::PROTOCOL_ERROR))?;
                    if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(Error::transport(Reason::PROTOCOL_ERROR));
                    }
                    content_length =
                        Some(text.parse().map_err(|_| Error::transport(Reason::PROTOCOL_ERROR))?);
                }
                b"transfer-encoding" => {
                    if !header.value.eq_ignore_ascii_case(b"identity") {
                        chunked = true;
                    }
                }
                b"upgrade" => upgrade_value = Some(header.value.clone()),
                _ => {}
            }

            let name = HeaderName::from_bytes(&lower).map_err(|_| Error::transport(Reason::PROTOCOL_ERROR))?;
            let value =
                HeaderValue::from_bytes(&header.value).map_err(|_| Error::transport(Reason::PROTOCOL_ERROR))?;
            headers.append(name, value);
        }

        self.http1_remaining = if chunked { u32::MAX } else { content_length.unwrap_or(0) };

        let mut pseudo = Pseudo::default();
        if is_request {
            pseudo.method = method;
            pseudo.path = path;
            pseudo.authority = authority;
            pseudo.scheme = Some(Bytes::from_static(b"unknown"));
        } else {
            pseudo.status = status;
        }

        let stream_id = StreamId::new(1);
        let message = Message { pseudo, headers };

        if is_request {
            if let Some(upgrade) = &upgrade_value {
                if upgrade.eq_ignore_ascii_case(b"h2c") && !self.forbid_h2_upgrade {
                    self.callbacks.on_message_start(stream_id, &message)?;
                    return self.respond_101_and_upgrade();
                }
                if self.callbacks.on_upgrade()? {
                    self.callbacks.on_message_start(stream_id, &message)?;
                    self.state = State::UnknownProtocolUpgrade;
                    return Ok(());
                }
            }
        }

        self.callbacks.on_message_start(stream_id, &message)?;
        if self.http1_remaining == 0 {
            self.callbacks.on_message_end(stream_id)?;
        } else {
            self.state = State::H1Reading;
        }
        Ok(())
    }

    fn respond_101_and_upgrade(&mut self) -> Result<()> {
        self.callbacks
            .on_write(b"HTTP/1.1 101 Switching Protocols\r\nConnection: Upgrade\r\nUpgrade: h2c\r\n\r\n")?;
        self.callbacks.on_write(PREFACE)?;
        self.send_frame_simple(Frame::Settings(frame::SettingsFrame::new(full_settings_values(
            &self.settings_local,
        ))))?;
        self.state = State::H1ReadingUpgrade;
        Ok(())
    }

    fn try_h1_body(&mut self) -> Result<bool> {
        let stream_id = StreamId::new(1);

        if self.http1_remaining == 0 {
            self.callbacks.on_message_end(stream_id)?;
            self.state = if self.state == State::H1ReadingUpgrade { State::Preface } else { State::H1Ready };
            return Ok(true);
        }

        if self.http1_remaining == u32::MAX {
            let view = self.buf.as_view();
            match h1::parse_chunk_header(view).map_err(|_| Error::transport(Reason::PROTOCOL_ERROR))? {
                None => Ok(false),
                Some((size, header_len)) => {
                    if view.len() < header_len + size + 2 {
                        return Ok(false);
                    }
                    if size == 0 {
                        self.buf.shift(header_len + 2);
                        self.http1_remaining = 0;
                    } else {
                        let data = view[header_len..header_len + size].to_vec();
                        self.buf.shift(header_len + size + 2);
                        self.callbacks.on_message_data(stream_id, &data)?;
                    }
                    Ok(true)
                }
            }
        } else {
            let view = self.buf.as_view();
            if view.is_empty() {
                return Ok(false);
            }
            let take = view.len().min(self.http1_remaining as usize);
            let data = view[..take].to_vec();
            self.buf.shift(take);
            self.http1_remaining -= take as u32;
            self.callbacks.on_message_data(stream_id, &data)?;
            Ok(true)
        }
    }

    // ---- write-side API (§4.7) -----------------------------------------------------

    /// Writes a message's headers (request, response, or trailers, depending on mode and
    /// `stream_id`) and opens the stream's write side. Passing `stream_id: None` asks a
    /// client to originate a fresh stream; returns the id actually used.
    pub fn write_message(
        &mut self,
        stream_id: Option<StreamId>,
        pseudo: Pseudo,
        headers: HeaderMap,
        final_: bool,
    ) -> Result<StreamId> {
        let is_informational = pseudo.status.map_or(false, |s| s.as_u16() < 200);
        if is_informational && final_ {
            return Err(Error::Assertion("an informational response cannot be final"));
        }

        let (id, key) = match stream_id {
            Some(id) => {
                let key = self
                    .streams
                    .find(id)
                    .ok_or_else(|| Error::invalid_stream(id, "unknown stream"))?;
                if !self.streams.get(key).accept().contains(Accept::WRITE_HEADERS) {
                    return Err(Error::invalid_stream(id, "stream does not accept write_message"));
                }
                (id, key)
            }
            None => {
                if self.role != Role::Client {
                    return Err(Error::Assertion("only a client may originate a stream implicitly"));
                }
                let id = self.streams.next_local_id()?;
                let max = self.settings_remote.max_concurrent_streams;
                let key = self.streams.insert(
                    id,
                    Side::Local,
                    Accept::HEADERS | Accept::PUSH | Accept::WRITE_HEADERS,
                    self.settings_remote.initial_window_size as i32,
                    self.settings_local.initial_window_size as i32,
                    max,
                )?;
                self.callbacks.on_stream_start(id)?;
                (id, key)
            }
        };

        match self.mode() {
            Mode::Http1 => self.write_message_h1(&pseudo, &headers, final_)?,
            Mode::Http2 => self.write_message_h2(id, pseudo, headers, final_)?,
        }

        let stream = self.streams.get_mut(key);
        stream.remove_accept(Accept::WRITE_HEADERS);
        if !is_informational {
            stream.insert_accept(Accept::WRITE_DATA);
        }
        if final_ {
            stream.finalize_outbound();
            if stream.is_closed() {
                self.streams.free(key);
                self.callbacks.on_stream_end(id)?;
            }
        }

        Ok(id)
    }

    fn write_message_h2(
        &mut self,
        stream_id: StreamId,
        pseudo: Pseudo,
        headers: HeaderMap,
        final_: bool,
    ) -> Result<()> {
        let block = self.encode_header_block(&pseudo, &headers);
        self.write_header_block(stream_id, None, &block, final_)
    }

    fn encode_header_block(&mut self, pseudo: &Pseudo, headers: &HeaderMap) -> Vec<u8> {
        let mut items: Vec<(Bytes, Bytes, Indexing)> = Vec::new();
        if let Some(method) = &pseudo.method {
            items.push((
                Bytes::from_static(b":method"),
                Bytes::copy_from_slice(method.as_str().as_bytes()),
                Indexing::Incremental,
            ));
        }
        if let Some(scheme) = &pseudo.scheme {
            items.push((Bytes::from_static(b":scheme"), scheme.clone(), Indexing::Incremental));
        }
        if let Some(authority) = &pseudo.authority {
            items.push((Bytes::from_static(b":authority"), authority.clone(), Indexing::Incremental));
        }
        if let Some(path) = &pseudo.path {
            items.push((Bytes::from_static(b":path"), path.clone(), Indexing::WithoutIndexing));
        }
        if let Some(status) = pseudo.status {
            items.push((
                Bytes::from_static(b":status"),
                Bytes::copy_from_slice(status.as_str().as_bytes()),
                Indexing::Incremental,
            ));
        }
        for (name, value) in headers.iter() {
            items.push((
                Bytes::copy_from_slice(name.as_str().as_bytes()),
                Bytes::copy_from_slice(value.as_bytes()),
                Indexing::Incremental,
            ));
        }

        let mut block = Vec::new();
        self.hpack_encoder.encode(items, &mut block);
        block
    }

    fn write_message_h1(&mut self, pseudo: &Pseudo, headers: &HeaderMap, final_: bool) -> Result<()> {
        let mut out = Vec::new();

        if self.role == Role::Client {
            let method = pseudo.method.clone().unwrap_or(Method::GET);
            let path = pseudo.path.clone().unwrap_or_else(|| Bytes::from_static(b"/"));
            out.extend_from_slice(method.as_str().as_bytes());
            out.push(b' ');
            out.extend_from_slice(&path);
            out.extend_from_slice(b" HTTP/1.1\r\n");
            if let Some(authority) = &pseudo.authority {
                out.extend_from_slice(b"host: ");
                out.extend_from_slice(authority);
                out.extend_from_slice(b"\r\n");
            }
        } else {
            let status = pseudo.status.unwrap_or(StatusCode::OK);
            out.extend_from_slice(
                format!("HTTP/1.1 {} {}\r\n", status.as_u16(), status.canonical_reason().unwrap_or(""))
                    .as_bytes(),
            );
        }

        let mut saw_connection = false;
        let mut wants_chunked = false;
        for (name, value) in headers.iter() {
            if name == http::header::CONNECTION {
                saw_connection = true;
            }
            if name == http::header::TRANSFER_ENCODING {
                let (rest, had_chunked) = strip_trailing_chunked(value.as_bytes());
                wants_chunked |= had_chunked;
                if !rest.is_empty() {
                    out.extend_from_slice(name.as_str().as_bytes());
                    out.extend_from_slice(b": ");
                    out.extend_from_slice(rest);
                    out.extend_from_slice(b"\r\n");
                }
                continue;
            }
            out.extend_from_slice(name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(value.as_bytes());
            out.extend_from_slice(b"\r\n");
        }

        let chunked = wants_chunked || (!final_ && !headers.contains_key(http::header::CONTENT_LENGTH));
        if chunked {
            out.extend_from_slice(b"transfer-encoding: chunked\r\n");
        }
        if !saw_connection {
            out.extend_from_slice(b"connection: keep-alive\r\n");
        }
        out.extend_from_slice(b"\r\n");

        self.currently_writing_chunked = chunked;
        self.callbacks.on_write(&out)
    }

    /// Writes up to `bytes.len()` body bytes, clamped by flow control in HTTP/2 mode;
    /// returns how many bytes were actually written (§4.7). The caller must retry the
    /// remainder later (e.g. once `on_flow_increase` fires).
    pub fn write_data(&mut self, stream_id: StreamId, bytes: &[u8], final_: bool) -> Result<usize> {
        let key = self
            .streams
            .find(stream_id)
            .ok_or_else(|| Error::invalid_stream(stream_id, "unknown stream"))?;
        if !self.streams.get(key).accept().contains(Accept::WRITE_DATA) {
            return Err(Error::invalid_stream(stream_id, "stream does not accept write_data"));
        }

        match self.mode() {
            Mode::Http1 => {
                let mut out = Vec::new();
                if self.currently_writing_chunked {
                    h1::write_chunk(&mut out, bytes);
                    if final_ {
                        h1::write_last_chunk(&mut out);
                    }
                } else {
                    out.extend_from_slice(bytes);
                }
                self.callbacks.on_write(&out)?;
                self.finish_write_data(key, stream_id, final_)?;
                Ok(bytes.len())
            }
            Mode::Http2 => {
                let conn_allow = self.window_send.clamp(bytes.len());
                let stream_allow = self.streams.get(key).send_window().clamp(bytes.len());
                let allowed = conn_allow.min(stream_allow);
                if allowed == 0 && !bytes.is_empty() {
                    return Ok(0);
                }

                let effective_final = final_ && allowed == bytes.len();
                self.write_data_frames(stream_id, &bytes[..allowed], effective_final)?;
                self.window_send.consume(allowed);
                self.streams.get_mut(key).send_window_mut().consume(allowed);
                self.finish_write_data(key, stream_id, effective_final)?;
                Ok(allowed)
            }
        }
    }

    fn finish_write_data(&mut self, key: crate::stream::store::Key, stream_id: StreamId, final_: bool) -> Result<()> {
        if !final_ {
            return Ok(());
        }
        self.streams.get_mut(key).finalize_outbound();
        if self.streams.get(key).is_closed() {
            self.streams.free(key);
            self.callbacks.on_stream_end(stream_id)?;
        }
        Ok(())
    }

    /// Pushes a synthetic request/response pair onto a new, server-initiated stream
    /// (§4.7). Returns `Ok(None)` if the peer has push disabled rather than erroring.
    pub fn write_push(
        &mut self,
        parent_id: StreamId,
        pseudo: Pseudo,
        headers: HeaderMap,
    ) -> Result<Option<StreamId>> {
        if self.role != Role::Server {
            return Err(Error::Assertion("only a server may push"));
        }
        if self.mode() != Mode::Http2 {
            return Err(Error::Assertion("push requires HTTP/2 mode"));
        }
        if self.settings_remote.enable_push != 1 {
            return Ok(None);
        }

        let parent_key = self
            .streams
            .find(parent_id)
            .ok_or_else(|| Error::invalid_stream(parent_id, "unknown stream"))?;
        if !self.streams.get(parent_key).accept().contains(Accept::WRITE_PUSH) {
            return Err(Error::invalid_stream(parent_id, "stream does not accept write_push"));
        }

        let child_id = self.streams.next_local_id()?;
        let max = self.settings_remote.max_concurrent_streams;
        let child_key = self.streams.insert(
            child_id,
            Side::Local,
            Accept::WRITE_HEADERS,
            self.settings_remote.initial_window_size as i32,
            self.settings_local.initial_window_size as i32,
            max,
        )?;
        self.callbacks.on_stream_start(child_id)?;

        let block = self.encode_header_block(&pseudo, &headers);
        self.write_header_block(parent_id, Some(child_id), &block, false)?;

        let message = Message { pseudo, headers };
        self.callbacks.on_message_start(child_id, &message)?;
        self.callbacks.on_message_end(child_id)?;

        let stream = self.streams.get_mut(child_key);
        stream.remove_accept(Accept::WRITE_HEADERS);
        stream.insert_accept(Accept::WRITE_DATA);

        Ok(Some(child_id))
    }

    /// Resets a stream locally, or (`stream_id` zero) tears the whole connection down
    /// with a GOAWAY carrying `reason` (§4.7).
    pub fn write_reset(&mut self, stream_id: StreamId, reason: Reason) -> Result<()> {
        if stream_id.is_zero() {
            return self.emit_goaway(reason);
        }
        if self.streams.find(stream_id).is_some() {
            self.reset_stream(stream_id, reason)
        } else {
            Ok(())
        }
    }

    pub fn write_ping(&mut self, payload: [u8; 8]) -> Result<()> {
        if self.mode() != Mode::Http2 {
            return Err(Error::Assertion("write_ping requires HTTP/2 mode"));
        }
        self.send_frame_simple(Frame::Ping(frame::Ping::ping(payload)))
    }

    /// Writes a connection- or stream-level control frame directly; header-bearing
    /// frames must go through `write_message`/`write_push` instead (§4.7).
    pub fn write_frame(&mut self, frame: Frame) -> Result<()> {
        if self.mode() != Mode::Http2 {
            return Err(Error::Assertion("write_frame requires HTTP/2 mode"));
        }
        match &frame {
            Frame::Headers(_) | Frame::PushPromise(_) | Frame::Continuation(_) => {
                Err(Error::Assertion("use write_message/write_push for header-bearing frames"))
            }
            _ => self.send_frame_simple(frame),
        }
    }

    /// Grants more receive window back to the peer; only meaningful when manual flow
    /// control is enabled (§4.7).
    pub fn increase_flow_window(&mut self, stream_id: StreamId, increment: u32) -> Result<()> {
        if self.mode() != Mode::Http2 {
            return Err(Error::Assertion("increase_flow_window requires HTTP/2 mode"));
        }
        if stream_id.is_zero() {
            return self.send_window_update(StreamId::ZERO, increment);
        }
        if self.streams.find(stream_id).is_none() {
            return Err(Error::invalid_stream(stream_id, "unknown stream"));
        }
        self.send_window_update(stream_id, increment)
    }
}

fn full_settings_values(s: &Settings) -> Vec<(u16, u32)> {
    vec![
        (1, s.header_table_size),
        (2, s.enable_push),
        (3, s.max_concurrent_streams),
        (4, s.initial_window_size),
        (5, s.max_frame_size),
        (6, s.max_header_list_size),
    ]
}

/// Strips a trailing `, chunked` (case-insensitive, whitespace-tolerant) token off an
/// HTTP/1 `transfer-encoding` value, per §4.7's "stripping trailing `, chunked` from
/// `transfer-encoding`" — the caller re-synthesizes the chunked token separately, driven
/// by the body's actual framing rather than whatever the caller happened to pass in.
/// Returns the remaining value (empty if the whole thing was `chunked`) and whether a
/// trailing `chunked` token was found at all.
fn strip_trailing_chunked(value: &[u8]) -> (&[u8], bool) {
    let trimmed_end = value.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(0, |i| i + 1);
    let trimmed = &value[..trimmed_end];

    if trimmed.eq_ignore_ascii_case(b"chunked") {
        return (&value[..0], true);
    }

    let head = match strip_suffix_ignore_case(trimmed, b"chunked") {
        Some(head) => head,
        None => return (value, false),
    };
    let head_end = head.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(0, |i| i + 1);
    if head_end == 0 || head[head_end - 1] != b',' {
        return (value, false);
    }
    let rest_end = head[..head_end - 1].iter().rposition(|b| !b.is_ascii_whitespace()).map_or(0, |i| i + 1);
    (&value[..rest_end], true)
}

fn strip_suffix_ignore_case<'a>(s: &'a [u8], suffix: &[u8]) -> Option<&'a [u8]> {
    if s.len() < suffix.len() {
        return None;
    }
    let (head, tail) = s.split_at(s.len() - suffix.len());
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Recorder {
        written: Vec<u8>,
        messages: Vec<StreamId>,
        data: Vec<(StreamId, Vec<u8>)>,
        ends: Vec<StreamId>,
    }

    struct TestCallbacks(Rc<RefCell<Recorder>>);

    impl Callbacks for TestCallbacks {
        fn on_write(&mut self, bytes: &[u8]) -> Result<()> {
            self.0.borrow_mut().written.extend_from_slice(bytes);
            Ok(())
        }
        fn on_message_start(&mut self, id: StreamId, _message: &Message) -> Result<()> {
            self.0.borrow_mut().messages.push(id);
            Ok(())
        }
        fn on_message_data(&mut self, id: StreamId, bytes: &[u8]) -> Result<()> {
            self.0.borrow_mut().data.push((id, bytes.to_vec()));
            Ok(())
        }
        fn on_message_end(&mut self, id: StreamId) -> Result<()> {
            self.0.borrow_mut().ends.push(id);
            Ok(())
        }
    }

    fn new_pair() -> (Connection<TestCallbacks>, Connection<TestCallbacks>, Rc<RefCell<Recorder>>, Rc<RefCell<Recorder>>) {
        let client_rec = Rc::new(RefCell::new(Recorder::default()));
        let server_rec = Rc::new(RefCell::new(Recorder::default()));
        let client = Connection::new(
            Role::Client,
            TestCallbacks(client_rec.clone()),
            Box::new(h1::HttparseParser),
        );
        let server = Connection::new(
            Role::Server,
            TestCallbacks(server_rec.clone()),
            Box::new(h1::HttparseParser),
        );
        (client, server, client_rec, server_rec)
    }

    fn drain(from: &Rc<RefCell<Recorder>>) -> Vec<u8> {
        std::mem::take(&mut from.borrow_mut().written)
    }

    #[test]
    fn h2_preface_and_settings_handshake_round_trips() {
        let (mut client, mut server, client_rec, server_rec) = new_pair();
        client.made(Version::Http2).unwrap();
        server.made(Version::Http2).unwrap();

        let to_server = drain(&client_rec);
        server.data_received(&to_server).unwrap();

        let to_client = drain(&server_rec);
        client.data_received(&to_client).unwrap();

        assert_eq!(client.state, State::Ready);
        assert_eq!(server.state, State::Ready);
    }

    #[test]
    fn request_response_round_trip_over_h2() {
        let (mut client, mut server, client_rec, server_rec) = new_pair();
        client.made(Version::Http2).unwrap();
        server.made(Version::Http2).unwrap();
        server.data_received(&drain(&client_rec)).unwrap();
        client.data_received(&drain(&server_rec)).unwrap();

        let pseudo = Pseudo::request(Method::GET, Bytes::from_static(b"/"), Some(Bytes::from_static(b"https")), None);
        let id = client.write_message(None, pseudo, HeaderMap::new(), true).unwrap();
        assert_eq!(id, StreamId::new(1));

        server.data_received(&drain(&client_rec)).unwrap();
        assert_eq!(server_rec.borrow().messages, vec![StreamId::new(1)]);

        let resp_pseudo = Pseudo::response(StatusCode::OK);
        server.write_message(Some(StreamId::new(1)), resp_pseudo, HeaderMap::new(), true).unwrap();

        client.data_received(&drain(&server_rec)).unwrap();
        assert_eq!(client_rec.borrow().messages, vec![StreamId::new(1)]);
        assert_eq!(client_rec.borrow().ends, vec![StreamId::new(1)]);
    }

    #[test]
    fn write_message_h1_strips_trailing_chunked_and_resynthesizes_from_body_framing() {
        let (_, mut server, _, server_rec) = new_pair();
        server.made(Version::Http1).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(http::header::TRANSFER_ENCODING, "gzip, chunked".parse().unwrap());
        let pseudo = Pseudo::response(StatusCode::OK);
        server.write_message_h1(&pseudo, &headers, false).unwrap();

        let text = String::from_utf8(drain(&server_rec)).unwrap();
        // The caller's `gzip` coding survives, stripped of its trailing `, chunked`;
        // the chunked token itself is re-synthesized once, driven by the body framing
        // (not final, no content-length), not copied verbatim from the input header.
        assert!(text.contains("transfer-encoding: gzip\r\n"));
        assert_eq!(text.matches("transfer-encoding:").count(), 2);
        assert!(text.contains("transfer-encoding: chunked\r\n"));
    }

    #[test]
    fn h1_request_with_content_length_delivers_body_then_end() {
        let (_, mut server, _, server_rec) = new_pair();
        server.made(Version::Http1).unwrap();
        server
            .data_received(b"POST /x HTTP/1.1\r\nHost: a\r\nContent-Length: 5\r\n\r\nhello")
            .unwrap();
        assert_eq!(server_rec.borrow().messages, vec![StreamId::new(1)]);
        assert_eq!(server_rec.borrow().data, vec![(StreamId::new(1), b"hello".to_vec())]);
        assert_eq!(server_rec.borrow().ends, vec![StreamId::new(1)]);
    }

    #[test]
    fn h1_chunked_request_assembles_across_chunks() {
        let (_, mut server, _, server_rec) = new_pair();
        server.made(Version::Http1).unwrap();
        server
            .data_received(b"POST /x HTTP/1.1\r\nHost: a\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n")
            .unwrap();
        assert_eq!(server_rec.borrow().data, vec![(StreamId::new(1), b"hello".to_vec())]);
        assert_eq!(server_rec.borrow().ends, vec![StreamId::new(1)]);
    }

    #[test]
    fn settings_ack_advances_ready_no_settings_to_ready() {
        let (mut client, mut server, client_rec, server_rec) = new_pair();
        client.made(Version::Http2).unwrap();
        server.made(Version::Http2).unwrap();
        assert_eq!(client.state, State::ReadyNoSettings);
        server.data_received(&drain(&client_rec)).unwrap();
        client.data_received(&drain(&server_rec)).unwrap();
        assert_eq!(client.state, State::Ready);
    }

    #[test]
    fn unexpected_first_frame_before_settings_is_fatal() {
        let (_, mut server, _, _) = new_pair();
        server.made(Version::Http2).unwrap();
        server.data_received(PREFACE).unwrap();

        let mut bogus = Vec::new();
        Head::new(Kind::Ping, 0, StreamId::ZERO, 8).encode(&mut bogus);
        bogus.extend_from_slice(&[0; 8]);
        assert!(server.data_received(&bogus).is_err());
    }

    #[test]
    fn unknown_frame_mid_continuation_is_fatal() {
        let (mut client, mut server, client_rec, server_rec) = new_pair();
        client.made(Version::Http2).unwrap();
        server.made(Version::Http2).unwrap();
        server.data_received(&drain(&client_rec)).unwrap();
        client.data_received(&drain(&server_rec)).unwrap();

        // A HEADERS frame without END_HEADERS latches `continued_stream`.
        let mut headers_frame = Vec::new();
        Head::new(Kind::Headers, 0, StreamId::new(1), 0).encode(&mut headers_frame);
        server.data_received(&headers_frame).unwrap();

        // An unrecognized extension frame type arriving before the matching
        // CONTINUATION must still fault the connection, not be silently skipped.
        let mut unknown_frame = Vec::new();
        Head::new(Kind::Unknown(200), 0, StreamId::new(1), 0).encode(&mut unknown_frame);
        assert!(server.data_received(&unknown_frame).is_err());
    }
}
