//! The `Callbacks` capability trait (§6, §9 "Callback indirection" replacement note).
//!
//! The reference composes via function-pointer fields on the connection; per §9 this is
//! replaced with a single trait object supplied at construction, analogous to the
//! teacher's `Peer` trait that parameterizes `Connection<T, P, B>`.

use crate::error::Result;
use crate::frame::{Frame, StreamId};
use crate::validation::Message;
use http::HeaderMap;

/// The observer interface a caller implements to drive this engine (§6). Every method
/// returns `Ok(())` or a propagatable error; a non-`Ok` return aborts the current
/// `data_received`/`write_*` call and becomes its return value (§5 "no cancellation").
///
/// All methods except `on_write` have a default no-op implementation, since most
/// callers only care about a handful of these events.
pub trait Callbacks {
    /// Wire bytes to be written back to the transport, in exact wire order (§5
    /// "Ordering guarantees").
    fn on_write(&mut self, bytes: &[u8]) -> Result<()>;

    fn on_stream_start(&mut self, _id: StreamId) -> Result<()> {
        Ok(())
    }

    fn on_stream_end(&mut self, _id: StreamId) -> Result<()> {
        Ok(())
    }

    fn on_message_start(&mut self, _id: StreamId, _message: &Message) -> Result<()> {
        Ok(())
    }

    fn on_message_data(&mut self, _id: StreamId, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }

    fn on_message_trail(&mut self, _id: StreamId, _trailers: &HeaderMap) -> Result<()> {
        Ok(())
    }

    fn on_message_end(&mut self, _id: StreamId) -> Result<()> {
        Ok(())
    }

    fn on_message_push(&mut self, _parent: StreamId, _message: &Message, _child: StreamId) -> Result<()> {
        Ok(())
    }

    fn on_frame(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    fn on_frame_send(&mut self, _frame: &Frame) -> Result<()> {
        Ok(())
    }

    fn on_settings(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_flow_increase(&mut self, _id: StreamId) -> Result<()> {
        Ok(())
    }

    fn on_pong(&mut self, _opaque: [u8; 8]) -> Result<()> {
        Ok(())
    }

    /// Fired when the peer requests an `Upgrade:` to a protocol other than `h2c`
    /// (§4.6). Returning `Ok(true)` accepts the upgrade (engine transitions to
    /// `UNKNOWN_PROTOCOL_UPGRADE`/`UNKNOWN_PROTOCOL`, §4.6); `Ok(false)` (the default)
    /// declines it.
    fn on_upgrade(&mut self) -> Result<bool> {
        Ok(false)
    }
}
