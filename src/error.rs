//! Tagged error kinds for the engine's fallible operations (§7).
//!
//! The reference implementation keeps a global, `errno`-style error register plus a
//! traceback stack. This rewrite threads an explicit `Result<T, Error>` through every
//! fallible call instead, per the replacement note in §9 of the design notes.

use crate::frame::Reason;
use crate::frame::StreamId;

/// The broad category of a failure, as specified in §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A programmer contract was violated by the caller (e.g. sending a 1xx response
    /// with `final = true`).
    Assertion,
    /// An allocation exceeded the byte buffer's ceiling.
    NoMemory,
    /// The stream id passed to an API call is invalid: wrong parity, unknown, or not
    /// currently writable.
    InvalidStream,
    /// The call cannot proceed right now but may succeed later (local concurrency cap
    /// reached, or an HTTP/1 request is already in flight).
    WouldBlock,
    /// The peer violated the wire protocol; the connection must be torn down. A GOAWAY
    /// is emitted before this is surfaced, where feasible.
    Transport,
    /// The peer closed the connection cleanly, or asked for disconnection via
    /// `GOAWAY(NO_ERROR)`.
    Disconnect,
}

/// An engine-level error, tagged with an [`ErrorKind`] and a human-readable reason.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("assertion failed: {0}")]
    Assertion(&'static str),

    #[error("allocation would exceed buffer ceiling")]
    NoMemory,

    #[error("invalid stream {0:?}: {1}")]
    InvalidStream(StreamId, &'static str),

    #[error("would block: {0}")]
    WouldBlock(&'static str),

    #[error("transport error: {0}")]
    Transport(Reason),

    #[error("peer disconnected: {0}")]
    Disconnect(Reason),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Assertion(_) => ErrorKind::Assertion,
            Error::NoMemory => ErrorKind::NoMemory,
            Error::InvalidStream(..) => ErrorKind::InvalidStream,
            Error::WouldBlock(_) => ErrorKind::WouldBlock,
            Error::Transport(_) => ErrorKind::Transport,
            Error::Disconnect(_) => ErrorKind::Disconnect,
        }
    }

    pub fn transport(reason: Reason) -> Error {
        if reason == Reason::NO_ERROR {
            Error::Disconnect(reason)
        } else {
            Error::Transport(reason)
        }
    }

    pub fn invalid_stream(id: StreamId, why: &'static str) -> Error {
        Error::InvalidStream(id, why)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_maps_no_error_to_disconnect() {
        assert_eq!(Error::transport(Reason::NO_ERROR).kind(), ErrorKind::Disconnect);
        assert_eq!(Error::transport(Reason::PROTOCOL_ERROR).kind(), ErrorKind::Transport);
    }
}
