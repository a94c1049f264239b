//! HPACK header compression (RFC 7541), per §4.2.
//!
//! Grounded on `Atte-http2/src/hpack.rs` for the static/dynamic table split and on the
//! teacher's `frame::headers::Headers::load`/`encode` for how a decoded/encoded header
//! stream threads through pseudo-header extraction at a higher layer — this module only
//! owns the codec itself, not the HTTP semantics layered on top of it.

mod decoder;
mod encoder;
pub mod huffman;
mod table;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use table::{DynamicTable, Entry, STATIC_TABLE_LEN};

use bytes::Bytes;

/// A single decoded header field, with its HPACK indexing disposition preserved so a
/// proxying re-encoder could honor "never indexed" (§4.2 doesn't require this engine to
/// proxy, but the flag costs nothing to carry).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedHeader {
    pub name: Bytes,
    pub value: Bytes,
    pub never_indexed: bool,
}

/// How an outbound header should be represented on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indexing {
    /// May be inserted into the dynamic table and reused by future frames.
    Incremental,
    /// Must never be inserted, and a proxy must never change its representation
    /// (e.g. credentials).
    NeverIndexed,
    /// Sent as a literal without table insertion, e.g. because the value is unlikely
    /// to repeat (such as `:path`).
    WithoutIndexing,
}

/// Fatal HPACK decode errors (§4.2's "Failure modes" list) — all of these are
/// connection-level (COMPRESSION_ERROR), never stream-level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpackError {
    InvalidIndex,
    InvalidTableSizeUpdate,
    IntegerOverflow,
    TruncatedInteger,
    TruncatedString,
    HuffmanError,
    InvalidRepresentation,
}
