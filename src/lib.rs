//! A sans-I/O dual-mode HTTP/1.x and HTTP/2 protocol engine.
//!
//! [`Connection`] owns no socket, thread, or timer: it consumes inbound wire bytes via
//! [`Connection::data_received`] and produces outbound wire bytes and parsed events
//! synchronously through the [`Callbacks`] trait supplied at construction. Callers are
//! expected to own the actual transport (a TCP socket, a QUIC stream, an in-memory test
//! harness) and drive this engine from it.
//!
//! ```ignore
//! let mut conn = Builder::new(Role::Client).build(my_callbacks);
//! conn.made(Version::Http2)?;
//! conn.data_received(&bytes_from_socket)?;
//! ```

mod buffer;
mod builder;
mod callbacks;
mod connection;
mod error;
mod frame;
mod h1;
mod hpack;
mod settings;
mod stream;
mod validation;

pub use builder::Builder;
pub use callbacks::Callbacks;
pub use connection::{Connection, Role, Version, PREFACE};
pub use error::{Error, ErrorKind, Result};
pub use frame::{Frame, Pseudo, Reason, StreamId};
pub use h1::{Http1Parser, HttparseParser};
pub use settings::Settings;
pub use validation::Message;
