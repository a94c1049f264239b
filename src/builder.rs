//! Constructs a [`Connection`] (§4.8).
//!
//! Grounded on the teacher's `client::Builder`/`server::Builder`: a plain struct of
//! knobs set via chained `&mut self -> &mut Self` setters, consumed by a `build`-style
//! method at the end. Both client and server builders collapse into one type here since
//! role is just a field, not a separate generic parameter (§9's `Peer` replacement note).

use crate::callbacks::Callbacks;
use crate::connection::{Connection, Role};
use crate::h1::{Http1Parser, HttparseParser};
use crate::settings::Settings;

/// Builds a [`Connection`] with non-default knobs (§4.8).
pub struct Builder {
    role: Role,
    settings: Settings,
    manual_flow_control: bool,
    forbid_h2_upgrade: bool,
    forbid_prior_knowledge_h2: bool,
    http1_parser: Box<dyn Http1Parser>,
}

impl Builder {
    pub fn new(role: Role) -> Builder {
        Builder {
            role,
            settings: Settings::INITIAL,
            manual_flow_control: false,
            forbid_h2_upgrade: false,
            forbid_prior_knowledge_h2: false,
            http1_parser: Box::new(HttparseParser),
        }
    }

    /// Sets the `Settings` record advertised in this connection's first SETTINGS frame.
    pub fn settings(&mut self, settings: Settings) -> &mut Self {
        self.settings = settings;
        self
    }

    /// Supplies a non-default HTTP/1.x byte-parser (§1 "external collaborator").
    pub fn http1_parser(&mut self, parser: Box<dyn Http1Parser>) -> &mut Self {
        self.http1_parser = parser;
        self
    }

    /// Disables the automatic per-stream WINDOW_UPDATE the engine would otherwise emit
    /// on delivery, leaving window replenishment to `Connection::increase_flow_window`.
    pub fn manual_flow_control(&mut self, manual: bool) -> &mut Self {
        self.manual_flow_control = manual;
        self
    }

    /// Rejects an `Upgrade: h2c` request instead of switching protocols (§4.6).
    pub fn forbid_h2_upgrade(&mut self, forbid: bool) -> &mut Self {
        self.forbid_h2_upgrade = forbid;
        self
    }

    /// Disables prior-knowledge HTTP/2 detection on a server connection started in
    /// HTTP/1.x mode (§4.6); every request is then parsed as HTTP/1.x.
    pub fn forbid_prior_knowledge_h2(&mut self, forbid: bool) -> &mut Self {
        self.forbid_prior_knowledge_h2 = forbid;
        self
    }

    /// Builds the connection and applies the builder's knobs. Callers must still invoke
    /// [`Connection::made`] with the starting `Version` before the first
    /// `data_received`.
    pub fn build<C: Callbacks>(&mut self, callbacks: C) -> Connection<C> {
        let mut conn = Connection::new(self.role, callbacks, std::mem::replace(&mut self.http1_parser, Box::new(HttparseParser)));
        conn.set_manual_flow_control(self.manual_flow_control);
        conn.forbid_h2_upgrade(self.forbid_h2_upgrade);
        conn.forbid_prior_knowledge_h2(self.forbid_prior_knowledge_h2);
        // `set_config` would try to write a SETTINGS diff before `made()` establishes a
        // mode; the initial settings are instead applied directly (§4.6's handshake
        // already sends the full record, not a diff, on the first SETTINGS frame).
        conn.apply_initial_settings(self.settings);
        conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::frame::StreamId;

    struct NoopCallbacks;
    impl Callbacks for NoopCallbacks {
        fn on_write(&mut self, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn builder_applies_custom_settings() {
        let mut settings = Settings::STANDARD;
        settings.max_concurrent_streams = 7;
        let mut builder = Builder::new(Role::Server);
        builder.settings(settings).manual_flow_control(true);
        let conn = builder.build(NoopCallbacks);
        assert_eq!(conn.local_settings().max_concurrent_streams, 7);
        let _ = StreamId::new(1);
    }
}
