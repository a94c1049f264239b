//! Signed flow-control window arithmetic (§3 invariant 6, §4.7).
//!
//! Grounded on the teacher's `proto::streams::flow_control::FlowControl`, trimmed to the
//! single `window_size` field this engine needs: the teacher additionally tracks an
//! `available` sub-window for its prioritization layer, which has no counterpart here
//! since writes are driven synchronously by the caller rather than queued.

use crate::error::{Error, Result};
use crate::frame::Reason;

/// A window never exceeds this value (§3 invariant 6).
pub const MAX_WINDOW: i32 = 0x7FFF_FFFF;

/// A single signed flow-control window, shared shape for both the connection-level and
/// per-stream send/recv windows (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowControl {
    window: i32,
}

impl FlowControl {
    pub fn new(initial: i32) -> FlowControl {
        FlowControl { window: initial }
    }

    pub fn window(&self) -> i32 {
        self.window
    }

    /// Applies a WINDOW_UPDATE increment. Fails with a flow-control transport error if
    /// the window would overflow `MAX_WINDOW` (§4.5 WINDOW_UPDATE handler).
    pub fn increase(&mut self, increment: u32) -> Result<()> {
        let next = self.window as i64 + increment as i64;
        if next > MAX_WINDOW as i64 {
            return Err(Error::transport(Reason::FLOW_CONTROL_ERROR));
        }
        self.window = next as i32;
        Ok(())
    }

    /// How many bytes of `want` this window currently allows, never negative.
    pub fn clamp(&self, want: usize) -> usize {
        if self.window <= 0 {
            0
        } else {
            want.min(self.window as usize)
        }
    }

    /// Records that `consumed` bytes of window have actually been spent on outbound
    /// DATA (§4.7 `write_data`). The caller must have already clamped `consumed` to
    /// `clamp()`.
    pub fn consume(&mut self, consumed: usize) {
        self.window -= consumed as i32;
    }
}
