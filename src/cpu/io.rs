//! Output latch and strobe.

use super::memory::{ByteWrite, ADDR_OUT};
use serde::{Serialize, Deserialize};

/// Holds the last byte written to the OUTPUT address and a one-step strobe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoUnit {
    output: u8,
    strobe: bool,
}

impl IoUnit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear the latch and the strobe.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Last byte written to the OUTPUT address.
    pub fn output(&self) -> u8 {
        self.output
    }

    /// True for exactly the step following an OUTPUT write.
    pub fn strobe(&self) -> bool {
        self.strobe
    }

    /// Observe this step's write, at the clock edge.
    ///
    /// A write to the OUTPUT address is latched and consumed; anything else
    /// is handed back to be stored. Must be called once per step so the
    /// strobe drops again.
    pub fn observe(&mut self, write: Option<ByteWrite>) -> Option<ByteWrite> {
        match write {
            Some(w) if w.addr == ADDR_OUT => {
                self.output = w.value;
                self.strobe = true;
                None
            }
            other => {
                self.strobe = false;
                other
            }
        }
    }
}
