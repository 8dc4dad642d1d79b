//! Host-side loader and debug driver.
//!
//! The core only understands control lines. This module drives them the way
//! an external loader does: set PC, write bytes one step at a time, pulse
//! `run`, and watch the output strobe.

use crate::config::HostConfig;
use crate::cpu::{ControlLines, Cpu, DebugSelect, ExecState, MemoryError};
use crate::cpu::memory::MEMORY_SIZE;
use thiserror::Error;
use tracing::debug;

/// Idle steps after a `run` pulse in [`Host::step_instruction`], enough for
/// the instruction to complete and the outputs to settle.
pub const STEP_SETTLE: usize = 7;

/// Outcome of [`Host::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOutcome {
    /// Clock steps taken.
    pub cycles: u64,
    /// Whether the engine halted before the limit.
    pub halted: bool,
}

/// Drives a [`Cpu`] through its control lines.
#[derive(Debug, Clone)]
pub struct Host {
    /// The core being driven.
    pub cpu: Cpu,
    /// Byte presented on the INPUT port.
    pub input: u8,
    config: HostConfig,
    outputs: Vec<u8>,
    last_strobe: bool,
}

impl Host {
    /// Create a host around a fresh core.
    pub fn new(config: HostConfig) -> Self {
        Self {
            cpu: Cpu::new(),
            input: config.input,
            config,
            outputs: Vec::new(),
            last_strobe: false,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Reset the core (memory is kept) and forget collected output.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.outputs.clear();
        self.last_strobe = false;
    }

    /// Advance one step with the given lines.
    ///
    /// A rising edge of the output strobe appends the output byte to the log.
    pub fn clock(&mut self, lines: ControlLines) -> ExecState {
        let state = self.cpu.step(lines);
        let strobe = self.cpu.io.strobe();
        if strobe && !self.last_strobe {
            self.outputs.push(self.cpu.io.output());
        }
        self.last_strobe = strobe;
        state
    }

    /// One idle step with the current input.
    pub fn idle(&mut self) -> ExecState {
        self.clock(ControlLines::idle(self.input))
    }

    /// Load the program counter.
    pub fn set_pc(&mut self, addr: u8) {
        debug!(addr, "set pc");
        self.clock(ControlLines::load_pc(addr));
    }

    /// Write a single byte.
    pub fn write_mem(&mut self, addr: u8, value: u8) {
        self.write_bytes(addr, &[value]);
    }

    /// Write consecutive bytes starting at `addr`.
    pub fn write_bytes(&mut self, addr: u8, bytes: &[u8]) {
        debug!(addr, len = bytes.len(), "write bytes");
        self.set_pc(addr);
        for &value in bytes {
            self.clock(ControlLines::load_byte(value));
        }
    }

    /// Load an image at address 0 and point PC at it.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), HostError> {
        if image.len() > MEMORY_SIZE {
            return Err(HostError::Memory(MemoryError::ProgramTooLarge {
                size: image.len(),
                available: MEMORY_SIZE,
            }));
        }
        self.write_bytes(0, image);
        self.set_pc(0);
        Ok(())
    }

    /// Execute one instruction: a one-step `run` pulse, then idle steps.
    ///
    /// The engine halts again afterwards with PC still pointing at the
    /// instruction, so repeated calls re-execute it.
    pub fn step_instruction(&mut self) {
        self.clock(ControlLines::run(self.input));
        for _ in 0..STEP_SETTLE {
            self.idle();
        }
    }

    /// Hold `run` until the engine halts or `limit` steps pass.
    pub fn run(&mut self, limit: u64) -> RunOutcome {
        let mut cycles = 1;
        let mut halted = false;

        if self.clock(ControlLines::run(self.input)) == ExecState::Halt {
            debug!(pc = self.cpu.regs.pc, "run did not start");
            self.idle();
            return RunOutcome { cycles, halted: true };
        }

        while cycles < limit {
            let state = self.clock(ControlLines::run(self.input));
            cycles += 1;
            if state == ExecState::Halt {
                halted = true;
                break;
            }
        }

        // Release run so the next run sees a fresh edge.
        self.idle();
        debug!(cycles, halted, retired = self.cpu.retired, "run finished");
        RunOutcome { cycles, halted }
    }

    /// Run with the configured cycle limit.
    pub fn run_to_halt(&mut self) -> RunOutcome {
        self.run(self.config.cycle_limit)
    }

    /// Read the debug port. Does not clock.
    pub fn debug_read(&self, select: DebugSelect) -> u8 {
        self.cpu.debug_read(select, self.input)
    }

    /// Bytes strobed out so far.
    pub fn outputs(&self) -> &[u8] {
        &self.outputs
    }

    /// Output as text, skipping NUL bytes.
    pub fn output_text(&self) -> String {
        self.outputs
            .iter()
            .filter(|&&b| b != 0)
            .map(|&b| b as char)
            .collect()
    }

    /// Drop collected output.
    pub fn clear_outputs(&mut self) {
        self.outputs.clear();
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(HostConfig::default())
    }
}

/// Errors raised by the host driver.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}
