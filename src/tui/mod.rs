//! TUI debugger for the SIC-1 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Clock-step and instruction-step controls
//! - Memory view as a hex grid
//! - Breakpoints on PC
//! - Live input byte and debug readout selection

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
