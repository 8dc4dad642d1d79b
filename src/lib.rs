//! # SIC-1 Emulator
//!
//! A cycle-accurate emulator of the SIC-1, an 8-bit single-instruction
//! (`subleq`) computer with 256 bytes of memory.
//!
//! Memory is modelled the way the hardware builds it: two banks of 32-bit
//! words with registered reads, so every access takes a clock step and the
//! core walks through HALT, READ_INST and READ_DATA to execute each
//! instruction. A host driver loads programs through the same control
//! lines an external loader would use.

pub mod cpu;
pub mod config;
pub mod host;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{Cpu, ControlLines, DebugSelect, ExecState, ByteMemory, MemoryError, Registers, Instruction};
pub use config::{HostConfig, ConfigError};
pub use host::{Host, HostError, RunOutcome};
pub use asm::{assemble, disassemble, AssemblerError, ProgramImage, ImageError, load_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
