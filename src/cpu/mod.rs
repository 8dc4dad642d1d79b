//! CPU emulation for the SIC-1.
//!
//! This module implements the SIC-1 core:
//! - 256 bytes of memory stored as two banks of 32-bit words
//! - two read views with one step of latency, one read-modify-write port
//! - a HALT / READ_INST / READ_DATA engine executing `subleq`
//! - memory-mapped input (253) and output (254)

pub mod word_store;
pub mod memory;
pub mod io;
pub mod registers;
pub mod decode;
pub mod execute;

pub use word_store::WordStore;
pub use memory::{ByteMemory, MemoryError, ADDR_HALT, ADDR_IN, ADDR_OUT, MAX_PC};
pub use io::IoUnit;
pub use registers::{ExecState, Registers};
pub use decode::{Instruction, AluOutput};
pub use execute::{Cpu, ControlLines, Datapath, DebugSelect};
