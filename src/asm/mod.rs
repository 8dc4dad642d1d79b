//! Assembler and disassembler for SIC-1 programs.
//!
//! This module provides:
//! - A two-pass assembler (text → memory image)
//! - A disassembler (memory image → readable text)
//! - The hex image file format

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_instruction};
pub use image::{ProgramImage, ImageError, parse_image, load_image, save_image};
