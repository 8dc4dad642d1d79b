//! WebAssembly bindings for the SIC-1 emulator.
//!
//! Wraps the host driver so a page can load programs, clock the core and
//! read back memory and output.

use wasm_bindgen::prelude::*;
use crate::asm::{assemble, parse_image};
use crate::asm::disasm::disassemble_instruction;
use crate::cpu::{ControlLines, DebugSelect};
use crate::{Host, HostConfig};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly host wrapper.
#[wasm_bindgen]
pub struct WasmSic1 {
    host: Host,
    program: Vec<u8>,
}

#[wasm_bindgen]
impl WasmSic1 {
    /// Create a new machine with zeroed memory.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            host: Host::new(HostConfig::default()),
            program: Vec::new(),
        }
    }

    /// Load a program from assembly source. Returns its size in bytes.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let bytes = assemble(source).map_err(|e| JsError::new(&e.to_string()))?;
        self.load_bytes(bytes)
    }

    /// Load a program from hex image text. Returns its size in bytes.
    #[wasm_bindgen]
    pub fn load_hex(&mut self, text: &str) -> Result<usize, JsError> {
        let image = parse_image(text).map_err(|e| JsError::new(&e.to_string()))?;
        self.load_bytes(image.bytes)
    }

    fn load_bytes(&mut self, bytes: Vec<u8>) -> Result<usize, JsError> {
        self.host.reset();
        self.host.load_image(&bytes).map_err(|e| JsError::new(&e.to_string()))?;
        let len = bytes.len();
        self.program = bytes;
        Ok(len)
    }

    /// Advance one clock step with `run` held. Returns the state code.
    #[wasm_bindgen]
    pub fn clock(&mut self) -> u8 {
        self.host.clock(ControlLines::run(self.host.input)).code()
    }

    /// Execute one instruction. Returns its disassembly.
    #[wasm_bindgen]
    pub fn step(&mut self) -> String {
        let pc = self.host.cpu.regs.pc;
        let mem = &self.host.cpu.mem;
        let bytes = [mem.peek(pc), mem.peek(pc.wrapping_add(1)), mem.peek(pc.wrapping_add(2))];
        self.host.step_instruction();
        disassemble_instruction(bytes)
    }

    /// Run until halt or `max_cycles` steps. Returns the steps taken.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> u64 {
        self.host.run(max_cycles as u64).cycles
    }

    /// Reset and reload the last program.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.host.reset();
        if !self.program.is_empty() {
            let _ = self.host.load_image(&self.program);
        }
    }

    /// Set the byte on the INPUT port.
    #[wasm_bindgen]
    pub fn set_input(&mut self, value: u8) {
        self.host.input = value;
    }

    /// Check if CPU is halted.
    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.host.cpu.is_halted()
    }

    /// Get cycle count.
    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.host.cpu.cycles
    }

    /// Get program counter.
    #[wasm_bindgen]
    pub fn pc(&self) -> u8 {
        self.host.cpu.regs.pc
    }

    /// Read the debug port; `select` is 0-7.
    #[wasm_bindgen]
    pub fn debug_read(&self, select: u8) -> u8 {
        self.host.debug_read(DebugSelect::from_bits(select))
    }

    /// Get the output collected so far as text.
    #[wasm_bindgen]
    pub fn output_text(&self) -> String {
        self.host.output_text()
    }

    /// Get the output collected so far as bytes.
    #[wasm_bindgen]
    pub fn outputs(&self) -> Vec<u8> {
        self.host.outputs().to_vec()
    }

    /// Get all 256 memory bytes.
    #[wasm_bindgen]
    pub fn memory_all(&self) -> Vec<u8> {
        self.host.cpu.mem.bytes()
    }

    /// Get registers as JSON string.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> String {
        serde_json::to_string(&self.host.cpu.regs).unwrap_or_else(|_| "{}".to_string())
    }
}

impl Default for WasmSic1 {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code and return the image bytes.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<Vec<u8>, JsError> {
    assemble(source).map_err(|e| JsError::new(&e.to_string()))
}

/// Disassemble one instruction.
#[wasm_bindgen]
pub fn wasm_disassemble(a: u8, b: u8, c: u8) -> String {
    disassemble_instruction([a, b, c])
}
