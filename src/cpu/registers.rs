//! SIC-1 control registers.
//!
//! Besides the program counter the engine carries a few pipeline registers
//! across the READ_INST -> READ_DATA boundary, because operand data only
//! arrives one step after its address is issued:
//! - regC: the branch target of the instruction in flight
//! - operand A: needed again for write-back and lane selection
//! - lane B: low two bits of operand B, to pick its byte out of view B

use serde::{Serialize, Deserialize};

/// Execution state of the engine.
///
/// Serialized as its numeric state code. Any unknown code decodes to
/// [`ExecState::Halt`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum ExecState {
    /// Idle; the loader may write memory and set PC.
    #[default]
    Halt = 0,
    /// Instruction bytes are on the read views.
    ReadInst = 1,
    /// Operand bytes are on the read views.
    ReadData = 2,
}

impl ExecState {
    /// The state code exposed on the debug port.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode a state code, falling back to HALT.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => ExecState::ReadInst,
            2 => ExecState::ReadData,
            _ => ExecState::Halt,
        }
    }
}

impl From<u8> for ExecState {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl From<ExecState> for u8 {
    fn from(state: ExecState) -> Self {
        state.code()
    }
}

/// The SIC-1 register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// Current state.
    pub state: ExecState,

    /// Program counter: address of the instruction being executed.
    pub pc: u8,

    /// Branch target latched during READ_INST.
    pub reg_c: u8,

    /// Operand address A latched during READ_INST.
    pub operand_a: u8,

    /// Low two bits of operand address B latched during READ_INST.
    pub lane_b: u8,

    /// Level of the run line on the previous step, for edge detection.
    pub run_prev: bool,
}

impl Registers {
    /// Create a register file in the reset state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to HALT with PC = 0.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Address of the instruction following the current one.
    pub fn fall_through(&self) -> u8 {
        self.pc.wrapping_add(3)
    }

    /// Check if the engine is halted.
    pub fn is_halted(&self) -> bool {
        self.state == ExecState::Halt
    }
}
