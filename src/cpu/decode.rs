//! Instruction decode and the subtract/branch ALU.
//!
//! The SIC-1 has a single instruction, `subleq A, B, C`, stored as three
//! consecutive bytes:
//!
//! ```text
//! mem[A] := mem[A] - mem[B]
//! if result <= 0 { PC := C } else { PC := PC + 3 }
//! ```
//!
//! "<= 0" is judged on the wrapped 8-bit result: sign bit set or zero.

use std::fmt;
use serde::{Serialize, Deserialize};
use super::memory::{ADDR_HALT, ADDR_IN, ADDR_OUT};

/// Bytes per instruction.
pub const INSTRUCTION_LEN: u8 = 3;

/// A decoded `subleq` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Instruction {
    /// Operand address A (minuend and destination).
    pub a: u8,
    /// Operand address B (subtrahend).
    pub b: u8,
    /// Branch target C.
    pub c: u8,
}

impl Instruction {
    pub fn new(a: u8, b: u8, c: u8) -> Self {
        Self { a, b, c }
    }

    /// Decode from the three instruction bytes.
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self {
            a: bytes[0],
            b: bytes[1],
            c: bytes[2],
        }
    }

    /// Encode back to memory order.
    pub fn to_bytes(self) -> [u8; 3] {
        [self.a, self.b, self.c]
    }
}

/// Render an address, using the port names where they apply.
pub fn address_name(addr: u8) -> String {
    match addr {
        ADDR_IN => "@IN".to_string(),
        ADDR_OUT => "@OUT".to_string(),
        ADDR_HALT => "@HALT".to_string(),
        _ => addr.to_string(),
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "subleq {}, {}, {}",
            address_name(self.a),
            address_name(self.b),
            address_name(self.c)
        )
    }
}

/// Result of the subtract stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AluOutput {
    /// `a - b` modulo 256.
    pub result: u8,
    /// Branch condition.
    pub leq: bool,
}

/// Subtract and evaluate the branch condition.
///
/// The condition only looks at the wrapped result, so operands more than
/// 128 apart can disagree with a true comparison (e.g. `200 - 10` is 190,
/// which has the sign bit set and counts as "less or equal").
pub fn subtract(a: u8, b: u8) -> AluOutput {
    let result = a.wrapping_sub(b);
    AluOutput {
        result,
        leq: result & 0x80 != 0 || result == 0,
    }
}

/// The branch condition for operands `a` and `b`.
pub fn leq(a: u8, b: u8) -> bool {
    subtract(a, b).leq
}
