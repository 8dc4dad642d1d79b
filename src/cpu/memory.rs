//! Byte-addressable memory.
//!
//! The SIC-1 sees 256 bytes, but storage is word-granular: each byte lives
//! in lane `addr & 3` of word `addr >> 2` inside a [`WordStore`]. Byte writes
//! are read-modify-write, merging the new byte into the word last read on
//! view A. The word holding the INPUT port has its lane overlaid with the
//! live input byte whenever it is read.

use super::word_store::{Port, WordStore, WordWrite};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of addressable bytes.
pub const MEMORY_SIZE: usize = 256;

/// Reads of this address return the live input byte.
pub const ADDR_IN: u8 = 253;

/// Writes to this address go to the output latch.
pub const ADDR_OUT: u8 = 254;

/// Conventional branch target used to stop a program.
pub const ADDR_HALT: u8 = 255;

/// Highest address an instruction may be fetched from.
pub const MAX_PC: u8 = 252;

const INPUT_WORD: u8 = ADDR_IN >> 2;
const INPUT_LANE: u8 = ADDR_IN & 3;

/// Byte lane of an address within its word.
#[inline]
pub fn lane_of(addr: u8) -> u8 {
    addr & 3
}

/// Extract one byte lane from a word.
#[inline]
pub fn select_lane(word: u32, lane: u8) -> u8 {
    (word >> (8 * u32::from(lane & 3))) as u8
}

/// Replace one byte lane of a word.
#[inline]
pub fn merge_lane(word: u32, lane: u8, value: u8) -> u32 {
    let shift = 8 * u32::from(lane & 3);
    (word & !(0xff << shift)) | (u32::from(value) << shift)
}

/// Extract the three bytes starting at lane `base_low` of `word_a`,
/// continuing into `word_b` when they straddle the word boundary.
///
/// `word_a` must hold the word at the base address and `word_b` the word
/// four bytes later.
pub fn fetch_window(base_low: u8, word_a: u32, word_b: u32) -> [u8; 3] {
    let window = (u64::from(word_b) << 32) | u64::from(word_a);
    let shifted = window >> (8 * u32::from(base_low & 3));
    [shifted as u8, (shifted >> 8) as u8, (shifted >> 16) as u8]
}

/// The data presented by one read view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewRead {
    /// Address whose word is on the view (presented one step earlier).
    pub addr: u8,
    /// The word, with the input overlay applied.
    pub word: u32,
}

impl ViewRead {
    /// The byte at `addr` itself.
    pub fn byte(&self) -> u8 {
        select_lane(self.word, lane_of(self.addr))
    }
}

/// A byte write request.
///
/// `prior` is the raw word last read on view A, which must hold the word
/// containing `addr`. The other three lanes are taken from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteWrite {
    pub addr: u8,
    pub value: u8,
    pub prior: u32,
}

impl ByteWrite {
    /// The full word this write stores.
    pub fn merged(&self) -> u32 {
        merge_lane(self.prior, lane_of(self.addr), self.value)
    }
}

/// Everything the engine asks of memory in one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemRequest {
    pub read_a: u8,
    pub read_b: u8,
    pub write: Option<ByteWrite>,
}

/// 256 bytes on top of a dual-bank [`WordStore`].
#[derive(Clone, Serialize, Deserialize)]
pub struct ByteMemory {
    words: WordStore,
    /// Byte address that produced the data now on view A.
    latched_a: u8,
    /// Byte address that produced the data now on view B.
    latched_b: u8,
}

impl ByteMemory {
    /// Create a memory with all bytes zeroed.
    pub fn new() -> Self {
        Self {
            words: WordStore::new(),
            latched_a: 0,
            latched_b: 0,
        }
    }

    fn overlay(addr: u8, word: u32, input: u8) -> u32 {
        if addr >> 2 == INPUT_WORD {
            merge_lane(word, INPUT_LANE, input)
        } else {
            word
        }
    }

    /// View A with the live input applied.
    pub fn view_a(&self, input: u8) -> ViewRead {
        ViewRead {
            addr: self.latched_a,
            word: Self::overlay(self.latched_a, self.words.data(Port::A), input),
        }
    }

    /// View B with the live input applied.
    pub fn view_b(&self, input: u8) -> ViewRead {
        ViewRead {
            addr: self.latched_b,
            word: Self::overlay(self.latched_b, self.words.data(Port::B), input),
        }
    }

    /// The word on view A before the input overlay.
    ///
    /// This is the value a following byte write must merge into.
    pub fn raw_a(&self) -> u32 {
        self.words.data(Port::A)
    }

    /// Advance one clock: commit the write and sample both read addresses.
    pub fn clock(&mut self, req: MemRequest) {
        let write = req.write.map(|w| WordWrite {
            index: w.addr >> 2,
            word: w.merged(),
        });
        self.words.clock(req.read_a >> 2, req.read_b >> 2, write);
        self.latched_a = req.read_a;
        self.latched_b = req.read_b;
    }

    /// Read a stored byte directly. No overlay, no latency.
    pub fn peek(&self, addr: u8) -> u8 {
        select_lane(self.words.peek(addr >> 2), lane_of(addr))
    }

    /// Store a byte directly, bypassing the write port.
    ///
    /// A view holding the touched word is re-read so it shows the new byte.
    pub fn poke(&mut self, addr: u8, value: u8) {
        let index = addr >> 2;
        let word = merge_lane(self.words.peek(index), lane_of(addr), value);
        self.words.poke(index, word);
        if index == self.latched_a >> 2 || index == self.latched_b >> 2 {
            self.words.clock(self.latched_a >> 2, self.latched_b >> 2, None);
        }
    }

    /// Copy a program image into storage starting at `start`.
    pub fn load_program(&mut self, start: u8, program: &[u8]) -> Result<(), MemoryError> {
        let available = MEMORY_SIZE - start as usize;
        if program.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available,
            });
        }

        for (offset, &byte) in program.iter().enumerate() {
            self.poke(start.wrapping_add(offset as u8), byte);
        }

        Ok(())
    }

    /// Snapshot of every stored byte.
    pub fn bytes(&self) -> Vec<u8> {
        (0..MEMORY_SIZE).map(|a| self.peek(a as u8)).collect()
    }

    /// Dump a range of stored bytes (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(u8, u8)> {
        let end = (start + count).min(MEMORY_SIZE);
        (start..end).map(|a| (a as u8, self.peek(a as u8))).collect()
    }
}

impl Default for ByteMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ByteMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteMemory")
            .field("latched_a", &self.latched_a)
            .field("latched_b", &self.latched_b)
            .field("words", &self.words)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Program is too large to fit in memory.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
