//! Dual-bank word storage.
//!
//! 64 thirty-two bit words split into two banks of 32, selected by bit 5 of
//! the word index. There is one synchronous write port and two independent
//! read ports. Each read port has one step of latency: the data presented
//! after a clock reflects the index presented before it.

use serde::{Serialize, Deserialize};

/// Words per bank.
pub const BANK_WORDS: usize = 32;

/// Number of banks.
pub const BANK_COUNT: usize = 2;

/// Total number of words.
pub const WORD_COUNT: usize = BANK_WORDS * BANK_COUNT;

/// One of the two read ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Port {
    A,
    B,
}

/// A word-level write request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordWrite {
    /// Word index (0-63).
    pub index: u8,
    /// Full 32-bit value to store.
    pub word: u32,
}

/// Registered state of a single read port.
///
/// Every bank drives its own output register, and the bank select is itself
/// registered. The mux therefore always picks the bank that belongs to the
/// index which produced the data now on the output, not the index that was
/// just presented.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct ReadPort {
    bank_data: [u32; BANK_COUNT],
    bank_sel: usize,
}

impl ReadPort {
    fn output(&self) -> u32 {
        self.bank_data[self.bank_sel]
    }
}

/// Split a word index into (bank, bank-local index).
#[inline]
fn split(index: u8) -> (usize, usize) {
    let index = index as usize & (WORD_COUNT - 1);
    (index / BANK_WORDS, index % BANK_WORDS)
}

/// Two banks of words behind two latency-one read ports.
#[derive(Clone, Serialize, Deserialize)]
pub struct WordStore {
    banks: [[u32; BANK_WORDS]; BANK_COUNT],
    ports: [ReadPort; 2],
}

impl WordStore {
    /// Create a store with every word zeroed.
    pub fn new() -> Self {
        Self {
            banks: [[0; BANK_WORDS]; BANK_COUNT],
            ports: [ReadPort::default(); 2],
        }
    }

    /// The word currently presented on a read port.
    #[inline]
    pub fn data(&self, port: Port) -> u32 {
        match port {
            Port::A => self.ports[0].output(),
            Port::B => self.ports[1].output(),
        }
    }

    /// Advance one clock.
    ///
    /// Both ports sample their index and the write (if any) is committed.
    /// A port reading the index being written sees the new word.
    pub fn clock(&mut self, read_a: u8, read_b: u8, write: Option<WordWrite>) {
        let write = write.map(|w| (split(w.index), w.word));

        for (port, index) in self.ports.iter_mut().zip([read_a, read_b]) {
            let (sel, local) = split(index);
            for (bank, cells) in self.banks.iter().enumerate() {
                port.bank_data[bank] = match write {
                    Some(((wb, wl), word)) if wb == bank && wl == local => word,
                    _ => cells[local],
                };
            }
            port.bank_sel = sel;
        }

        if let Some(((bank, local), word)) = write {
            self.banks[bank][local] = word;
        }
    }

    /// Read a stored word directly, bypassing the ports.
    pub fn peek(&self, index: u8) -> u32 {
        let (bank, local) = split(index);
        self.banks[bank][local]
    }

    /// Store a word directly, bypassing the ports.
    ///
    /// Data already latched on a port is left as is.
    pub fn poke(&mut self, index: u8, word: u32) {
        let (bank, local) = split(index);
        self.banks[bank][local] = word;
    }
}

impl Default for WordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.banks.iter().flatten().filter(|w| **w != 0).count();
        f.debug_struct("WordStore")
            .field("non_zero_words", &non_zero)
            .field("port_a", &format_args!("{:#010x}", self.data(Port::A)))
            .field("port_b", &format_args!("{:#010x}", self.data(Port::B)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_has_one_step_latency() {
        let mut ws = WordStore::new();
        ws.poke(3, 0xdead_beef);

        assert_eq!(ws.data(Port::A), 0);
        ws.clock(3, 0, None);
        assert_eq!(ws.data(Port::A), 0xdead_beef);
    }

    #[test]
    fn test_ports_are_independent() {
        let mut ws = WordStore::new();
        ws.poke(1, 0x1111_1111);
        ws.poke(40, 0x4040_4040);

        ws.clock(1, 40, None);
        assert_eq!(ws.data(Port::A), 0x1111_1111);
        assert_eq!(ws.data(Port::B), 0x4040_4040);

        ws.clock(40, 1, None);
        assert_eq!(ws.data(Port::A), 0x4040_4040);
        assert_eq!(ws.data(Port::B), 0x1111_1111);
    }

    #[test]
    fn test_write_forwards_to_both_ports() {
        let mut ws = WordStore::new();
        ws.poke(7, 0xaaaa_aaaa);

        ws.clock(7, 7, Some(WordWrite { index: 7, word: 0x5555_5555 }));
        assert_eq!(ws.data(Port::A), 0x5555_5555);
        assert_eq!(ws.data(Port::B), 0x5555_5555);
        assert_eq!(ws.peek(7), 0x5555_5555);
    }

    #[test]
    fn test_write_to_other_bank_same_local_index_not_forwarded() {
        let mut ws = WordStore::new();
        ws.poke(2, 0x0000_0002);

        // Index 34 shares bank-local index 2 but lives in bank 1.
        ws.clock(2, 34, Some(WordWrite { index: 34, word: 0x3434_3434 }));
        assert_eq!(ws.data(Port::A), 0x0000_0002);
        assert_eq!(ws.data(Port::B), 0x3434_3434);
        assert_eq!(ws.peek(2), 0x0000_0002);
    }

    #[test]
    fn test_bank_select_tracks_registered_index() {
        let mut ws = WordStore::new();
        ws.poke(5, 0x0505_0505);
        ws.poke(37, 0x2525_2525);

        ws.clock(5, 0, None);
        assert_eq!(ws.data(Port::A), 0x0505_0505);

        // Same local index, other bank: output switches with the data.
        ws.clock(37, 0, None);
        assert_eq!(ws.data(Port::A), 0x2525_2525);

        ws.clock(5, 0, None);
        assert_eq!(ws.data(Port::A), 0x0505_0505);
    }

    #[test]
    fn test_poke_does_not_disturb_latched_data() {
        let mut ws = WordStore::new();
        ws.poke(9, 1);
        ws.clock(9, 9, None);
        ws.poke(9, 2);
        assert_eq!(ws.data(Port::A), 1);
        ws.clock(9, 9, None);
        assert_eq!(ws.data(Port::A), 2);
    }
}
