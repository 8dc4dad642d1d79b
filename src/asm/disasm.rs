//! Disassembler for SIC-1 programs.
//!
//! Renders a memory image as `subleq` lines, three bytes at a time. A short
//! tail that cannot form a whole instruction is shown as `.data`.

use crate::cpu::decode::{Instruction, INSTRUCTION_LEN};

/// Disassemble a single instruction to text.
pub fn disassemble_instruction(bytes: [u8; 3]) -> String {
    Instruction::from_bytes(bytes).to_string()
}

/// Disassemble an image whose first byte sits at address `start`.
pub fn disassemble(bytes: &[u8], start: u8) -> String {
    let mut output = String::new();
    output.push_str("; SIC-1 Disassembly\n");
    output.push_str("; -----------------\n\n");

    let mut addr = start as usize;
    for chunk in bytes.chunks(INSTRUCTION_LEN as usize) {
        let raw = chunk
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect::<Vec<_>>()
            .join(" ");

        let line = match *chunk {
            [a, b, c] => disassemble_instruction([a, b, c]),
            _ => format!(
                ".data {}",
                chunk.iter().map(|b| b.to_string()).collect::<Vec<_>>().join(", ")
            ),
        };

        output.push_str(&format!("{:03}: {:<32} ; {}\n", addr, line, raw));
        addr += chunk.len();
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    #[test]
    fn test_disassemble_ports() {
        assert_eq!(
            disassemble_instruction([254, 253, 255]),
            "subleq @OUT, @IN, @HALT"
        );
        assert_eq!(disassemble_instruction([1, 2, 3]), "subleq 1, 2, 3");
    }

    #[test]
    fn test_disassemble_listing() {
        let listing = disassemble(&[0, 0, 6, 254, 9, 0, 7], 0);
        let lines: Vec<&str> = listing.lines().skip(3).collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("000: subleq 0, 0, 6"));
        assert!(lines[0].ends_with("; 00 00 06"));
        assert!(lines[1].starts_with("003: subleq @OUT, 9, 0"));
        assert!(lines[2].starts_with("006: .data 7"));
    }

    #[test]
    fn test_start_address_offsets_listing() {
        let listing = disassemble(&[1, 2, 3, 4, 5, 6], 10);
        assert!(listing.contains("010: subleq 1, 2, 3"));
        assert!(listing.contains("013: subleq 4, 5, 6"));
    }

    #[test]
    fn test_disassembly_reassembles() {
        let image = [33, 34, 3, 254, 33, 255, 0, 1];
        let listing = disassemble(&image, 0);

        // Strip address prefixes and reassemble
        let source: String = listing
            .lines()
            .filter_map(|line| line.split_once(": ").map(|(_, rest)| rest))
            .map(|rest| format!("{}\n", rest))
            .collect();
        assert_eq!(assemble(&source).unwrap(), image);
    }
}
