//! Two-pass assembler for SIC-1 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! @loop:                      ; Define a label
//!     subleq @OUT, @IN        ; C omitted: continue with the next instruction
//!     subleq @one, @zero, @loop
//!     subleq @zero, @zero, @HALT
//!
//! @one:  .data -1             ; Negative values wrap to a byte
//! @zero: .data 0
//! @msg:  .data "Hi", 0x0a, 0  ; Strings emit one byte per character
//! @ptr:  .data @msg+1         ; Label arithmetic
//! ```
//!
//! `@IN`, `@OUT` and `@HALT` are predefined as 253, 254 and 255.

use crate::cpu::memory::{ADDR_HALT, ADDR_IN, ADDR_OUT, MEMORY_SIZE};
use crate::cpu::decode::INSTRUCTION_LEN;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a memory image starting at address 0.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A byte-sized operand, resolved in pass 2.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Operand {
    Value(i64),
    Label { name: String, offset: i64 },
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, u8>,
    /// One entry per output byte: (source_line, operand).
    pending: Vec<(usize, Operand)>,
}

impl Assembler {
    fn new() -> Self {
        let symbols = [("IN", ADDR_IN), ("OUT", ADDR_OUT), ("HALT", ADDR_HALT)]
            .into_iter()
            .map(|(name, addr)| (name.to_string(), addr))
            .collect();

        Self {
            symbols,
            pending: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: collect labels and lay out operands
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        if self.pending.len() > MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { size: self.pending.len() });
        }

        // Pass 2: resolve labels
        self.pending
            .iter()
            .map(|(line, operand)| self.resolve(operand, *line))
            .collect()
    }

    fn current_addr(&self) -> usize {
        self.pending.len()
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let mut tokens = tokenize(line, line_num)?;

        // Leading label definitions
        while let Some(first) = tokens.first() {
            let Some(label) = first.strip_prefix('@').and_then(|t| t.strip_suffix(':')) else {
                break;
            };
            self.define_label(label, line_num)?;
            tokens.remove(0);
        }

        let Some((head, args)) = tokens.split_first() else {
            return Ok(());
        };

        match head.to_lowercase().as_str() {
            "subleq" => self.process_subleq(args, line_num),
            ".data" => self.process_data(args, line_num),
            _ => Err(AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic: head.clone(),
            }),
        }
    }

    fn define_label(&mut self, name: &str, line_num: usize) -> Result<(), AssemblerError> {
        if !is_identifier(name) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid label name '@{}'", name),
            });
        }
        if self.symbols.contains_key(name) {
            return Err(AssemblerError::DuplicateLabel {
                line: line_num,
                label: name.to_string(),
            });
        }
        if self.current_addr() >= MEMORY_SIZE {
            return Err(AssemblerError::ProgramTooLarge { size: self.current_addr() });
        }
        self.symbols.insert(name.to_string(), self.current_addr() as u8);
        Ok(())
    }

    fn process_subleq(&mut self, args: &[String], line_num: usize) -> Result<(), AssemblerError> {
        if !(2..=3).contains(&args.len()) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("subleq takes 2 or 3 operands, found {}", args.len()),
            });
        }

        let next = (self.current_addr() + INSTRUCTION_LEN as usize) as i64;
        let mut operands = args
            .iter()
            .map(|arg| parse_operand(arg, line_num))
            .collect::<Result<Vec<_>, _>>()?;
        if operands.len() == 2 {
            operands.push(Operand::Value(next));
        }

        self.pending.extend(operands.into_iter().map(|op| (line_num, op)));
        Ok(())
    }

    fn process_data(&mut self, args: &[String], line_num: usize) -> Result<(), AssemblerError> {
        if args.is_empty() {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: ".data requires at least one value".into(),
            });
        }

        for arg in args {
            if let Some(body) = arg.strip_prefix('"') {
                let text = body.strip_suffix('"').unwrap_or(body);
                for c in unescape(text, line_num)? {
                    self.pending.push((line_num, Operand::Value(c as i64)));
                }
            } else {
                let operand = parse_operand(arg, line_num)?;
                self.pending.push((line_num, operand));
            }
        }
        Ok(())
    }

    fn resolve(&self, operand: &Operand, line_num: usize) -> Result<u8, AssemblerError> {
        let value = match operand {
            Operand::Value(v) => *v,
            Operand::Label { name, offset } => {
                let addr = self.symbols.get(name).ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: line_num,
                    label: name.clone(),
                })?;
                *addr as i64 + offset
            }
        };

        if !(-128..=255).contains(&value) {
            return Err(AssemblerError::ValueOutOfRange { line: line_num, value });
        }
        Ok((value & 0xff) as u8)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a line into tokens. Commas and whitespace separate; `;` starts a
/// comment; quoted strings and characters are kept whole, quotes included.
fn tokenize(line: &str, line_num: usize) -> Result<Vec<String>, AssemblerError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match c {
            ';' => break,
            ' ' | '\t' | ',' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            '"' | '\'' => {
                current.push(c);
                let mut closed = false;
                while let Some(q) = chars.next() {
                    current.push(q);
                    if q == '\\' {
                        if let Some(escaped) = chars.next() {
                            current.push(escaped);
                        }
                    } else if q == c {
                        closed = true;
                        break;
                    }
                }
                if !closed {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("unterminated literal {}", current),
                    });
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    Ok(tokens)
}

/// Expand backslash escapes in a string or character body.
fn unescape(body: &str, line_num: usize) -> Result<Vec<u8>, AssemblerError> {
    let mut out = Vec::new();
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        let c = if c == '\\' {
            match chars.next() {
                Some('n') => '\n',
                Some('t') => '\t',
                Some('0') => '\0',
                Some(e @ ('\\' | '"' | '\'')) => e,
                other => {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("invalid escape \\{}", other.map(String::from).unwrap_or_default()),
                    })
                }
            }
        } else {
            c
        };

        if !c.is_ascii() {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("non-ASCII character '{}'", c),
            });
        }
        out.push(c as u8);
    }

    Ok(out)
}

fn parse_operand(token: &str, line_num: usize) -> Result<Operand, AssemblerError> {
    // Label reference with optional offset
    if let Some(rest) = token.strip_prefix('@') {
        let split = rest.find(['+', '-']).unwrap_or(rest.len());
        let (name, offset) = rest.split_at(split);
        if !is_identifier(name) {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid label reference '{}'", token),
            });
        }
        let offset = if offset.is_empty() {
            0
        } else {
            parse_number(offset, line_num)?
        };
        return Ok(Operand::Label { name: name.to_string(), offset });
    }

    // Character literal
    if let Some(body) = token.strip_prefix('\'') {
        let body = body.strip_suffix('\'').unwrap_or(body);
        return match unescape(body, line_num)?.as_slice() {
            [c] => Ok(Operand::Value(*c as i64)),
            _ => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("character literal must hold one character: {}", token),
            }),
        };
    }

    if token.starts_with('"') {
        return Err(AssemblerError::SyntaxError {
            line: line_num,
            message: "strings are only allowed in .data".into(),
        });
    }

    parse_number(token, line_num).map(Operand::Value)
}

fn parse_number(token: &str, line_num: usize) -> Result<i64, AssemblerError> {
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };

    let invalid = || AssemblerError::SyntaxError {
        line: line_num,
        message: format!("invalid number '{}'", token),
    };

    // A sign may only lead the token; the digits must be bare.
    let (radix, body) = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => (16, hex),
        None => (10, digits),
    };
    if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
        return Err(invalid());
    }

    let magnitude = i64::from_str_radix(body, radix).map_err(|_| invalid())?;

    Ok(if negative { -magnitude } else { magnitude })
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: @{label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: @{label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },

    #[error("program of {size} bytes does not fit in memory")]
    ProgramTooLarge { size: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Negate the input and print it
            subleq @OUT, @IN, @HALT
        "#;

        assert_eq!(assemble(source).unwrap(), vec![254, 253, 255]);
    }

    #[test]
    fn test_default_branch_target_is_next_instruction() {
        let source = "subleq 1, 2\nsubleq 3, 4\n";
        assert_eq!(assemble(source).unwrap(), vec![1, 2, 3, 3, 4, 6]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        @start:
            subleq @tmp, @tmp, @end
            subleq @tmp, @tmp, @start
        @end: subleq @tmp, @tmp, @HALT
        @tmp: .data 0
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![9, 9, 6, 9, 9, 0, 9, 9, 255, 0]);
    }

    #[test]
    fn test_assemble_data() {
        let source = r#"
            .data 42 -1 0x7f, 'A' '\n'
            .data "Hi\0"
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![42, 0xff, 0x7f, b'A', b'\n', b'H', b'i', 0]);
    }

    #[test]
    fn test_label_offsets_and_comments_in_strings() {
        let source = r#"
            @a: .data @b+2, @b-1, @OUT
            @b: .data "x;y"   ; the semicolon inside quotes is data
        "#;

        assert_eq!(assemble(source).unwrap(), vec![5, 2, 254, b'x', b';', b'y']);
    }

    #[test]
    fn test_multiple_labels_one_address() {
        let source = "@a: @b: .data @a @b\n";
        assert_eq!(assemble(source).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_hello_program_matches_reference_image() {
        let source = include_str!("../../demos/hello.sic1");
        let image = include_str!("../../demos/hello.hex");
        let expected = crate::asm::image::parse_image(image).unwrap();
        assert_eq!(assemble(source).unwrap(), expected.bytes);
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        assert_eq!(
            assemble("\nsubleq @nowhere, 0\n"),
            Err(AssemblerError::UndefinedLabel { line: 2, label: "nowhere".into() })
        );
        assert_eq!(
            assemble("@x: .data 1\n@x: .data 2\n"),
            Err(AssemblerError::DuplicateLabel { line: 2, label: "x".into() })
        );
        assert_eq!(
            assemble("@IN: .data 1\n"),
            Err(AssemblerError::DuplicateLabel { line: 1, label: "IN".into() })
        );
        assert_eq!(
            assemble(".data 256\n"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: 256 })
        );
        assert_eq!(
            assemble(".data -129\n"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: -129 })
        );
        assert!(matches!(
            assemble("mov 1, 2\n"),
            Err(AssemblerError::UnknownMnemonic { line: 1, .. })
        ));
        assert!(matches!(
            assemble("subleq 1\n"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
        assert!(matches!(
            assemble(".data \"open\n"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
        assert!(matches!(
            assemble("subleq \"no\", 1\n"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
    }

    #[test]
    fn test_sign_only_before_number() {
        assert_eq!(assemble(".data -0x05 +7\n").unwrap(), vec![0xfb, 7]);
        for bad in ["0x-5", "0x+5", "-+5", "+-5", "0x", "-", "1_0"] {
            assert!(
                matches!(
                    assemble(&format!(".data {}\n", bad)),
                    Err(AssemblerError::SyntaxError { line: 1, .. })
                ),
                "accepted {}",
                bad
            );
        }
    }

    #[test]
    fn test_program_too_large() {
        let source = ".data 0\n".repeat(257);
        assert_eq!(
            assemble(&source),
            Err(AssemblerError::ProgramTooLarge { size: 257 })
        );
        assert_eq!(assemble(&".data 0\n".repeat(256)).unwrap().len(), 256);
    }

    #[test]
    fn test_mnemonics_case_insensitive() {
        assert_eq!(assemble("SUBLEQ 1 2 3\n.DATA 4\n").unwrap(), vec![1, 2, 3, 4]);
    }
}
