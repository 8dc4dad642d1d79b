//! Hex image format for SIC-1 programs.
//!
//! A simple text format for raw memory images:
//! - Bytes as two-digit hex tokens, separated by whitespace or commas
//! - `;` starts a comment running to the end of the line
//! - The first byte loads at address 0

use crate::cpu::memory::MEMORY_SIZE;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// A loaded program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// Memory contents from address 0.
    pub bytes: Vec<u8>,
}

impl ProgramImage {
    /// Wrap bytes, rejecting images larger than memory.
    pub fn new(bytes: Vec<u8>) -> Result<Self, ImageError> {
        if bytes.len() > MEMORY_SIZE {
            return Err(ImageError::TooLarge { size: bytes.len() });
        }
        Ok(Self { bytes })
    }

    /// Get the number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Render in the hex image format, sixteen bytes per line.
    pub fn to_hex(&self) -> String {
        let mut out = String::new();
        out.push_str("; SIC-1 image\n");
        out.push_str(&format!("; {} bytes\n\n", self.len()));

        for (row, chunk) in self.bytes.chunks(16).enumerate() {
            let line = chunk
                .iter()
                .map(|b| format!("{:02x}", b))
                .collect::<Vec<_>>()
                .join(" ");
            out.push_str(&format!("{:<47} ; {:03}\n", line, row * 16));
        }

        out
    }
}

/// Parse an image from text.
pub fn parse_image(text: &str) -> Result<ProgramImage, ImageError> {
    let mut bytes = Vec::new();

    for (line_num, line) in text.lines().enumerate() {
        let code = line.split(';').next().unwrap_or("");

        for token in code.split(|c: char| c.is_whitespace() || c == ',') {
            if token.is_empty() {
                continue;
            }
            let byte = (token.len() == 2)
                .then(|| u8::from_str_radix(token, 16).ok())
                .flatten()
                .ok_or_else(|| ImageError::ParseError {
                    line: line_num + 1,
                    message: format!("expected a two-digit hex byte, found '{}'", token),
                })?;
            bytes.push(byte);
        }
    }

    ProgramImage::new(bytes)
}

/// Load an image file from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    parse_image(&text)
}

/// Save an image file to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    file.write_all(image.to_hex().as_bytes())
        .map_err(|e| ImageError::IoError(e.to_string()))?;
    Ok(())
}

/// Errors that can occur during image operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("parse error on line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("image of {size} bytes does not fit in memory")]
    TooLarge { size: usize },
}
