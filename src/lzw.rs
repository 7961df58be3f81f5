// lzw.rs
//
// Copyright (c) 2020-2026  Douglas Lau
//
//! Lempel-Ziv-Welch compression for GIF image data.
//!
//! Output is framed as data sub-blocks, ready to follow the LZW minimum
//! code size byte of an image data block.
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Maximum code width allowed for GIF
const MAX_CODE_BITS: u8 = 12;

/// Number of codes at maximum width
const MAX_CODES: u16 = 1 << MAX_CODE_BITS;

/// Maximum length of a data sub-block
pub const SUB_BLOCK_MAX: usize = 0xFF;

/// Code type
type Code = u16;

/// Code packer, framing output bytes into sub-blocks
struct SubBlocks<'a> {
    /// Output buffer
    out: &'a mut Vec<u8>,
    /// Position of the length byte of the open sub-block
    len_pos: Option<usize>,
    /// Pending bits, least-significant first
    bits: u32,
    /// Number of pending bits
    n_bits: u8,
}

impl<'a> SubBlocks<'a> {
    /// Start packing into a buffer
    fn new(out: &'a mut Vec<u8>) -> Self {
        SubBlocks {
            out,
            len_pos: None,
            bits: 0,
            n_bits: 0,
        }
    }

    /// Append one byte, opening a new sub-block when needed
    fn push_byte(&mut self, byte: u8) {
        let pos = match self.len_pos {
            Some(pos) => pos,
            None => {
                self.out.push(0);
                self.out.len() - 1
            }
        };
        self.out.push(byte);
        self.out[pos] += 1;
        self.len_pos = if usize::from(self.out[pos]) < SUB_BLOCK_MAX {
            Some(pos)
        } else {
            None
        };
    }

    /// Pack a code of `width` bits
    fn push_code(&mut self, code: Code, width: u8) {
        self.bits |= u32::from(code) << self.n_bits;
        self.n_bits += width;
        while self.n_bits >= 8 {
            self.push_byte(self.bits as u8);
            self.bits >>= 8;
            self.n_bits -= 8;
        }
    }

    /// Flush remaining bits and write the zero-length terminator
    fn finish(mut self) {
        if self.n_bits > 0 {
            self.push_byte(self.bits as u8);
        }
        self.out.push(0);
    }
}

/// LZW compressor for color indices.
///
/// The string table maps a prefix code and the next index to the code of
/// the extended string.  It is cleared for each image, and again whenever
/// all 4096 codes are used.
pub struct Compressor {
    /// Minimum code size
    min_code_size: u8,
    /// String table
    strings: HashMap<(Code, u8), Code>,
    /// Next code to assign
    next_code: Code,
    /// Current code width
    code_bits: u8,
}

impl Compressor {
    /// Create a new compressor.
    ///
    /// `min_code_size` is clamped to 2..=8.
    pub fn new(min_code_size: u8) -> Self {
        let min_code_size = min_code_size.clamp(2, 8);
        let mut compressor = Compressor {
            min_code_size,
            strings: HashMap::with_capacity(usize::from(MAX_CODES)),
            next_code: 0,
            code_bits: 0,
        };
        compressor.reset();
        compressor
    }

    /// Get the minimum code size
    pub fn min_code_size(&self) -> u8 {
        self.min_code_size
    }

    /// Get the clear code
    fn clear_code(&self) -> Code {
        1 << self.min_code_size
    }

    /// Get the end of information code
    fn end_code(&self) -> Code {
        self.clear_code() + 1
    }

    /// Clear the string table
    fn reset(&mut self) {
        self.strings.clear();
        self.next_code = self.end_code() + 1;
        self.code_bits = self.min_code_size + 1;
    }

    /// Add a string to the table, clearing it when full
    fn add_string(&mut self, prefix: Code, idx: u8, out: &mut SubBlocks) {
        if self.next_code == MAX_CODES {
            out.push_code(self.clear_code(), self.code_bits);
            self.reset();
            return;
        }
        self.strings.insert((prefix, idx), self.next_code);
        self.next_code += 1;
        let width_full = self.next_code > 1 << self.code_bits;
        if width_full && self.code_bits < MAX_CODE_BITS {
            self.code_bits += 1;
        }
    }

    /// Compress color indices, appending sub-blocks to a buffer.
    ///
    /// The code stream starts with a clear code and ends with an end code.
    /// Every index must be less than the clear code (`2^min_code_size`);
    /// otherwise nothing is appended.
    pub fn compress(
        &mut self,
        indices: &[u8],
        buffer: &mut Vec<u8>,
    ) -> Result<()> {
        let clear = self.clear_code();
        if let Some(idx) = indices.iter().find(|i| Code::from(**i) >= clear) {
            return Err(Error::InvalidIndex(*idx));
        }
        self.reset();
        let mut out = SubBlocks::new(buffer);
        out.push_code(clear, self.code_bits);
        let mut indices = indices.iter().copied();
        if let Some(first) = indices.next() {
            let mut prefix = Code::from(first);
            for idx in indices {
                match self.strings.get(&(prefix, idx)) {
                    Some(code) => prefix = *code,
                    None => {
                        out.push_code(prefix, self.code_bits);
                        self.add_string(prefix, idx, &mut out);
                        prefix = Code::from(idx);
                    }
                }
            }
            out.push_code(prefix, self.code_bits);
        }
        out.push_code(self.end_code(), self.code_bits);
        out.finish();
        Ok(())
    }
}

/// Compress color indices into a new buffer of sub-blocks
pub fn compress(indices: &[u8], min_code_size: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::with_capacity(indices.len() / 2 + 4);
    Compressor::new(min_code_size).compress(indices, &mut buffer)?;
    Ok(buffer)
}
