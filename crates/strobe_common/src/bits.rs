//! Packed two-state bit vectors for signal values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of bits packed per storage word.
const BITS_PER_WORD: u32 = 64;

/// A fixed-width vector of two-state bits, packed 64 per `u64` word.
///
/// Index 0 is the least-significant bit. Storage bits above `width` are
/// always zero, so structural equality is value equality.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitVec {
    width: u32,
    data: Vec<u64>,
}

impl BitVec {
    /// Creates a zero-filled vector of the given width.
    pub fn new(width: u32) -> Self {
        Self {
            width,
            data: vec![0; word_count(width)],
        }
    }

    /// Returns the number of bits in this vector.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Gets the bit at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn get(&self, index: u32) -> bool {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        let word = (index / BITS_PER_WORD) as usize;
        (self.data[word] >> (index % BITS_PER_WORD)) & 1 == 1
    }

    /// Sets the bit at the given index.
    ///
    /// # Panics
    ///
    /// Panics if `index >= self.width()`.
    pub fn set(&mut self, index: u32, value: bool) {
        assert!(
            index < self.width,
            "index {index} out of bounds for width {}",
            self.width
        );
        let word = (index / BITS_PER_WORD) as usize;
        let mask = 1u64 << (index % BITS_PER_WORD);
        if value {
            self.data[word] |= mask;
        } else {
            self.data[word] &= !mask;
        }
    }

    /// Creates a vector of `width` bits holding the low bits of `value`.
    ///
    /// Bits of `value` beyond `width` are dropped.
    pub fn from_u64(value: u64, width: u32) -> Self {
        let mut v = Self::new(width);
        if let Some(first) = v.data.first_mut() {
            *first = value & low_mask(width.min(BITS_PER_WORD));
        }
        v
    }

    /// Returns the value as a `u64`, or `None` if wider than 64 bits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.width > BITS_PER_WORD {
            return None;
        }
        Some(self.data.first().copied().unwrap_or(0))
    }

    /// Returns the least-significant bit, or `false` for a zero-width vector.
    pub fn lsb(&self) -> bool {
        self.width > 0 && self.get(0)
    }
}

/// Error returned when a string is not a valid binary literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBitVecError {
    /// The input string that failed to parse.
    pub input: String,
}

impl fmt::Display for ParseBitVecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid bit vector literal: '{}'", self.input)
    }
}

impl std::error::Error for ParseBitVecError {}

/// Parses a binary literal such as `"1010"` or `"1111_0000"`.
///
/// The leftmost digit is the most significant bit. Underscores are
/// separators and do not count toward the width.
impl FromStr for BitVec {
    type Err = ParseBitVecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseBitVecError {
            input: s.to_string(),
        };
        let digits: Vec<char> = s.trim().chars().filter(|&c| c != '_').collect();
        if digits.is_empty() {
            return Err(err());
        }
        let mut v = Self::new(digits.len() as u32);
        for (i, c) in digits.iter().rev().enumerate() {
            match c {
                '0' => {}
                '1' => v.set(i as u32, true),
                _ => return Err(err()),
            }
        }
        Ok(v)
    }
}

impl fmt::Display for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (0..self.width).rev() {
            write!(f, "{}", if self.get(i) { '1' } else { '0' })?;
        }
        Ok(())
    }
}

impl fmt::Debug for BitVec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVec({self})")
    }
}

fn word_count(width: u32) -> usize {
    width.div_ceil(BITS_PER_WORD) as usize
}

fn low_mask(bits: u32) -> u64 {
    if bits >= BITS_PER_WORD {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}
