//! Shared foundational types used across the strobe workspace.
//!
//! This crate provides dense ID-indexed storage ([`Arena`]) and packed
//! two-state bit vectors ([`BitVec`]) used for signal values.

#![warn(missing_docs)]

pub mod arena;
pub mod bits;

pub use arena::{Arena, ArenaId};
pub use bits::{BitVec, ParseBitVecError};
