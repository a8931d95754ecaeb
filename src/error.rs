//! Typed failures for the tANS codec.
//!
//! Implementation de final-state-rs, tenter d'implementer FSE en Rust.
//! Author: Adrien Zinger, avec l'inspiration du travail de Jarek Duda,
//!         Yann Collet, Charles Bloom et bien d'autres.
//!
//! The reference this crate is distilled from reports success for every
//! operation and leaves misuse (a zero-frequency symbol appearing in the
//! input, a table log out of range, a truncated stream) to produce silently
//! wrong output. `EcError` exists so none of that is silent here.

use std::fmt;

/// Smallest supported table log. Below this a tANS table degenerates.
pub const MIN_TABLE_LOG: usize = 2;
/// Largest table log this crate supports, chosen so `1 << table_log` always
/// fits comfortably in 32-bit state arithmetic with headroom to spare.
pub const MAX_TABLE_LOG: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcError {
    /// `table_log` fell outside `[MIN_TABLE_LOG, MAX_TABLE_LOG]`, or fell
    /// inside that range but yields an even spreading step (`table_log ==
    /// 3` is the one in-range value this currently excludes).
    InvalidTableLog { table_log: usize },
    /// The frequency vector does not sum to `1 << table_log`, or every
    /// frequency is zero.
    InvalidDistribution { sum: usize, expected: usize },
    /// A symbol appeared in the input with a frequency of zero in the table
    /// it is being encoded against.
    SymbolOutOfAlphabet { symbol: u8 },
    /// Encoding produced more bytes than the pre-allocated stream buffer.
    /// The default streaming encoder grows its buffer instead of returning
    /// this, but lower-level entry points that take a fixed-size buffer can.
    BufferTooSmall { needed: usize, available: usize },
    /// The decoder tried to read past the beginning of the stream.
    StreamUnderflow { requested_bits: usize, remaining_bits: usize },
    /// `decode_checked` finished without landing back on state zero.
    StateMismatch { final_state: usize },
}

impl fmt::Display for EcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcError::InvalidTableLog { table_log } => write!(
                f,
                "table log {table_log} is not supported: outside [{MIN_TABLE_LOG}, \
                 {MAX_TABLE_LOG}], or it yields an even spreading step"
            ),
            EcError::InvalidDistribution { sum, expected } => write!(
                f,
                "frequencies sum to {sum}, expected {expected} (1 << table_log)"
            ),
            EcError::SymbolOutOfAlphabet { symbol } => {
                write!(f, "symbol {symbol} has zero frequency in this table")
            }
            EcError::BufferTooSmall { needed, available } => write!(
                f,
                "stream buffer too small: needed at least {needed} bytes, had {available}"
            ),
            EcError::StreamUnderflow { requested_bits, remaining_bits } => write!(
                f,
                "attempted to read {requested_bits} bits with only {remaining_bits} left in stream"
            ),
            EcError::StateMismatch { final_state } => write!(
                f,
                "decode did not terminate in state 0, ended in state {final_state}"
            ),
        }
    }
}

impl std::error::Error for EcError {}

pub type EcResult<T> = Result<T, EcError>;
