//! Ce fichier contient l'implementation de l'algorithme de diffusion utilise
//! pour la creation de la table de translation dans la version de
//! l'algorithme tANS, poussee par Yann Collet et Jarek Duda.
//!
//! Implementation de final-state-rs, tenter d'implementer FSE en Rust.
//! Author: Adrien Zinger, avec l'inspiration du travail de Jarek Duda,
//!         Yann Collet, Charles Bloom et bien d'autres.

use crate::error::{EcError, EcResult};

/// The fixed step the spreading recurrence advances by: `(table_size >> 1) +
/// (table_size >> 3) + 3`.
fn step_for(table_size: usize) -> usize {
    (table_size >> 1) + (table_size >> 3) + 3
}

/// Whether `table_log` gives a `step` coprime with `table_size` (i.e. odd,
/// since `table_size` is a power of two) — the precondition `pos -> (pos +
/// step) mod table_size` must meet to be a permutation of `[0, table_size)`.
///
/// Most `table_log` values satisfy this, but `table_log == 1` (`step == 4`)
/// and `table_log == 3` (`step == 8`) do not: there `step` is even, the
/// recurrence collapses to a fixed point at slot 0, and every occurrence
/// lands in the same slot instead of spreading across the table.
pub fn table_log_has_odd_step(table_log: usize) -> bool {
    step_for(1usize << table_log) % 2 == 1
}

/// Assigns every one of the `1 << table_log` table slots to a symbol,
/// according to `frequencies`, using the deterministic recurrence shared by
/// the encoder-table and decoder-table builders.
///
/// `step` is fixed at `(table_size >> 1) + (table_size >> 3) + 3`. Since
/// `table_size` is a power of two, `pos -> (pos + step) mod table_size` is a
/// permutation of `[0, table_size)` — and so writes every slot exactly once
/// — only when `step` is odd; see `table_log_has_odd_step`.
pub fn spread(frequencies: &[usize], table_log: usize) -> EcResult<Vec<u8>> {
    let table_size = 1usize << table_log;
    let sum: usize = frequencies.iter().sum();
    if sum != table_size {
        return Err(EcError::InvalidDistribution { sum, expected: table_size });
    }
    if frequencies.len() > 256 {
        return Err(EcError::InvalidDistribution { sum: frequencies.len(), expected: 256 });
    }
    if !table_log_has_odd_step(table_log) {
        return Err(EcError::InvalidTableLog { table_log });
    }

    let step = step_for(table_size);
    let mask = table_size - 1;

    let mut slots = vec![0u8; table_size];
    let mut pos = 0usize;
    for (symbol, &count) in frequencies.iter().enumerate() {
        for _ in 0..count {
            slots[pos] = symbol as u8;
            pos = (pos + step) & mask;
        }
    }
    Ok(slots)
}
