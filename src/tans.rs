//! Encoder/decoder table construction and the streaming tANS codec itself.
//!
//! Implementation de final-state-rs, tenter d'implementer FSE en Rust.
//! Author: Adrien Zinger, avec l'inspiration du travail de Jarek Duda,
//!         Yann Collet, Charles Bloom et bien d'autres.
//!
//! # Algorithme (encodeur)
//! start[s] = position - Ls
//! next[s] = Ls
//!
//! for state in L..2L {
//!     symbol = spread[state - L]
//!     statesTable[start[symbol] + next[symbol]++] = state
//! }
//!
//! `bitsOut`/`threshold` are the formula to know the number of bits to add to
//! the stream while encoding: `log_ceil(frequency)` or `log_floor(frequency)`
//! depending on the current state.
//!
//! # Algorithme (decodeur)
//! next[s] = frequency[s] <-- nombre de prochaines apparitions d'un symbole
//! for state in 0..L {
//!     symbol = spread[state]
//!     x = next[symbol]++
//!     numberOfBits = L - logfloor(x)
//!     newState = (x << numberOfBits) - L
//!     decoderTable[state] = (symbol, numberOfBits, newState)
//! }

use crate::bitstream::{BitReader, BitWriter};
use crate::error::{EcError, EcResult, MAX_TABLE_LOG, MIN_TABLE_LOG};
use crate::spread::{spread, table_log_has_odd_step};

fn validate_table_log(table_log: usize) -> EcResult<()> {
    if !(MIN_TABLE_LOG..=MAX_TABLE_LOG).contains(&table_log) {
        return Err(EcError::InvalidTableLog { table_log });
    }
    if !table_log_has_odd_step(table_log) {
        return Err(EcError::InvalidTableLog { table_log });
    }
    Ok(())
}

fn validate_distribution(frequencies: &[usize], table_log: usize) -> EcResult<usize> {
    validate_table_log(table_log)?;
    if frequencies.len() > 256 {
        return Err(EcError::InvalidDistribution { sum: frequencies.len(), expected: 256 });
    }
    let table_size = 1usize << table_log;
    let sum: usize = frequencies.iter().sum();
    if sum != table_size {
        return Err(EcError::InvalidDistribution { sum, expected: table_size });
    }
    Ok(table_size)
}

/// Floor of `log2(n)`, panicking callers' mistake of `n == 0` already ruled
/// out by the `frequencies[s] >= 1` check in the distribution validators.
fn floor_log2(n: u32) -> u32 {
    debug_assert!(n >= 1, "log2 of zero is undefined, caller must reject zero frequencies first");
    31 - n.leading_zeros()
}

/// Per-symbol record consumed by the streaming encoder. `None` for a symbol
/// with zero frequency: it can never legally appear in the input.
#[derive(Debug, Clone, Copy)]
pub struct EncoderEntry {
    pub bits_out: u32,
    pub threshold: u32,
    pub offset: i32,
}

/// Per-symbol encoder records plus the state-transition table, built once
/// from a frequency vector and shared read-only across any number of
/// [`EncoderContext`]s.
pub struct EncoderTables {
    entries: Vec<Option<EncoderEntry>>,
    states: Vec<u32>,
    table_log: usize,
}

impl EncoderTables {
    pub fn table_log(&self) -> usize {
        self.table_log
    }
}

/// Builds the per-symbol encoder records and the state-transition table for
/// a frequency vector that sums to `1 << table_log`.
///
/// See component 4.B of the design: for each symbol, `bits_out`/`threshold`
/// pin down whether the encoder will emit `bits_out` or `bits_out - 1` bits,
/// and `offset` locates the symbol's slice of the state-transition table.
pub fn build_encoder_tables(frequencies: &[usize], table_log: usize) -> EcResult<EncoderTables> {
    let table_size = validate_distribution(frequencies, table_log)?;
    let spread_table = spread(frequencies, table_log)?;

    if frequencies.iter().filter(|&&f| f > 0).count() == 1 {
        log::debug!("building encoder tables for a degenerate single-symbol distribution");
    }
    log::debug!("building encoder tables, table_log={table_log}, alphabet={}", frequencies.len());

    let mut entries: Vec<Option<EncoderEntry>> = vec![None; frequencies.len()];
    let mut interval_start = vec![0u32; frequencies.len()];
    let mut position: u32 = 0;
    for (symbol, &f) in frequencies.iter().enumerate() {
        if f == 0 {
            continue;
        }
        let f = f as u32;
        let bits_out = table_log as u32 - floor_log2(f);
        let threshold = f << bits_out;
        let offset = position as i32 - f as i32;
        interval_start[symbol] = position;
        entries[symbol] = Some(EncoderEntry { bits_out, threshold, offset });
        position += f;
    }
    debug_assert_eq!(position as usize, table_size);

    let mut states = vec![0u32; table_size];
    let mut cursor = interval_start;
    for (p, &symbol) in spread_table.iter().enumerate() {
        let idx = symbol as usize;
        states[cursor[idx] as usize] = (p + table_size) as u32;
        cursor[idx] += 1;
    }

    Ok(EncoderTables { entries, states, table_log })
}

/// Per-state record consumed by the streaming decoder.
#[derive(Debug, Clone, Copy)]
pub struct DecoderEntry {
    pub symbol: u8,
    pub number_of_bits: u32,
    pub next_state_baseline: u32,
}

/// Flat, `1 << table_log`-long decoder table, built once from a frequency
/// vector and shared read-only across any number of [`DecoderContext`]s.
pub struct DecoderTable {
    entries: Vec<DecoderEntry>,
    table_log: usize,
}

impl DecoderTable {
    pub fn table_log(&self) -> usize {
        self.table_log
    }

    pub fn entries(&self) -> &[DecoderEntry] {
        &self.entries
    }
}

/// Builds the per-state decoder table: for every table slot, which symbol it
/// emits, how many bits to read next, and the baseline the read bits are
/// added to. See component 4.C of the design.
pub fn build_decoder_table(frequencies: &[usize], table_log: usize) -> EcResult<DecoderTable> {
    let table_size = validate_distribution(frequencies, table_log)?;
    let spread_table = spread(frequencies, table_log)?;
    log::debug!("building decoder table, table_log={table_log}, alphabet={}", frequencies.len());

    let mut next_new_state: Vec<u32> = frequencies.iter().map(|&f| f as u32).collect();
    let mut entries = Vec::with_capacity(table_size);
    for &symbol in &spread_table {
        let idx = symbol as usize;
        let new_state = next_new_state[idx];
        next_new_state[idx] += 1;
        let number_of_bits = table_log as u32 - floor_log2(new_state);
        let next_state_baseline = (new_state << number_of_bits) - table_size as u32;
        entries.push(DecoderEntry { symbol, number_of_bits, next_state_baseline });
    }

    Ok(DecoderTable { entries, table_log })
}

/// Owns one input's worth of streaming encoder state: a private bit-stream
/// buffer and the evolving tANS state, against a shared, immutable
/// [`EncoderTables`].
pub struct EncoderContext<'t> {
    tables: &'t EncoderTables,
    writer: BitWriter,
    state: u32,
    table_size: u32,
}

impl<'t> EncoderContext<'t> {
    /// Initializes a fresh context with a zeroed stream buffer and the
    /// initial state `1 << table_log`.
    pub fn new(tables: &'t EncoderTables) -> Self {
        let table_size = 1u32 << tables.table_log;
        EncoderContext { tables, writer: BitWriter::new(), state: table_size, table_size }
    }

    /// Encodes `src` in index order, appending to the context's stream and
    /// advancing its state. See component 4.F.
    pub fn encode(&mut self, src: &[u8]) -> EcResult<()> {
        for &symbol in src {
            let entry = self
                .tables
                .entries
                .get(symbol as usize)
                .copied()
                .flatten()
                .ok_or(EcError::SymbolOutOfAlphabet { symbol })?;

            let mut bits_out = entry.bits_out;
            if self.state < entry.threshold {
                bits_out -= 1;
            }
            self.writer.write(bits_out, self.state);
            self.state >>= bits_out;

            let idx = (self.state as i32 + entry.offset) as usize;
            self.state = self.tables.states[idx];
            debug_assert!(self.state >= self.table_size && self.state < 2 * self.table_size);
        }
        log::trace!("encoded {} symbols, final state {}", src.len(), self.state);
        Ok(())
    }

    /// The coder's final state, normalized for transfer (`state - table_size`,
    /// landing in `[0, table_size)`, becomes the decoder's initial state).
    pub fn final_state(&self) -> u32 {
        self.state - self.table_size
    }

    /// Number of bytes used so far, including the partially filled tail.
    pub fn used_bytes(&self) -> usize {
        self.writer.used_bytes()
    }

    /// Number of bits of the terminal byte that hold written data.
    pub fn trailing_bits(&self) -> u32 {
        self.writer.trailing_bits()
    }

    /// Borrows the bytes written so far, for `DecoderContext::new` to copy
    /// out of before this context is flushed.
    pub fn bytes(&self) -> &[u8] {
        self.writer.bytes()
    }

    /// Consumes the context, releasing the owned stream buffer and returning
    /// it to the caller.
    pub fn flush(self) -> Vec<u8> {
        self.writer.into_bytes()
    }
}

/// Owns one decode's worth of streaming decoder state: an independent copy
/// of the encoder's stream buffer and the evolving tANS state, against a
/// shared, immutable [`DecoderTable`].
pub struct DecoderContext<'t> {
    table: &'t DecoderTable,
    buffer: Vec<u8>,
    trailing_bits: u32,
    state: u32,
    table_size: u32,
}

impl<'t> DecoderContext<'t> {
    /// Snapshots the encoder context's used stream prefix, final state, and
    /// trailing-bit count into an independent decoder context. See "State
    /// ownership" in the design notes: the two buffers are unrelated after
    /// this call.
    pub fn new(table: &'t DecoderTable, encoder: &EncoderContext) -> EcResult<Self> {
        let table_size = 1u32 << table.table_log;
        let final_state = encoder.final_state();
        if final_state >= table_size {
            return Err(EcError::StateMismatch { final_state: final_state as usize });
        }
        log::trace!("initializing decoder context from encoder final state {final_state}");
        Ok(DecoderContext {
            table,
            buffer: encoder.bytes().to_vec(),
            trailing_bits: encoder.trailing_bits(),
            state: final_state,
            table_size,
        })
    }

    /// Decodes `length` symbols, writing `dst[length - 1]` first and
    /// `dst[0]` last, the exact reverse of the encoder's consumption order.
    /// See component 4.G.
    ///
    /// This is a single-shot operation over the whole stream, mirroring the
    /// original reference's one-call `EC_decode`: each call rebuilds its bit
    /// reader from the context's terminal byte, so calling `decode` more
    /// than once on the same context re-reads the same bits rather than
    /// continuing where a previous call left off.
    pub fn decode(&mut self, length: usize) -> EcResult<Vec<u8>> {
        let mut dst = vec![0u8; length];
        if length == 0 {
            return Ok(dst);
        }
        let mut reader = BitReader::new(&self.buffer, self.trailing_bits);
        for i in (0..length).rev() {
            let entry = self.table.entries[self.state as usize];
            dst[i] = entry.symbol;
            let bits = reader.read(entry.number_of_bits)?;
            self.state = entry.next_state_baseline + bits;
            debug_assert!(self.state < self.table_size);
        }
        log::trace!("decoded {length} symbols, final state {}", self.state);
        Ok(dst)
    }

    /// Like [`decode`](Self::decode), but additionally requires the decoder
    /// to land back on state `0`, reporting [`EcError::StateMismatch`]
    /// otherwise. An optional sanity check, not the default, since a
    /// corrupted stream that still happens to land on state 0 is not ruled
    /// out by it either.
    pub fn decode_checked(&mut self, length: usize) -> EcResult<Vec<u8>> {
        let dst = self.decode(length)?;
        if self.state != 0 {
            log::warn!("decode did not terminate in state 0, ended in state {}", self.state);
            return Err(EcError::StateMismatch { final_state: self.state as usize });
        }
        Ok(dst)
    }
}

/// Convenience entry point mirroring the original reference's direct
/// function pair: builds an encoder context, encodes the whole input, and
/// flushes it in one call. Returns the stream bytes, the normalized final
/// state, and the number of meaningful bits in the terminal byte.
pub fn encode_tans(tables: &EncoderTables, src: &[u8]) -> EcResult<(Vec<u8>, u32, u32)> {
    let mut ctx = EncoderContext::new(tables);
    ctx.encode(src)?;
    let final_state = ctx.final_state();
    let trailing_bits = ctx.trailing_bits();
    Ok((ctx.flush(), final_state, trailing_bits))
}

/// Convenience entry point mirroring the original reference's direct
/// function pair: rebuilds a decoder context from the raw triple produced by
/// [`encode_tans`] and decodes `length` symbols.
pub fn decode_tans(
    table: &DecoderTable,
    stream: Vec<u8>,
    final_state: u32,
    trailing_bits: u32,
    length: usize,
) -> EcResult<Vec<u8>> {
    let table_size = 1u32 << table.table_log;
    if final_state >= table_size {
        return Err(EcError::StateMismatch { final_state: final_state as usize });
    }
    let mut reader_buffer = stream;
    if reader_buffer.is_empty() {
        reader_buffer.push(0);
    }
    let mut ctx = DecoderContext {
        table,
        buffer: reader_buffer,
        trailing_bits,
        state: final_state,
        table_size,
    };
    ctx.decode(length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(frequencies: &[usize], table_log: usize, src: &[u8]) -> Vec<u8> {
        let enc_tables = build_encoder_tables(frequencies, table_log).unwrap();
        let dec_table = build_decoder_table(frequencies, table_log).unwrap();
        let mut encoder = EncoderContext::new(&enc_tables);
        encoder.encode(src).unwrap();
        let mut decoder = DecoderContext::new(&dec_table, &encoder).unwrap();
        decoder.decode(src.len()).unwrap()
    }

    #[test]
    fn s1_singleton_distribution_round_trips_and_uses_zero_bits() {
        let frequencies = vec![16, 0, 0];
        let src = vec![0u8; 5];
        let enc_tables = build_encoder_tables(&frequencies, 4).unwrap();
        let mut encoder = EncoderContext::new(&enc_tables);
        encoder.encode(&src).unwrap();
        assert_eq!(encoder.final_state(), 0);
        assert_eq!(encoder.used_bytes(), 1);
        assert_eq!(encoder.trailing_bits(), 0);

        let dec_table = build_decoder_table(&frequencies, 4).unwrap();
        let mut decoder = DecoderContext::new(&dec_table, &encoder).unwrap();
        assert_eq!(decoder.decode(5).unwrap(), src);
    }

    #[test]
    fn s2_round_trip_with_mixed_distribution() {
        let frequencies = vec![7, 6, 3];
        let src = vec![0, 1, 0, 2, 1, 0, 2, 1, 0, 1, 1, 0, 2, 0, 0, 1];
        let enc_tables = build_encoder_tables(&frequencies, 4).unwrap();
        let mut encoder = EncoderContext::new(&enc_tables);
        encoder.encode(&src).unwrap();
        assert!(encoder.used_bytes() <= 4);
        let dec_table = build_decoder_table(&frequencies, 4).unwrap();
        let mut decoder = DecoderContext::new(&dec_table, &encoder).unwrap();
        assert_eq!(decoder.decode(src.len()).unwrap(), src);
    }

    #[test]
    fn s3_boundary_single_occurrence_symbol_round_trips() {
        let frequencies = vec![1, 15, 0];
        let mut src = vec![0u8];
        src.extend(std::iter::repeat(1u8).take(15));
        let decoded = round_trip(&frequencies, 4, &src);
        assert_eq!(decoded, src);
        assert_eq!(decoded[0], 0);
    }

    #[test]
    fn s5_decoder_table_baselines_stay_in_range() {
        let frequencies = vec![5, 5, 6];
        let table = build_decoder_table(&frequencies, 4).unwrap();
        for entry in &table.entries {
            let top = entry.next_state_baseline + (1u32 << entry.number_of_bits) - 1;
            assert!(top < 16);
        }
    }

    #[test]
    fn encoder_state_stays_in_range_through_encoding() {
        let frequencies = vec![7, 6, 3];
        let src = vec![0, 1, 0, 2, 1, 0, 2, 1, 0, 1, 1, 0, 2, 0, 0, 1];
        let tables = build_encoder_tables(&frequencies, 4).unwrap();
        let mut ctx = EncoderContext::new(&tables);
        let table_size = 1u32 << 4;
        for &symbol in &src {
            ctx.encode(&[symbol]).unwrap();
            assert!(ctx.state >= table_size && ctx.state < 2 * table_size);
        }
    }

    #[test]
    fn encoding_unknown_symbol_reports_symbol_out_of_alphabet() {
        let frequencies = vec![16, 0, 0];
        let tables = build_encoder_tables(&frequencies, 4).unwrap();
        let mut ctx = EncoderContext::new(&tables);
        assert_eq!(
            ctx.encode(&[1]),
            Err(EcError::SymbolOutOfAlphabet { symbol: 1 })
        );
    }

    #[test]
    fn build_encoder_tables_rejects_bad_table_log() {
        assert_eq!(
            build_encoder_tables(&[16], 0),
            Err(EcError::InvalidTableLog { table_log: 0 })
        );
        assert_eq!(
            build_encoder_tables(&[16], 13),
            Err(EcError::InvalidTableLog { table_log: 13 })
        );
        // In range but excluded: table_size = 8, step = 4 + 1 + 3 = 8 (even).
        assert_eq!(
            build_encoder_tables(&[8], 3),
            Err(EcError::InvalidTableLog { table_log: 3 })
        );
    }

    #[test]
    fn build_encoder_tables_rejects_distribution_not_summing_to_table_size() {
        assert_eq!(
            build_encoder_tables(&[5, 5], 4),
            Err(EcError::InvalidDistribution { sum: 10, expected: 16 })
        );
    }

    #[test]
    fn decode_checked_reports_state_mismatch_on_short_length() {
        let frequencies = vec![7, 6, 3];
        let src = vec![0, 1, 0, 2, 1, 0, 2, 1, 0, 1, 1, 0, 2, 0, 0, 1];
        let enc_tables = build_encoder_tables(&frequencies, 4).unwrap();
        let mut encoder = EncoderContext::new(&enc_tables);
        encoder.encode(&src).unwrap();
        let dec_table = build_decoder_table(&frequencies, 4).unwrap();
        let mut decoder = DecoderContext::new(&dec_table, &encoder).unwrap();
        assert!(decoder.decode_checked(src.len() - 1).is_err());
    }

    #[test]
    fn free_function_round_trip_matches_context_api() {
        let frequencies = vec![7, 6, 3];
        let src = vec![0, 1, 0, 2, 1, 0, 2, 1, 0, 1, 1, 0, 2, 0, 0, 1];
        let enc_tables = build_encoder_tables(&frequencies, 4).unwrap();
        let (bytes, final_state, trailing_bits) = encode_tans(&enc_tables, &src).unwrap();
        let dec_table = build_decoder_table(&frequencies, 4).unwrap();
        let decoded = decode_tans(&dec_table, bytes, final_state, trailing_bits, src.len()).unwrap();
        assert_eq!(decoded, src);
    }
}
