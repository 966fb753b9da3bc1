//! Frame codec: sync word, length, CRC-16/CCITT-FALSE, R=3 repetition.
//!
//! Frame layout (big-endian, MSB-first within each byte):
//! `sync(16) || len(16) || data(8*len) || crc(16)`.

use crate::constants::{
    LEN_HAMMING_TOLERANCE, MAX_PAYLOAD_BYTES, REPAIR_LOW_CONF_BUDGET, REPAIR_MAX_FLIPS,
    REPAIR_MAX_FLIPS_EXACT_SYNC_AT_ZERO, REPETITION_FACTOR, SYNC_HAMMING_TOLERANCE, SYNC_WORD,
};
use crc::{Crc, CRC_16_IBM_3740};

/// CRC-16/CCITT-FALSE: poly 0x1021, init 0xFFFF, no reflect, no xorout.
/// `CRC_16_IBM_3740` is that exact algorithm under the `crc` crate's
/// catalog naming.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Computes the frame's CRC-16 over the payload data only.
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Encodes `msg` into a repetition-coded ±1 symbol stream. Messages longer
/// than `MAX_PAYLOAD_BYTES` are silently truncated (spec non-goal).
pub fn encode(msg: &str) -> Vec<i8> {
    let mut data = msg.as_bytes();
    if data.len() > MAX_PAYLOAD_BYTES {
        data = &data[..MAX_PAYLOAD_BYTES];
    }
    let raw_bits = raw_frame_bits(data);
    spread_repetition(&raw_bits)
}

fn raw_frame_bits(data: &[u8]) -> Vec<u8> {
    let mut bits = Vec::with_capacity((2 + 2 + data.len() + 2) * 8);
    push_word_bits(&mut bits, SYNC_WORD);
    push_word_bits(&mut bits, data.len() as u16);
    for &b in data {
        push_byte_bits(&mut bits, b);
    }
    push_word_bits(&mut bits, crc16(data));
    bits
}

fn spread_repetition(raw_bits: &[u8]) -> Vec<i8> {
    let mut out = Vec::with_capacity(raw_bits.len() * REPETITION_FACTOR);
    for &bit in raw_bits {
        let symbol: i8 = if bit == 1 { 1 } else { -1 };
        for _ in 0..REPETITION_FACTOR {
            out.push(symbol);
        }
    }
    out
}

fn push_byte_bits(dst: &mut Vec<u8>, b: u8) {
    for i in (0..8).rev() {
        dst.push((b >> i) & 1);
    }
}

fn push_word_bits(dst: &mut Vec<u8>, v: u16) {
    push_byte_bits(dst, (v >> 8) as u8);
    push_byte_bits(dst, v as u8);
}

fn read_byte_at_bit(bits: &[u8], start: isize) -> u8 {
    let mut out = 0u8;
    for i in 0..8 {
        out <<= 1;
        let idx = start + i;
        if idx >= 0 && (idx as usize) < bits.len() && bits[idx as usize] != 0 {
            out |= 1;
        }
    }
    out
}

fn read_word_at_bit(bits: &[u8], start: isize) -> u16 {
    let hi = read_byte_at_bit(bits, start);
    let lo = read_byte_at_bit(bits, start + 8);
    ((hi as u16) << 8) | lo as u16
}

/// Hard-symbol decode: majority-of-3 combine, then sync-exact window
/// search with CRC gating. spec.md §4.2 "Decoding from hard symbols".
pub fn decode_hard(symbols: &[i8]) -> (String, bool) {
    if symbols.len() < (16 + 16 + 16) * REPETITION_FACTOR {
        return (String::new(), false);
    }
    let raw_bits = majority_decode(symbols);
    if raw_bits.len() < 48 {
        return (String::new(), false);
    }

    for start in 0..=(raw_bits.len() - 32) {
        let sync = read_word_at_bit(&raw_bits, start as isize);
        if sync != SYNC_WORD {
            continue;
        }
        let msg_len = read_word_at_bit(&raw_bits, start as isize + 16) as usize;
        let total_needed = 16 + 16 + msg_len * 8 + 16;
        if start + total_needed > raw_bits.len() {
            continue;
        }

        let data_start = start + 32;
        let data: Vec<u8> = (0..msg_len)
            .map(|i| read_byte_at_bit(&raw_bits, (data_start + i * 8) as isize))
            .collect();

        let got_crc = read_word_at_bit(&raw_bits, (data_start + msg_len * 8) as isize);
        if got_crc != crc16(&data) {
            continue;
        }

        if let Ok(s) = String::from_utf8(data) {
            return (s, true);
        }
    }

    (String::new(), false)
}

fn majority_decode(symbols: &[i8]) -> Vec<u8> {
    let n = symbols.len() / REPETITION_FACTOR;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let base = i * REPETITION_FACTOR;
        let votes: i32 = symbols[base..base + REPETITION_FACTOR]
            .iter()
            .map(|&s| if s > 0 { 1 } else { -1 })
            .sum();
        out.push(if votes > 0 { 1 } else { 0 });
    }
    out
}

/// Soft-combined raw bit plus its confidence (`|sum|` of the repetition
/// triplet).
struct SoftBit {
    bit: u8,
    confidence: f32,
}

fn soft_combine(soft_symbols: &[f32]) -> Vec<SoftBit> {
    let n = soft_symbols.len() / REPETITION_FACTOR;
    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let base = i * REPETITION_FACTOR;
        let sum: f32 = soft_symbols[base..base + REPETITION_FACTOR].iter().sum();
        out.push(SoftBit {
            bit: if sum >= 0.0 { 1 } else { 0 },
            confidence: sum.abs(),
        });
    }
    out
}

/// Combines each consecutive triplet of soft symbols by summing (soft
/// majority) into a 0/1 raw bit. Exposed so the detector's confidence
/// score is computed from the exact same combined bits the decoder used,
/// rather than re-deriving them from hard per-symbol signs.
pub fn combine_raw_bits(soft_symbols: &[f32]) -> Vec<u8> {
    soft_combine(soft_symbols).into_iter().map(|b| b.bit).collect()
}

fn hamming_distance_u16(a: u16, b: u16) -> u32 {
    (a ^ b).count_ones()
}

fn is_plausible_text(data: &[u8]) -> bool {
    match std::str::from_utf8(data) {
        Ok(s) => s
            .chars()
            .all(|c| c == '\t' || c == '\n' || c == '\r' || !c.is_control()),
        Err(_) => false,
    }
}

/// Soft-symbol decode used by the detector (spec.md §4.2 "Decoding from
/// soft symbols" and the decoder state machine in §4.7).
///
/// Returns `(msg, ok, start_bit, payload_bits)`. `start_bit`/`payload_bits`
/// describe the accepted window in raw-bit space and are used by the
/// caller to compute a detection confidence score even when `ok` is
/// `false`.
pub fn decode_soft(soft_symbols: &[f32]) -> (String, bool, Option<usize>, usize) {
    let raw_bits_full = soft_combine(soft_symbols);
    if raw_bits_full.len() < 48 {
        return (String::new(), false, None, 0);
    }
    let bits: Vec<u8> = raw_bits_full.iter().map(|b| b.bit).collect();

    for start in 0..=(bits.len() - 32) {
        let sync = read_word_at_bit(&bits, start as isize);
        if hamming_distance_u16(sync, SYNC_WORD) > SYNC_HAMMING_TOLERANCE {
            continue;
        }
        let exact_sync_at_zero = start == 0 && sync == SYNC_WORD;

        let read_len = read_word_at_bit(&bits, start as isize + 16);
        let max_fit = bits.len().saturating_sub(start + 48) / 8;

        let mut len_candidates: Vec<usize> = Vec::new();
        for len_candidate in 0..=max_fit.min(MAX_PAYLOAD_BYTES) {
            if hamming_distance_u16(len_candidate as u16, read_len) <= LEN_HAMMING_TOLERANCE {
                len_candidates.push(len_candidate);
            }
        }
        len_candidates.sort_unstable();

        for msg_len in len_candidates {
            let total_needed = 16 + 16 + msg_len * 8 + 16;
            if start + total_needed > bits.len() {
                continue;
            }
            let data_start = start + 32;

            // Direct pass.
            let data: Vec<u8> = (0..msg_len)
                .map(|i| read_byte_at_bit(&bits, (data_start + i * 8) as isize))
                .collect();
            let got_crc = read_word_at_bit(&bits, (data_start + msg_len * 8) as isize);
            if got_crc == crc16(&data) && is_plausible_text(&data) {
                if let Ok(s) = String::from_utf8(data) {
                    return (s, true, Some(start), total_needed);
                }
            }

            // Repair pass: flip up to F of the K lowest-confidence data
            // bits (never sync/len/crc bits).
            let max_flips = if exact_sync_at_zero {
                REPAIR_MAX_FLIPS_EXACT_SYNC_AT_ZERO
            } else {
                REPAIR_MAX_FLIPS
            };
            if let Some(s) = repair_pass(
                &raw_bits_full,
                data_start,
                msg_len,
                max_flips,
                REPAIR_LOW_CONF_BUDGET,
            ) {
                return (s, true, Some(start), total_needed);
            }
        }
    }

    (String::new(), false, None, 0)
}

fn repair_pass(
    raw_bits_full: &[SoftBit],
    data_start: usize,
    msg_len: usize,
    max_flips: usize,
    low_conf_budget: usize,
) -> Option<String> {
    if msg_len == 0 {
        return None;
    }

    let mut candidate_positions: Vec<usize> = (data_start..data_start + msg_len * 8).collect();
    candidate_positions.sort_unstable_by(|&a, &b| {
        raw_bits_full[a]
            .confidence
            .total_cmp(&raw_bits_full[b].confidence)
    });
    candidate_positions.truncate(low_conf_budget);

    let crc_start = data_start + msg_len * 8;
    let crc_bits: Vec<u8> = raw_bits_full[crc_start..crc_start + 16]
        .iter()
        .map(|b| b.bit)
        .collect();
    let got_crc = ((crc_bits[..8].iter().fold(0u16, |acc, &b| (acc << 1) | b as u16)) << 8)
        | crc_bits[8..].iter().fold(0u16, |acc, &b| (acc << 1) | b as u16);

    for flip_count in 1..=max_flips.min(candidate_positions.len()) {
        for subset in combinations(&candidate_positions, flip_count) {
            let data = build_data_with_flips(raw_bits_full, data_start, msg_len, &subset);
            if got_crc == crc16(&data) && is_plausible_text(&data) {
                if let Ok(s) = String::from_utf8(data) {
                    return Some(s);
                }
            }
        }
    }
    None
}

fn build_data_with_flips(
    raw_bits_full: &[SoftBit],
    data_start: usize,
    msg_len: usize,
    flips: &[usize],
) -> Vec<u8> {
    let mut bits: Vec<u8> = raw_bits_full[data_start..data_start + msg_len * 8]
        .iter()
        .map(|b| b.bit)
        .collect();
    for &pos in flips {
        let local = pos - data_start;
        bits[local] ^= 1;
    }
    bits.chunks_exact(8)
        .map(|byte_bits| byte_bits.iter().fold(0u8, |acc, &b| (acc << 1) | b))
        .collect()
}

/// All `k`-sized subsets of `items`, in a stable deterministic order.
fn combinations(items: &[usize], k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > items.len() {
        return Vec::new();
    }
    let mut result = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        result.push(idx.iter().map(|&i| items[i]).collect());

        let mut i = k;
        loop {
            if i == 0 {
                return result;
            }
            i -= 1;
            if idx[i] != i + items.len() - k {
                break;
            }
        }
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

/// The 16 raw bits of the sync word, MSB-first — used by the detector to
/// score a failed decode against the expected sync pattern alone.
pub fn sync_word_bits() -> Vec<u8> {
    let mut bits = Vec::with_capacity(16);
    push_word_bits(&mut bits, SYNC_WORD);
    bits
}

/// Re-encodes `msg` to raw frame bits (without repetition) — used by the
/// detector to compute a match-fraction score against hard symbols.
pub fn encode_raw_bits(msg: &str) -> Vec<u8> {
    let mut data = msg.as_bytes();
    if data.len() > MAX_PAYLOAD_BYTES {
        data = &data[..MAX_PAYLOAD_BYTES];
    }
    raw_frame_bits(data)
}
