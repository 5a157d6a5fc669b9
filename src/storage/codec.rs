//! Solidity's storage encoding of `bytes` and `string` values.
//!
//! A value of up to 31 bytes lives inline in its base slot: the data is left aligned and the
//! lowest byte holds `length * 2`. Longer values store `length * 2 + 1` in the base slot and the
//! data in `ceil(length / 32)` consecutive slots starting at `keccak256(base)`. The lowest bit of
//! the base slot therefore tells the two forms apart.
use alloy_primitives::{keccak256, B256, U256};
use alloy_sol_types::abi::{token::PackedSeqToken, Decoder};

/// Largest value that is stored inline in its base slot.
pub const INLINE_CAPACITY: usize = 31;

/// A value encoded for storage: the base slot word and the words of its data slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedValue {
    pub base: B256,
    pub data: Vec<B256>,
}

/// Whether a base slot word uses the multi-slot encoding.
pub fn is_long_form(word: &B256) -> bool {
    word[31] & 1 == 1
}

/// First data slot of a value whose base slot is `base`.
pub fn data_slot(base: U256) -> U256 {
    U256::from_be_bytes(keccak256(base.to_be_bytes::<32>()).0)
}

/// Decodes a value stored inline. Returns `None` for long-form words and for words whose
/// length byte doesn't fit in a slot.
pub fn unpack_inline(word: &B256) -> Option<Vec<u8>> {
    if is_long_form(word) {
        return None;
    }
    let length = (word[31] / 2) as usize;
    if length > INLINE_CAPACITY {
        return None;
    }
    Some(word[..length].to_vec())
}

/// Length in bytes encoded by a long-form base slot word.
///
/// Values that fit inline are never stored in long form, so a word with the low bit set but a
/// length of at most [`INLINE_CAPACITY`] (e.g. a plain `1`) isn't a length word at all.
pub fn long_length(length_word: &B256) -> Option<usize> {
    if !is_long_form(length_word) {
        return None;
    }
    usize::try_from(U256::from_be_bytes(length_word.0) >> 1)
        .ok()
        .filter(|length| *length > INLINE_CAPACITY)
}

/// Number of data slots a base slot word spans. Inline values don't use any, malformed
/// long-form words yield `None`.
pub fn footprint(length_word: &B256) -> Option<usize> {
    if !is_long_form(length_word) {
        return Some(0);
    }
    long_length(length_word).map(|length| length.div_ceil(32))
}

/// Decodes a long-form value from its base slot word and its data slot words.
///
/// Returns `None` if `length_word` is not long form or `data` is too short for the encoded
/// length.
pub fn unpack_multi(length_word: &B256, data: &[B256]) -> Option<Vec<u8>> {
    let length = long_length(length_word)?;
    if data.len() * 32 < length {
        return None;
    }
    Some(
        data.iter()
            .flat_map(|word| word.0)
            .take(length)
            .collect(),
    )
}

/// Encodes a value for storage, inline if it fits in [`INLINE_CAPACITY`] bytes.
pub fn pack(value: &[u8]) -> PackedValue {
    if value.len() <= INLINE_CAPACITY {
        let mut base = [0u8; 32];
        base[..value.len()].copy_from_slice(value);
        base[31] = (value.len() * 2) as u8;
        return PackedValue { base: B256::from(base), data: Vec::new() };
    }

    let length_word = U256::from(value.len()) * U256::from(2) + U256::from(1);
    let data = value
        .chunks(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word[..chunk.len()].copy_from_slice(chunk);
            B256::from(word)
        })
        .collect();
    PackedValue { base: B256::from(length_word.to_be_bytes::<32>()), data }
}

/// Returns the `depth`-th 32 byte word of ABI encoded data, zero padded if the data is short.
pub fn word_at(data: &[u8], depth: usize) -> B256 {
    let mut word = [0u8; 32];
    let start = depth.saturating_mul(32);
    if start < data.len() {
        let available = &data[start..data.len().min(start + 32)];
        word[..available.len()].copy_from_slice(available);
    }
    B256::from(word)
}

/// Decodes the `bytes`/`string` value whose head is the `depth`-th word of ABI encoded data.
///
/// Returns `None` if the offset or the length point outside of `data`.
pub fn decode_dynamic_return(data: &[u8], depth: usize) -> Option<Vec<u8>> {
    let mut decoder = Decoder::new(data, false);
    for _ in 0..depth {
        decoder.take_word().ok()?;
    }
    decoder
        .decode::<PackedSeqToken<'_>>()
        .ok()
        .map(PackedSeqToken::into_vec)
}
