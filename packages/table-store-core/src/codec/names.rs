//! ABI encoding of `string[]`, used for the key and field names stored in the
//! Tables registry.

use crate::error::StoreError;

const WORD: usize = 32;

/// Encodes names as the ABI encoding of a single `string[]` argument.
pub fn encode_names<S: AsRef<str>>(names: &[S]) -> Vec<u8> {
    let mut heads = Vec::with_capacity(names.len() * WORD);
    let mut tails = Vec::new();
    let head_size = names.len() * WORD;
    for name in names {
        heads.extend_from_slice(&word_from_usize(head_size + tails.len()));
        let bytes = name.as_ref().as_bytes();
        tails.extend_from_slice(&word_from_usize(bytes.len()));
        tails.extend_from_slice(bytes);
        tails.resize(tails.len() + padding(bytes.len()), 0);
    }

    let mut out = Vec::with_capacity(2 * WORD + heads.len() + tails.len());
    out.extend_from_slice(&word_from_usize(WORD));
    out.extend_from_slice(&word_from_usize(names.len()));
    out.extend_from_slice(&heads);
    out.extend_from_slice(&tails);
    out
}

/// Decodes an ABI-encoded `string[]`.
///
/// An empty input decodes to no names, which is how the registry stores
/// tables registered without names.
pub fn decode_names(data: &[u8]) -> Result<Vec<String>, StoreError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let array_offset = read_usize(data, 0)?;
    let count = read_usize(data, array_offset)?;
    let heads_start = array_offset + WORD;

    let mut names = Vec::with_capacity(count.min(data.len() / WORD));
    for i in 0..count {
        let element_offset = read_usize(data, heads_start + i * WORD)?;
        let element_start = heads_start
            .checked_add(element_offset)
            .ok_or_else(|| malformed("element offset overflows"))?;
        let len = read_usize(data, element_start)?;
        let bytes_start = element_start + WORD;
        let bytes = data
            .get(bytes_start..bytes_start.saturating_add(len))
            .filter(|b| b.len() == len)
            .ok_or_else(|| malformed("name runs past the end of the data"))?;
        let name = String::from_utf8(bytes.to_vec())
            .map_err(|e| malformed(&format!("name {} is not UTF-8: {}", i, e)))?;
        names.push(name);
    }
    Ok(names)
}

fn padding(len: usize) -> usize {
    (WORD - len % WORD) % WORD
}

fn word_from_usize(value: usize) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn read_usize(data: &[u8], offset: usize) -> Result<usize, StoreError> {
    let word = data
        .get(offset..offset.saturating_add(WORD))
        .filter(|w| w.len() == WORD)
        .ok_or_else(|| malformed(&format!("word at offset {} is out of bounds", offset)))?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(malformed(&format!("word at offset {} is too large", offset)));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(buf))
        .map_err(|_| malformed(&format!("word at offset {} is too large", offset)))
}

fn malformed(detail: &str) -> StoreError {
    StoreError::LayoutMismatch(format!("malformed name list: {}", detail))
}
