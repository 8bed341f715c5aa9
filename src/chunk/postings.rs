//! Posting list encoding for sealed chunks
//!
//! A term's list is:
//! - vbyte document count
//! - per document: vbyte slot delta, vbyte instance count, then one
//!   little-endian u64 instance word per instance

use super::types::DocSlot;
use crate::error::{IndexError, Result};

/// Postings of one term in one document
pub type SlotPostings = (DocSlot, Vec<u64>);

/// Variable-byte encoding for integers
pub fn encode_vbyte(value: u32, output: &mut Vec<u8>) {
    let mut v = value;
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            output.push(byte | 0x80); // high bit marks the last byte
            break;
        } else {
            output.push(byte);
        }
    }
}

/// Decode a variable-byte encoded integer
pub fn decode_vbyte(input: &[u8], pos: &mut usize) -> Result<u32> {
    let mut result: u32 = 0;
    let mut shift = 0;

    loop {
        if *pos >= input.len() {
            return Err(IndexError::data_format("unexpected end of vbyte"));
        }

        let byte = input[*pos];
        *pos += 1;

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 != 0 {
            return Ok(result);
        }

        shift += 7;
        if shift > 28 {
            return Err(IndexError::data_format("vbyte value too large"));
        }
    }
}

/// Encode a term's postings; slots must be ascending
pub fn encode_postings(list: &[SlotPostings]) -> Vec<u8> {
    let instances: usize = list.iter().map(|(_, words)| words.len()).sum();
    let mut out = Vec::with_capacity(2 + list.len() * 3 + instances * 8);

    encode_vbyte(list.len() as u32, &mut out);
    let mut prev = 0u32;
    for (slot, words) in list {
        debug_assert!(slot.0 >= prev, "slots out of order");
        encode_vbyte(slot.0 - prev, &mut out);
        prev = slot.0;
        encode_vbyte(words.len() as u32, &mut out);
        for word in words {
            out.extend_from_slice(&word.to_le_bytes());
        }
    }
    out
}

/// Decode a list written by [`encode_postings`]
pub fn decode_postings(bytes: &[u8]) -> Result<Vec<SlotPostings>> {
    let mut pos = 0;
    let docs = decode_vbyte(bytes, &mut pos)? as usize;
    let mut list = Vec::with_capacity(docs.min(bytes.len()));
    let mut slot = 0u32;

    for _ in 0..docs {
        slot = slot
            .checked_add(decode_vbyte(bytes, &mut pos)?)
            .ok_or_else(|| IndexError::data_format("document slot overflow"))?;
        let count = decode_vbyte(bytes, &mut pos)? as usize;
        let end = count
            .checked_mul(8)
            .and_then(|len| pos.checked_add(len))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| IndexError::data_format("truncated instance words"))?;

        let words = bytes[pos..end]
            .chunks_exact(8)
            .map(|chunk| {
                let mut word = [0u8; 8];
                word.copy_from_slice(chunk);
                u64::from_le_bytes(word)
            })
            .collect();
        pos = end;
        list.push((DocSlot(slot), words));
    }

    if pos != bytes.len() {
        return Err(IndexError::data_format("trailing bytes after posting list"));
    }
    Ok(list)
}
