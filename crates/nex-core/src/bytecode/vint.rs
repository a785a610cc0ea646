//! Variable-length integers
//!
//! Base-128, most significant group first. Every byte but the last has the
//! high bit set. Values are limited to 32 bits.

use crate::error::{NexError, NexResult};

/// Decode one integer at `*cursor`, advancing the cursor past it.
pub fn read_vint(bytes: &[u8], cursor: &mut usize) -> NexResult<usize> {
    let start = *cursor;
    let mut r: u32 = 0;
    loop {
        let x = *bytes.get(*cursor).ok_or(NexError::Truncated {
            offset: *cursor,
            needed: 1,
        })?;
        *cursor += 1;
        if r & !(u32::MAX >> 7) != 0 {
            return Err(NexError::IntegerOverflow(start));
        }
        r = (r << 7) | u32::from(x & 0x7f);
        if x & 0x80 == 0 {
            return Ok(r as usize);
        }
    }
}

/// Append the shortest encoding of `n`.
pub fn write_vint(out: &mut Vec<u8>, n: u32) {
    let mut groups = [0u8; 5];
    let mut len = 0;
    let mut v = n;
    loop {
        groups[len] = (v & 0x7f) as u8;
        len += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..len).rev() {
        let more = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | more);
    }
}

/// Append an encoding of `n` padded with leading empty groups to exactly
/// `width` bytes. Used where the compiler reserves fixed-size slots, such as
/// jump table entries.
pub fn write_vint_wide(out: &mut Vec<u8>, n: u32, width: usize) {
    let mut short = Vec::with_capacity(5);
    write_vint(&mut short, n);
    assert!(short.len() <= width, "{} does not fit in {} bytes", n, width);
    out.extend(std::iter::repeat(0x80).take(width - short.len()));
    out.extend(short);
}

/// Encode `n` as a variable-length integer
pub fn encode(n: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    write_vint(&mut out, n);
    out
}
