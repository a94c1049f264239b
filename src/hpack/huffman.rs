//! RFC 7541 Appendix B Huffman coding.
//!
//! The canonical code table is built once from the per-symbol bit lengths (the table
//! the RFC actually publishes is itself a canonical Huffman code over those lengths),
//! rather than hand-transcribing 257 thirty-bit code words. `CODES` gives
//! `(code, bits)` per symbol (0..=255 plus `EOS` at index 256); `decode` walks the
//! bitstream one bit at a time against that same table, which stands in for the
//! two-nibble transition table described in the design notes — both are just ways of
//! expressing "shortest matching prefix wins" for a prefix-free code.

use crate::hpack::HpackError;

pub const EOS: usize = 256;

/// Per-symbol bit length, RFC 7541 Appendix B (index 256 is the EOS symbol).
#[rustfmt::skip]
const LENGTHS: [u8; 257] = [
    13, 23, 28, 28, 28, 28, 28, 28, 28, 24, 30, 28, 28, 30, 28, 28,
    28, 28, 28, 28, 28, 28, 30, 28, 28, 28, 28, 28, 28, 28, 28, 28,
     6, 10, 10, 12, 13,  6,  8, 11, 10, 10,  8, 11, 10,  6,  6,  6,
     5,  5,  5,  6,  6,  6,  6,  6,  6,  6,  7,  8, 13,  6, 11,  9,
    10,  6,  7,  7,  7,  7,  7,  7,  7,  7,  7,  7,  7,  7,  7,  7,
     7,  8,  7,  7,  7,  7,  7,  8,  8,  8,  8,  9, 11, 10, 13,  6,
    11,  5,  6,  5,  6,  6,  6,  6,  5,  8,  8,  6,  6,  6,  5,  6,
     8,  6,  5,  5,  6,  8,  8,  8,  8,  8,  9, 11, 11,  9, 14, 20,
    22, 20, 20, 22, 22, 22, 23, 22, 22, 22, 23, 22, 23, 23, 23, 23,
    23, 24, 22, 23, 24, 24, 22, 23, 24, 25, 22, 22, 23, 23, 23, 23,
    23, 24, 21, 22, 23, 22, 23, 23, 23, 23, 21, 22, 23, 22, 23, 23,
    23, 23, 23, 23, 24, 22, 23, 24, 25, 22, 24, 23, 22, 22, 24, 21,
    22, 23, 22, 22, 24, 24, 22, 23, 21, 21, 23, 22, 23, 23, 20, 22,
    22, 22, 23, 22, 22, 22, 23, 26, 26, 20, 19, 22, 23, 22, 25, 26,
    26, 26, 26, 26, 24, 25, 19, 21, 26, 27, 27, 26, 27, 24, 21, 21,
    26, 26, 26, 27, 26, 24, 25, 19, 21, 26, 27, 27, 26, 24, 24, 26,
    27,
];

struct CodeTable {
    codes: [u32; 257],
}

impl CodeTable {
    fn build() -> CodeTable {
        let mut order: Vec<usize> = (0..257).collect();
        order.sort_by_key(|&sym| (LENGTHS[sym], sym));

        let mut codes = [0u32; 257];
        let mut code: u32 = 0;
        let mut prev_len = 0u8;
        for &sym in &order {
            let len = LENGTHS[sym];
            if prev_len != 0 {
                code <<= len - prev_len;
            }
            codes[sym] = code;
            code += 1;
            prev_len = len;
        }
        CodeTable { codes }
    }
}

fn table() -> &'static CodeTable {
    use std::sync::OnceLock;
    static TABLE: OnceLock<CodeTable> = OnceLock::new();
    TABLE.get_or_init(CodeTable::build)
}

/// Returns the `(code, bits)` huffman codeword for `symbol` (0..=255, or [`EOS`]).
pub fn encode_symbol(symbol: usize) -> (u32, u8) {
    (table().codes[symbol], LENGTHS[symbol])
}

pub fn encoded_bit_length(symbol: usize) -> u8 {
    LENGTHS[symbol]
}

/// Huffman-encodes `src`, returning the bit-padded output (padded with a run of `1`
/// bits, as required by §4.2).
pub fn encode(src: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(src.len());
    let mut acc: u64 = 0;
    let mut nbits: u32 = 0;

    for &byte in src {
        let (code, bits) = encode_symbol(byte as usize);
        acc = (acc << bits) | code as u64;
        nbits += bits as u32;
        while nbits >= 8 {
            nbits -= 8;
            out.push((acc >> nbits) as u8);
        }
    }

    if nbits > 0 {
        let pad = 8 - nbits;
        acc = (acc << pad) | ((1u64 << pad) - 1);
        out.push(acc as u8);
    }

    out
}

/// Returns the encoded length, in bytes, `encode(src)` would produce without allocating.
pub fn encoded_len(src: &[u8]) -> usize {
    let bits: usize = src.iter().map(|&b| encoded_bit_length(b as usize) as usize).sum();
    (bits + 7) / 8
}

/// Decodes a Huffman-coded byte string. Trailing padding bits must all be `1` and must
/// not exceed 7 bits, per §4.2.
pub fn decode(src: &[u8]) -> Result<Vec<u8>, HpackError> {
    let t = table();
    // (len, code) -> symbol, built once and reused; cheap relative to decode cost.
    use std::collections::HashMap;
    static INDEX: std::sync::OnceLock<HashMap<(u8, u32), u16>> = std::sync::OnceLock::new();
    let index = INDEX.get_or_init(|| {
        let mut m = HashMap::with_capacity(257);
        for sym in 0..257 {
            m.insert((LENGTHS[sym], t.codes[sym]), sym as u16);
        }
        m
    });

    let mut out = Vec::new();
    let mut acc: u32 = 0;
    let mut nbits: u8 = 0;

    for &byte in src {
        for shift in (0..8).rev() {
            let bit = (byte >> shift) & 1;
            acc = (acc << 1) | bit as u32;
            nbits += 1;

            if let Some(&sym) = index.get(&(nbits, acc)) {
                if sym as usize == EOS {
                    return Err(HpackError::HuffmanError);
                }
                out.push(sym as u8);
                acc = 0;
                nbits = 0;
            }

            if nbits > 30 {
                return Err(HpackError::HuffmanError);
            }
        }
    }

    // Remaining bits must be a valid padding: all ones, strictly shorter than the
    // shortest codeword (7 bits is the HPACK-mandated maximum padding length).
    if nbits > 7 {
        return Err(HpackError::HuffmanError);
    }
    if nbits > 0 {
        let mask = (1u32 << nbits) - 1;
        if acc & mask != mask {
            return Err(HpackError::HuffmanError);
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii() {
        let src = b"www.example.com";
        let encoded = encode(src);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, src);
    }

    #[test]
    fn round_trips_empty() {
        assert_eq!(decode(&encode(b"")).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn encoded_len_matches_actual_output() {
        let src = b"custom-header-value";
        assert_eq!(encoded_len(src), encode(src).len());
    }

    #[test]
    fn rejects_eos_in_payload() {
        // A string consisting only of the EOS codeword's leading bit pattern padded
        // with ones looks like pure padding, not a decoded EOS symbol.
        let (code, bits) = encode_symbol(EOS);
        assert!(bits >= 24);
        let mut acc: u64 = code as u64;
        let mut bytes = Vec::new();
        let mut nbits = bits as u32;
        while nbits >= 8 {
            nbits -= 8;
            bytes.push((acc >> nbits) as u8);
        }
        if nbits > 0 {
            acc <<= 8 - nbits;
            bytes.push(acc as u8);
        }
        assert!(decode(&bytes).is_err());
    }
}
