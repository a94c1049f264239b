//! HPACK encoding (§4.2).
//!
//! The HPACK byte stream itself has no notion of frame boundaries — splitting it across
//! HEADERS/CONTINUATION frames is purely a wire-layer concern (§4.4), so unlike the
//! teacher's `hpack::Encoder::encode` (which returns `Encode::Partial` when a single
//! frame's capacity is exceeded) this encoder always writes the complete block; the
//! frame layer slices the resulting bytes into frames.

use bytes::Bytes;

use crate::hpack::{huffman, table, DynamicTable, Indexing};

#[derive(Debug)]
pub struct Encoder {
    dynamic: DynamicTable,
    limit_update_min: Option<usize>,
    limit_update_end: Option<usize>,
}

impl Encoder {
    pub fn new(dynamic_table_limit: usize) -> Encoder {
        Encoder {
            dynamic: DynamicTable::new(dynamic_table_limit),
            limit_update_min: None,
            limit_update_end: None,
        }
    }

    /// Requests a new dynamic table limit, to take effect before the next header is
    /// encoded. Per §4.2/§9, a settings-change sequence is coalesced into at most two
    /// size-update prefix entries: the smallest and the most recent requested limit.
    pub fn set_limit(&mut self, new_limit: usize) {
        let min = self.limit_update_min.map_or(new_limit, |m| m.min(new_limit));
        self.limit_update_min = Some(min);
        self.limit_update_end = Some(new_limit);
    }

    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.dynamic
    }

    /// Raises or lowers the ceiling a subsequent `set_limit` may request, mirroring the
    /// peer's `header_table_size` SETTINGS value (connection layer, on inbound SETTINGS).
    pub fn set_limit_upper(&mut self, limit_upper: usize) {
        self.dynamic.set_limit_upper(limit_upper);
    }

    fn emit_size_updates(&mut self, dst: &mut Vec<u8>) {
        let min = self.limit_update_min.take();
        let end = self.limit_update_end.take();

        if let Some(min) = min {
            if min != self.dynamic.limit() {
                encode_integer(min as u64, 0b001_00000, 5, dst);
                self.dynamic.apply_size_update(min).ok();
            }
            if let Some(end) = end {
                if end != self.dynamic.limit() {
                    encode_integer(end as u64, 0b001_00000, 5, dst);
                    self.dynamic.apply_size_update(end).ok();
                }
            }
        } else if let Some(end) = end {
            if end != self.dynamic.limit() {
                encode_integer(end as u64, 0b001_00000, 5, dst);
                self.dynamic.apply_size_update(end).ok();
            }
        }
    }

    /// Encodes every `(name, value, indexing)` triple in order into `dst`.
    pub fn encode<I>(&mut self, headers: I, dst: &mut Vec<u8>)
    where
        I: IntoIterator<Item = (Bytes, Bytes, Indexing)>,
    {
        let mut first = true;
        for (name, value, indexing) in headers {
            if first {
                self.emit_size_updates(dst);
                first = false;
            }
            self.encode_one(&name, &value, indexing, dst);
        }
    }

    fn encode_one(&mut self, name: &[u8], value: &[u8], indexing: Indexing, dst: &mut Vec<u8>) {
        if let Indexing::Incremental = indexing {
            if let Some((index, true)) = table::static_find(name, value) {
                encode_integer((index + 1) as u64, 0b1000_0000, 7, dst);
                return;
            }
            if let Some((index, true)) = self.dynamic.find(name, value) {
                let full_index = table::STATIC_TABLE_LEN + index;
                encode_integer(full_index as u64, 0b1000_0000, 7, dst);
                return;
            }
        }

        let (prefix, prefix_bits) = match indexing {
            Indexing::Incremental => (0b0100_0000, 6),
            Indexing::WithoutIndexing => (0b0000_0000, 4),
            Indexing::NeverIndexed => (0b0001_0000, 4),
        };

        let name_index = table::static_find(name, value)
            .map(|(i, _)| i + 1)
            .or_else(|| self.dynamic.find(name, value).map(|(i, _)| table::STATIC_TABLE_LEN + i));

        match name_index {
            Some(index) => encode_integer(index as u64, prefix, prefix_bits, dst),
            None => {
                encode_integer(0, prefix, prefix_bits, dst);
                encode_string(name, dst);
            }
        }

        encode_string(value, dst);

        if let Indexing::Incremental = indexing {
            self.dynamic.insert(Bytes::copy_from_slice(name), Bytes::copy_from_slice(value));
        }
    }
}

/// Encodes `value` with an `prefix_bits`-bit prefix ORed onto `prefix_byte`'s high bits.
fn encode_integer(value: u64, prefix_byte: u8, prefix_bits: u32, dst: &mut Vec<u8>) {
    let max_prefix = (1u64 << prefix_bits) - 1;
    if value < max_prefix {
        dst.push(prefix_byte | value as u8);
        return;
    }

    dst.push(prefix_byte | max_prefix as u8);
    let mut remaining = value - max_prefix;
    while remaining >= 0x80 {
        dst.push(((remaining & 0x7f) | 0x80) as u8);
        remaining >>= 7;
    }
    dst.push(remaining as u8);
}

/// Encodes a string literal, preferring Huffman when it is strictly shorter.
fn encode_string(src: &[u8], dst: &mut Vec<u8>) {
    let huffman_len = huffman::encoded_len(src);
    if huffman_len < src.len() {
        encode_integer(huffman_len as u64, 0x80, 7, dst);
        dst.extend_from_slice(&huffman::encode(src));
    } else {
        encode_integer(src.len() as u64, 0x00, 7, dst);
        dst.extend_from_slice(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::Decoder;

    #[test]
    fn reuses_static_table_for_common_pair() {
        let mut encoder = Encoder::new(4096);
        let mut dst = Vec::new();
        encoder.encode(
            std::iter::once((
                Bytes::from_static(b":method"),
                Bytes::from_static(b"GET"),
                Indexing::Incremental,
            )),
            &mut dst,
        );
        assert_eq!(dst, vec![0x82]);
    }

    #[test]
    fn coalesces_two_size_updates() {
        let mut encoder = Encoder::new(4096);
        encoder.set_limit(1024);
        encoder.set_limit(2048);

        let mut dst = Vec::new();
        encoder.encode(
            std::iter::once((
                Bytes::from_static(b"x-a"),
                Bytes::from_static(b"v"),
                Indexing::Incremental,
            )),
            &mut dst,
        );

        // Two size-update prefix bytes (001xxxxx) before the literal representation,
        // each using the multi-byte continuation form since 1024/2048 exceed the
        // 5-bit prefix's maximum value of 31.
        assert_eq!(dst[0] & 0xe0, 0x20);
        assert_eq!(dst[0] & 0x1f, 0x1f);
        assert_eq!(dst[2] & 0xe0, 0x20);
        assert_eq!(dst[2] & 0x1f, 0x1f);
    }

    #[test]
    fn round_trips_through_decoder() {
        let mut encoder = Encoder::new(4096);
        let mut decoder = Decoder::new(4096, 4096);
        let mut dst = Vec::new();
        let pairs = vec![
            (Bytes::from_static(b"x-one"), Bytes::from_static(b"1"), Indexing::Incremental),
            (Bytes::from_static(b"x-one"), Bytes::from_static(b"1"), Indexing::Incremental),
        ];
        encoder.encode(pairs.clone().into_iter(), &mut dst);
        let out = decoder.decode(&dst).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, out[1].name);
        assert_eq!(out[0].value, out[1].value);
    }
}
