//! HPACK decoding (§4.2).

use bytes::Bytes;

use crate::hpack::{huffman, table, DecodedHeader, DynamicTable, HpackError};

/// Decodes HPACK-encoded header blocks against a persistent dynamic table.
#[derive(Debug)]
pub struct Decoder {
    dynamic: DynamicTable,
    max_headers: usize,
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Cursor<'a> {
        Cursor { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn peek(&self) -> Result<u8, HpackError> {
        self.buf.get(self.pos).copied().ok_or(HpackError::TruncatedInteger)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], HpackError> {
        if self.remaining() < n {
            return Err(HpackError::TruncatedString);
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn take_one(&mut self) -> Result<u8, HpackError> {
        let b = self.peek()?;
        self.pos += 1;
        Ok(b)
    }

    /// Decodes an HPACK integer with an `prefix_bits`-bit prefix already masked out of
    /// `first`. §4.2: continuation bytes contribute 7 bits each, high bit = more-follows.
    fn decode_integer(&mut self, first_masked: u8, prefix_bits: u32) -> Result<u64, HpackError> {
        let max_prefix = (1u64 << prefix_bits) - 1;
        let mut value = first_masked as u64;
        if value < max_prefix {
            return Ok(value);
        }

        let mut shift = 0u32;
        loop {
            let b = self.take_one()?;
            let more = b & 0x80 != 0;
            let payload = (b & 0x7f) as u64;
            value = value
                .checked_add(payload.checked_shl(shift).ok_or(HpackError::IntegerOverflow)?)
                .ok_or(HpackError::IntegerOverflow)?;
            if !more {
                break;
            }
            shift += 7;
            if shift > 63 {
                return Err(HpackError::IntegerOverflow);
            }
        }
        Ok(value)
    }

    /// Decodes a string literal: 1-bit Huffman flag, 7-bit-prefixed length, then bytes.
    fn decode_string(&mut self) -> Result<Bytes, HpackError> {
        let first = self.peek()?;
        let huffman_flag = first & 0x80 != 0;
        self.pos += 1;
        let len = self.decode_integer(first & 0x7f, 7)? as usize;
        let raw = self.take(len)?;

        if huffman_flag {
            Ok(Bytes::from(huffman::decode(raw)?))
        } else {
            Ok(Bytes::copy_from_slice(raw))
        }
    }
}

impl Decoder {
    pub fn new(dynamic_table_limit: usize, limit_upper: usize) -> Decoder {
        Decoder { dynamic: DynamicTable::new(limit_upper.max(dynamic_table_limit)), max_headers: 64 }
    }

    pub fn with_max_headers(mut self, max_headers: usize) -> Decoder {
        self.max_headers = max_headers;
        self
    }

    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.dynamic
    }

    pub fn set_limit_upper(&mut self, limit_upper: usize) {
        self.dynamic.set_limit_upper(limit_upper);
    }

    /// Decodes an entire header block fragment into a flat list of headers.
    ///
    /// A header produced solely by a dynamic-table-size-update (no name/value) is not
    /// appended to the output, per §4.2.
    pub fn decode(&mut self, src: &[u8]) -> Result<Vec<DecodedHeader>, HpackError> {
        let mut cursor = Cursor::new(src);
        let mut out = Vec::new();

        while cursor.remaining() > 0 {
            let first = cursor.peek()?;

            if first & 0x80 != 0 {
                // Indexed header field.
                cursor.pos += 1;
                let index = cursor.decode_integer(first & 0x7f, 7)? as usize;
                if index == 0 {
                    return Err(HpackError::InvalidIndex);
                }
                let entry = table::resolve(index, &self.dynamic).ok_or(HpackError::InvalidIndex)?;
                out.push(DecodedHeader { name: entry.name, value: entry.value, never_indexed: false });
            } else if first & 0x40 != 0 {
                // Literal with incremental indexing, 6-bit prefix.
                cursor.pos += 1;
                let index = cursor.decode_integer(first & 0x3f, 6)? as usize;
                let (name, value) = self.read_name_value(&mut cursor, index)?;
                self.dynamic.insert(name.clone(), value.clone());
                out.push(DecodedHeader { name, value, never_indexed: false });
            } else if first & 0x20 != 0 {
                // Dynamic table size update, 5-bit prefix.
                cursor.pos += 1;
                let new_limit = cursor.decode_integer(first & 0x1f, 5)? as usize;
                self.dynamic.apply_size_update(new_limit)?;
            } else if first & 0x10 != 0 {
                // Literal never indexed, 4-bit prefix.
                cursor.pos += 1;
                let index = cursor.decode_integer(first & 0x0f, 4)? as usize;
                let (name, value) = self.read_name_value(&mut cursor, index)?;
                out.push(DecodedHeader { name, value, never_indexed: true });
            } else {
                // Literal without indexing, 4-bit prefix (top nibble 0000).
                cursor.pos += 1;
                let index = cursor.decode_integer(first & 0x0f, 4)? as usize;
                let (name, value) = self.read_name_value(&mut cursor, index)?;
                out.push(DecodedHeader { name, value, never_indexed: false });
            }

            if out.len() > self.max_headers {
                return Err(HpackError::InvalidRepresentation);
            }
        }

        Ok(out)
    }

    fn read_name_value(&self, cursor: &mut Cursor, index: usize) -> Result<(Bytes, Bytes), HpackError> {
        let name = if index == 0 {
            cursor.decode_string()?
        } else {
            table::resolve(index, &self.dynamic).ok_or(HpackError::InvalidIndex)?.name
        };
        let value = cursor.decode_string()?;
        Ok((name, value))
    }
}
