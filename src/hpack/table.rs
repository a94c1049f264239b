//! HPACK static and dynamic header tables (§4.2, §9).
//!
//! Grounded on `Atte-http2/src/hpack.rs`'s `Table`/`TableEntry` pair: a fixed static
//! table plus a `VecDeque`-based dynamic table, evicting from the tail and inserting at
//! the head. The per-entry cost formula (`32 + name.len() + value.len()`) and the
//! `limit`/`limit_upper` split (§3's HPACK tables note) are carried over unchanged.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::hpack::HpackError;

pub const STATIC_TABLE_LEN: usize = 61;

#[derive(Debug, Clone)]
pub struct Entry {
    pub name: Bytes,
    pub value: Bytes,
}

impl Entry {
    fn cost(&self) -> usize {
        32 + self.name.len() + self.value.len()
    }
}

macro_rules! static_table {
    ( $( $name:expr => $value:expr ),+ $(,)? ) => {
        [ $( Entry { name: Bytes::from_static($name), value: Bytes::from_static($value) } ),+ ]
    };
}

/// RFC 7541 Appendix A.
static STATIC_TABLE: [Entry; STATIC_TABLE_LEN] = static_table![
    b":authority" => b"",
    b":method" => b"GET",
    b":method" => b"POST",
    b":path" => b"/",
    b":path" => b"/index.html",
    b":scheme" => b"http",
    b":scheme" => b"https",
    b":status" => b"200",
    b":status" => b"204",
    b":status" => b"206",
    b":status" => b"304",
    b":status" => b"400",
    b":status" => b"404",
    b":status" => b"500",
    b"accept-charset" => b"",
    b"accept-encoding" => b"gzip, deflate",
    b"accept-language" => b"",
    b"accept-ranges" => b"",
    b"accept" => b"",
    b"access-control-allow-origin" => b"",
    b"age" => b"",
    b"allow" => b"",
    b"authorization" => b"",
    b"cache-control" => b"",
    b"content-disposition" => b"",
    b"content-encoding" => b"",
    b"content-language" => b"",
    b"content-length" => b"",
    b"content-location" => b"",
    b"content-range" => b"",
    b"content-type" => b"",
    b"cookie" => b"",
    b"date" => b"",
    b"etag" => b"",
    b"expect" => b"",
    b"expires" => b"",
    b"from" => b"",
    b"host" => b"",
    b"if-match" => b"",
    b"if-modified-since" => b"",
    b"if-none-match" => b"",
    b"if-range" => b"",
    b"if-unmodified-since" => b"",
    b"last-modified" => b"",
    b"link" => b"",
    b"location" => b"",
    b"max-forwards" => b"",
    b"proxy-authenticate" => b"",
    b"proxy-authorization" => b"",
    b"range" => b"",
    b"referer" => b"",
    b"refresh" => b"",
    b"retry-after" => b"",
    b"server" => b"",
    b"set-cookie" => b"",
    b"strict-transport-security" => b"",
    b"transfer-encoding" => b"",
    b"user-agent" => b"",
    b"vary" => b"",
    b"via" => b"",
    b"www-authenticate" => b"",
];

pub fn static_entry(index: usize) -> Option<&'static Entry> {
    STATIC_TABLE.get(index)
}

/// Searches the static table for a full (name, value) or name-only match.
///
/// Returns `(index, exact)`, 0-based into the static table, preferring the first
/// exact match and otherwise the first name-only match.
pub fn static_find(name: &[u8], value: &[u8]) -> Option<(usize, bool)> {
    let mut name_only = None;
    for (i, e) in STATIC_TABLE.iter().enumerate() {
        if e.name == name {
            if e.value == value {
                return Some((i, true));
            }
            if name_only.is_none() {
                name_only = Some((i, false));
            }
        }
    }
    name_only
}

/// The evolving dynamic table shared by a HPACK encoder or decoder.
#[derive(Debug)]
pub struct DynamicTable {
    entries: VecDeque<Entry>,
    size: usize,
    limit: usize,
    limit_upper: usize,
}

impl DynamicTable {
    pub fn new(limit_upper: usize) -> DynamicTable {
        DynamicTable { entries: VecDeque::new(), size: 0, limit: limit_upper, limit_upper }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn limit_upper(&self) -> usize {
        self.limit_upper
    }

    pub fn set_limit_upper(&mut self, limit_upper: usize) {
        self.limit_upper = limit_upper;
        if self.limit > limit_upper {
            self.resize(limit_upper);
        }
    }

    /// Applies a size-update instruction. Fails if `new_limit` exceeds `limit_upper`.
    pub fn apply_size_update(&mut self, new_limit: usize) -> Result<(), HpackError> {
        if new_limit > self.limit_upper {
            return Err(HpackError::InvalidTableSizeUpdate);
        }
        self.resize(new_limit);
        Ok(())
    }

    fn resize(&mut self, new_limit: usize) {
        self.limit = new_limit;
        self.evict_to_fit();
    }

    fn evict_to_fit(&mut self) {
        while self.size > self.limit {
            match self.entries.pop_back() {
                Some(e) => self.size -= e.cost(),
                None => break,
            }
        }
    }

    /// Inserts a new entry at the front, evicting from the back as needed.
    pub fn insert(&mut self, name: Bytes, value: Bytes) {
        let entry = Entry { name, value };
        self.size += entry.cost();
        self.entries.push_front(entry);
        self.evict_to_fit();
    }

    /// Clears the table entirely (used when the limit is temporarily dropped to 0
    /// and restored, per §4.2's eviction note).
    pub fn clear(&mut self) {
        let restore = self.limit;
        self.limit = 0;
        self.evict_to_fit();
        self.limit = restore;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 1-based dynamic-table-relative lookup (index 1 is most recently inserted).
    pub fn get(&self, dynamic_index: usize) -> Option<&Entry> {
        if dynamic_index == 0 {
            return None;
        }
        self.entries.get(dynamic_index - 1)
    }

    /// Searches the dynamic table for a full or name-only match, returning a
    /// 1-based dynamic index.
    pub fn find(&self, name: &[u8], value: &[u8]) -> Option<(usize, bool)> {
        let mut name_only = None;
        for (i, e) in self.entries.iter().enumerate() {
            if e.name == name {
                if e.value == value {
                    return Some((i + 1, true));
                }
                if name_only.is_none() {
                    name_only = Some((i + 1, false));
                }
            }
        }
        name_only
    }
}

/// Resolves a full HPACK index (1-based, static table first) to an entry, searching
/// the static table then the dynamic table.
pub fn resolve(index: usize, dynamic: &DynamicTable) -> Option<Entry> {
    if index == 0 {
        return None;
    }
    if index <= STATIC_TABLE_LEN {
        return static_entry(index - 1).cloned();
    }
    dynamic.get(index - STATIC_TABLE_LEN).cloned()
}
