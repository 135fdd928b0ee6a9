//! RPM lead + header encoding, spec §4.5.
//!
//! Nothing in the `tar`/`ar`/cpio ecosystem speaks RPM's header format, so
//! this is hand-rolled from the on-wire layout: an 8-byte magic, a
//! big-endian `(count, size)` pair, `count` 16-byte index entries
//! (`tag, type, offset, num_items`), and a data store holding each entry's
//! encoded value at its recorded offset. A terminal "region" entry is
//! appended so a reader can find the start of this header's own index
//! from the trailing bytes alone, mirroring real RPM's self-describing
//! header region.

pub mod tags;

use std::io::Write;

const HEADER_MAGIC: [u8; 8] = [0x8e, 0xad, 0xe8, 0x01, 0x00, 0x00, 0x00, 0x00];
const LEAD_MAGIC: [u8; 4] = [0xed, 0xab, 0xee, 0xdb];

/// RPM header entry type codes (`rpmTagType`).
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
enum TypeCode {
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    String = 6,
    Bin = 7,
    StringArray = 8,
}

/// One tag's value, in the shapes the immutable/signature headers need.
#[derive(Debug, Clone)]
pub enum TagValue {
    /// A single nul-terminated string.
    Str(String),
    /// A single `i32`.
    Int32(i32),
    /// Several `i32`s (a parallel array column).
    Int32Array(Vec<i32>),
    /// Several `u16`s, e.g. file modes.
    Int16Array(Vec<u16>),
    /// Raw bytes, not nul-terminated.
    Bin(Vec<u8>),
    /// Several nul-terminated strings, stored back-to-back.
    StringArray(Vec<String>),
}

impl TagValue {
    fn type_code(&self) -> u32 {
        (match self {
            TagValue::Str(_) => TypeCode::String,
            TagValue::Int32(_) | TagValue::Int32Array(_) => TypeCode::Int32,
            TagValue::Int16Array(_) => TypeCode::Int16,
            TagValue::Bin(_) => TypeCode::Bin,
            TagValue::StringArray(_) => TypeCode::StringArray,
        }) as u32
    }

    fn item_count(&self) -> u32 {
        match self {
            TagValue::Str(_) | TagValue::Int32(_) => 1,
            TagValue::Int32Array(v) => v.len() as u32,
            TagValue::Int16Array(v) => v.len() as u32,
            TagValue::Bin(v) => v.len() as u32,
            TagValue::StringArray(v) => v.len() as u32,
        }
    }

    fn alignment(&self) -> usize {
        match self {
            TagValue::Int16Array(_) => 2,
            TagValue::Int32(_) | TagValue::Int32Array(_) => 4,
            _ => 1,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            TagValue::Str(s) => {
                out.extend_from_slice(s.as_bytes());
                out.push(0);
            }
            TagValue::Int32(v) => out.extend_from_slice(&v.to_be_bytes()),
            TagValue::Int32Array(items) => {
                for v in items {
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            TagValue::Int16Array(items) => {
                for v in items {
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            TagValue::Bin(bytes) => out.extend_from_slice(bytes),
            TagValue::StringArray(items) => {
                for s in items {
                    out.extend_from_slice(s.as_bytes());
                    out.push(0);
                }
            }
        }
    }
}

/// Builds one RPM header section (signature or immutable).
pub struct HeaderBuilder {
    region_tag: u32,
    entries: Vec<(u32, TagValue)>,
}

impl HeaderBuilder {
    /// Start a new header whose self-describing region entry is tagged
    /// `region_tag` (`tags::HEADER_SIGNATURES` or `tags::HEADER_IMMUTABLE`).
    pub fn new(region_tag: u32) -> Self {
        HeaderBuilder {
            region_tag,
            entries: Vec::new(),
        }
    }

    /// Add one tag/value pair. Entries are laid out in the data store in
    /// the order they're pushed.
    pub fn push(&mut self, tag: u32, value: TagValue) {
        self.entries.push((tag, value));
    }

    /// Encode the full header: magic, `(count, size)`, index, data store.
    pub fn build(&self) -> Vec<u8> {
        let mut store = Vec::new();
        let mut index: Vec<(u32, u32, u32, u32)> = Vec::new();

        for (tag, value) in &self.entries {
            let align = value.alignment();
            while store.len() % align != 0 {
                store.push(0);
            }
            let offset = store.len() as u32;
            value.encode_into(&mut store);
            index.push((*tag, value.type_code(), offset, value.item_count()));
        }

        let region_offset = store.len() as u32;
        let region_trailer = region_trailer_bytes(self.region_tag, index.len() as i32);
        store.extend_from_slice(&region_trailer);

        let mut full_index = Vec::with_capacity(index.len() + 1);
        full_index.push((self.region_tag, TypeCode::Bin as u32, region_offset, 16u32));
        full_index.extend(index);

        let mut out = Vec::new();
        out.extend_from_slice(&HEADER_MAGIC);
        out.extend_from_slice(&(full_index.len() as u32).to_be_bytes());
        out.extend_from_slice(&(store.len() as u32).to_be_bytes());
        for (tag, type_code, offset, count) in &full_index {
            out.extend_from_slice(&tag.to_be_bytes());
            out.extend_from_slice(&type_code.to_be_bytes());
            out.extend_from_slice(&offset.to_be_bytes());
            out.extend_from_slice(&count.to_be_bytes());
        }
        out.extend_from_slice(&store);
        out
    }
}

/// The 16-byte value of the region tag itself: `{tag, type, offset, count}`
/// with `offset` carrying the negative byte span of the `entry_count`
/// non-region entries, the convention real RPM readers use to locate the
/// start of the index from the tail of the data store.
fn region_trailer_bytes(region_tag: u32, entry_count: i32) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..4].copy_from_slice(&region_tag.to_be_bytes());
    out[4..8].copy_from_slice(&(TypeCode::Bin as u32).to_be_bytes());
    out[8..12].copy_from_slice(&(-(entry_count * 16)).to_be_bytes());
    out[12..16].copy_from_slice(&16u32.to_be_bytes());
    out
}

/// Write the 96-byte RPM lead.
pub fn write_lead(out: &mut impl Write, name: &str) -> std::io::Result<()> {
    let mut lead = [0u8; 96];
    lead[0..4].copy_from_slice(&LEAD_MAGIC);
    lead[4] = 3; // major
    lead[5] = 0; // minor
    lead[6..8].copy_from_slice(&1u16.to_be_bytes()); // type: binary
    lead[8..10].copy_from_slice(&1u16.to_be_bytes()); // archnum: x86 placeholder, informational only
    let name_bytes = name.as_bytes();
    let n = name_bytes.len().min(65);
    lead[10..10 + n].copy_from_slice(&name_bytes[..n]);
    lead[76..78].copy_from_slice(&1u16.to_be_bytes()); // osnum: Linux
    lead[78..80].copy_from_slice(&5u16.to_be_bytes()); // signature type: HEADERSIG
    out.write_all(&lead)
}

/// Pad `len` up to the next multiple of 8, per the spec's "signature-header
/// data is padded to 8-byte alignment" rule.
pub fn pad8(out: &mut Vec<u8>) {
    while out.len() % 8 != 0 {
        out.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_magic_and_counts() {
        let mut h = HeaderBuilder::new(tags::HEADER_IMMUTABLE);
        h.push(tags::NAME, TagValue::Str("hello".to_string()));
        h.push(tags::EPOCH, TagValue::Int32(0));
        let bytes = h.build();
        assert_eq!(&bytes[0..8], &HEADER_MAGIC);
        let count = u32::from_be_bytes(bytes[8..12].try_into().unwrap());
        // two real entries + the region entry
        assert_eq!(count, 3);
    }

    #[test]
    fn lead_has_correct_magic_and_length() {
        let mut buf = Vec::new();
        write_lead(&mut buf, "hello").unwrap();
        assert_eq!(buf.len(), 96);
        assert_eq!(&buf[0..4], &LEAD_MAGIC);
    }
}
