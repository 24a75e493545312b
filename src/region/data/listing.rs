use super::entry::{Attributes, ShortEntry, Timestamp};
use super::long_name::{self, LongNameEntry, CHARS_PER_ENTRY, LAST_ENTRY};
use crate::endian::Plain;
use crate::tree::shortname::ShortName;
use crate::types::ClusterID;

const END_OF_DIRECTORY: u8 = 0x00;
const DELETED: u8 = 0xE5;

/// One decoded directory entry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Listing {
    /// Long name when a valid chain precedes the entry, otherwise the 8.3 name
    pub name: String,
    pub short_name: ShortName,
    pub attributes: Attributes,
    pub cluster: ClusterID,
    pub size: u32,
    pub modified: Timestamp,
}

#[derive(Default)]
struct Chain {
    chars: Vec<u16>,
    expected: u8,
    checksum: u8,
}

impl Chain {
    fn push(&mut self, entry: &LongNameEntry) {
        let order = entry.order();
        if entry.sequence & LAST_ENTRY != 0 {
            self.chars = vec![0; order as usize * CHARS_PER_ENTRY];
            self.expected = order;
            self.checksum = entry.checksum;
        }
        if order == 0 || order != self.expected || entry.checksum != self.checksum {
            // Broken chain, the short name is used instead
            self.chars.clear();
            self.expected = 0;
            return;
        }
        let start = (order as usize - 1) * CHARS_PER_ENTRY;
        self.chars[start..start + CHARS_PER_ENTRY].copy_from_slice(&entry.chars());
        self.expected = order - 1;
    }

    fn take(&mut self, short_name: &ShortName) -> Option<String> {
        let complete = !self.chars.is_empty() && self.expected == 0;
        let chars = core::mem::take(&mut self.chars);
        if !complete || long_name::checksum(short_name) != self.checksum {
            return None;
        }
        let length = chars.iter().position(|&c| c == 0 || c == 0xFFFF).unwrap_or(chars.len());
        String::from_utf16(&chars[..length]).ok()
    }
}

/// Decode raw directory table bytes, stopping at the end-of-directory marker
pub fn parse_directory(bytes: &[u8]) -> Vec<Listing> {
    let mut listings = Vec::new();
    let mut chain = Chain::default();
    for raw in bytes.chunks_exact(32) {
        match raw[0] {
            END_OF_DIRECTORY => break,
            DELETED => continue,
            _ => (),
        }
        if raw[11] == u8::from(Attributes::LONG_NAME) {
            chain.push(&LongNameEntry::from_bytes(raw));
            continue;
        }
        let entry = ShortEntry::from_bytes(raw);
        let short_name = ShortName::from_bytes(&entry.name);
        let name = chain.take(&short_name).unwrap_or_else(|| short_name.to_string());
        listings.push(Listing {
            name,
            short_name,
            attributes: Attributes::from(entry.attributes),
            cluster: entry.cluster(),
            size: entry.size.get(),
            modified: entry.modified(),
        });
    }
    listings
}
