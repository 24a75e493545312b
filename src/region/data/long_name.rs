use super::entry::Attributes;
use crate::endian::{Little as LE, Plain};
use crate::tree::shortname::ShortName;

pub(crate) const CHARS_PER_ENTRY: usize = 13;
pub(crate) const LAST_ENTRY: u8 = 0x40;

#[derive(Copy, Clone, Debug, Default)]
#[repr(C, packed(1))]
pub(crate) struct LongNameEntry {
    pub sequence: u8,
    pub name1: [LE<u16>; 5],
    pub attributes: u8,
    pub kind: u8,
    pub checksum: u8,
    pub name2: [LE<u16>; 6],
    _cluster: LE<u16>,
    pub name3: [LE<u16>; 2],
}

unsafe impl Plain for LongNameEntry {}

impl LongNameEntry {
    pub fn new(sequence: u8, checksum: u8, chars: &[u16; CHARS_PER_ENTRY]) -> Self {
        let mut name1 = [LE::default(); 5];
        let mut name2 = [LE::default(); 6];
        let mut name3 = [LE::default(); 2];
        let fields = name1.iter_mut().chain(name2.iter_mut()).chain(name3.iter_mut());
        fields.zip(chars.iter()).for_each(|(field, &c)| *field = c.into());
        Self {
            sequence,
            name1,
            attributes: Attributes::LONG_NAME.into(),
            checksum,
            name2,
            name3,
            ..Default::default()
        }
    }

    pub fn chars(&self) -> [u16; CHARS_PER_ENTRY] {
        let (name1, name2, name3) = (self.name1, self.name2, self.name3);
        let mut chars = [0u16; CHARS_PER_ENTRY];
        let fields = name1.iter().chain(name2.iter()).chain(name3.iter());
        chars.iter_mut().zip(fields).for_each(|(c, field)| *c = field.get());
        chars
    }

    /// 1-based position of this entry's chunk inside the name
    pub fn order(&self) -> u8 {
        self.sequence & !LAST_ENTRY
    }
}

#[derive(Default, Debug)]
pub(crate) struct Checksum(u8);

impl Checksum {
    pub fn write(&mut self, bytes: &[u8]) {
        let mut sum = self.0;
        for &b in bytes.iter() {
            sum = sum.rotate_right(1).wrapping_add(b);
        }
        self.0 = sum;
    }

    pub fn sum(&self) -> u8 {
        self.0
    }
}

pub(crate) fn checksum(short_name: &ShortName) -> u8 {
    let mut checksum = Checksum::default();
    checksum.write(&short_name.bytes());
    checksum.sum()
}

/// Long name entry at `position` (0 is the first emitted) of a chain for `name`
pub(crate) fn entry(name: &[u16], count: u8, position: u8, checksum: u8) -> LongNameEntry {
    let sequence = count - position;
    let start = (sequence as usize - 1) * CHARS_PER_ENTRY;
    let mut chars = [0u16; CHARS_PER_ENTRY];
    let chunk = name.get(start..).unwrap_or_default();
    chars.iter_mut().zip(chunk).for_each(|(c, &unit)| *c = unit);
    let flag = if position == 0 { LAST_ENTRY } else { 0 };
    LongNameEntry::new(sequence | flag, checksum, &chars)
}

#[cfg(test)]
mod test {
    use core::mem::size_of;

    use memoffset::offset_of;

    use super::{checksum, entry, LongNameEntry};
    use crate::endian::Plain;
    use crate::tree::shortname::ShortName;

    #[test]
    fn test_layout() {
        assert_eq!(size_of::<LongNameEntry>(), 32);
        assert_eq!(offset_of!(LongNameEntry, attributes), 11);
        assert_eq!(offset_of!(LongNameEntry, checksum), 13);
        assert_eq!(offset_of!(LongNameEntry, name2), 14);
        assert_eq!(offset_of!(LongNameEntry, name3), 28);
    }

    #[test]
    fn test_checksum() {
        let short_name = ShortName::parse("SUBDIR~1").unwrap();
        let mut sum = 0u8;
        for &b in short_name.bytes().iter() {
            sum = ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(b);
        }
        assert_eq!(checksum(&short_name), sum);
    }

    #[test]
    fn test_entry_chars() {
        let name: Vec<u16> = "subdirectory_withlongname".encode_utf16().collect();
        let first = entry(&name, 2, 0, 0x5A);
        let bytes = first.as_bytes();
        assert_eq!(bytes[0], 0x42);
        assert_eq!(bytes[11], 0x0F);
        assert_eq!(bytes[12], 0);
        assert_eq!(bytes[13], 0x5A);
        assert_eq!(bytes[26..28], [0u8, 0]);
        let offsets = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
        let expected: Vec<u16> = "withlongname".encode_utf16().chain([0]).collect();
        for (&offset, &unit) in offsets.iter().zip(expected.iter()) {
            assert_eq!(u16::from_le_bytes([bytes[offset], bytes[offset + 1]]), unit);
        }

        let second = entry(&name, 2, 1, 0x5A);
        assert_eq!(second.sequence, 0x01);
        let expected: Vec<u16> = "subdirectory_".encode_utf16().collect();
        assert_eq!(second.chars().to_vec(), expected);
        assert_eq!(LongNameEntry::from_bytes(second.as_bytes()).order(), 1);
    }
}
