use core::fmt::{self, Write};

use crate::error::Error;

const MAX_TAIL: u32 = 999_999;

/// Map a long name character onto the 8.3 character set, `None` drops it
pub(crate) fn dos_char(c: char) -> Option<u8> {
    match c {
        ' ' => None,
        '+' | ',' | ';' | '=' | '[' | ']' | '"' | '/' | '.' => Some(b'_'),
        c if c.is_ascii() && !c.is_ascii_control() => Some(c.to_ascii_uppercase() as u8),
        _ => Some(b'_'),
    }
}

/// Volume label as stored in boot sector and label entry
pub(crate) fn label_bytes(label: Option<&str>) -> [u8; 11] {
    let mut bytes = [b' '; 11];
    match label {
        Some(label) => {
            let chars = label.chars().filter_map(dos_char);
            bytes.iter_mut().zip(chars).for_each(|(byte, c)| *byte = c);
        }
        None => bytes.copy_from_slice(b"NO NAME    "),
    }
    bytes
}

/// Space padded 8.3 name
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ShortName {
    name: [u8; 8],
    extension: [u8; 3],
}

impl Default for ShortName {
    fn default() -> Self {
        Self { name: [b' '; 8], extension: [b' '; 3] }
    }
}

fn trimmed(bytes: &[u8]) -> &str {
    let length = bytes.iter().rposition(|&b| b != b' ').map_or(0, |position| position + 1);
    core::str::from_utf8(&bytes[..length]).unwrap_or_default()
}

impl ShortName {
    pub(crate) const DOT: Self = Self { name: *b".       ", extension: *b"   " };
    pub(crate) const DOTDOT: Self = Self { name: *b"..      ", extension: *b"   " };

    fn new(base: &[u8], extension: &[u8]) -> Self {
        let mut short_name = Self::default();
        short_name.name[..base.len()].copy_from_slice(base);
        short_name.extension[..extension.len()].copy_from_slice(extension);
        short_name
    }

    /// Parse an explicit 8.3 name such as `README.TXT`, case is folded to upper
    pub fn parse(name: &str) -> Result<Self, Error> {
        let (base, extension) = name.split_once('.').unwrap_or((name, ""));
        if base.is_empty() || base.len() > 8 || extension.len() > 3 || name.ends_with('.') {
            return Err(Error::InvalidArgument("not an 8.3 name"));
        }
        let valid = |c: char| c.is_ascii() && dos_char(c) == Some(c.to_ascii_uppercase() as u8);
        if !base.chars().chain(extension.chars()).all(valid) {
            return Err(Error::InvalidArgument("invalid character in 8.3 name"));
        }
        let base = base.to_ascii_uppercase();
        let extension = extension.to_ascii_uppercase();
        Ok(Self::new(base.as_bytes(), extension.as_bytes()))
    }

    pub fn bytes(&self) -> [u8; 11] {
        let mut bytes = [0u8; 11];
        bytes[..8].copy_from_slice(&self.name);
        bytes[8..].copy_from_slice(&self.extension);
        bytes
    }

    pub(crate) fn from_bytes(bytes: &[u8; 11]) -> Self {
        let mut short_name = Self::default();
        short_name.name.copy_from_slice(&bytes[..8]);
        short_name.extension.copy_from_slice(&bytes[8..]);
        short_name
    }

    pub fn base(&self) -> &str {
        trimmed(&self.name)
    }

    pub fn extension(&self) -> &str {
        trimmed(&self.extension)
    }

    /// `NAME.EXT` form
    pub fn as_string(&self) -> heapless::String<12> {
        let mut string = heapless::String::new();
        let _ = write!(string, "{}", self);
        string
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        self.as_string().eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.extension() {
            "" => write!(f, "{}", self.base()),
            extension => write!(f, "{}.{}", self.base(), extension),
        }
    }
}

/// Derive the short name of `name`, `taken` tells whether a candidate is used by a sibling.
///
/// Returns the short name and whether `name` needs long name entries.
pub(crate) fn synthesize<F>(name: &str, taken: F) -> Result<(ShortName, bool), Error>
where
    F: Fn(&ShortName) -> bool,
{
    let (base, extension) = match name.rfind('.') {
        None | Some(0) => (name, None),
        Some(index) => (&name[..index], Some(&name[index + 1..])),
    };
    let mut stem: heapless::Vec<u8, 8> = heapless::Vec::new();
    for byte in base.chars().take(8).filter_map(dos_char) {
        let _ = stem.push(byte);
    }
    if stem.is_empty() {
        let _ = stem.push(b'_');
    }
    let mut suffix: heapless::Vec<u8, 3> = heapless::Vec::new();
    for byte in extension.unwrap_or_default().chars().take(3).filter_map(dos_char) {
        let _ = suffix.push(byte);
    }

    let plain = ShortName::new(&stem, &suffix);
    let mut verbatim: heapless::Vec<u8, 12> = heapless::Vec::new();
    let _ = verbatim.extend_from_slice(&stem);
    if extension.is_some() {
        let _ = verbatim.push(b'.');
        let _ = verbatim.extend_from_slice(&suffix);
    }
    let collides = taken(&plain);
    if verbatim.as_slice() == name.as_bytes() && !collides {
        return Ok((plain, false));
    }
    if stem.len() <= 6 && !collides {
        return Ok((plain, true));
    }

    for n in 1..=MAX_TAIL {
        let mut tail: heapless::String<8> = heapless::String::new();
        let _ = write!(tail, "~{}", n);
        let keep = core::cmp::min(stem.len(), 8 - tail.len());
        let mut base: heapless::Vec<u8, 8> = heapless::Vec::new();
        let _ = base.extend_from_slice(&stem[..keep]);
        let _ = base.extend_from_slice(tail.as_bytes());
        let candidate = ShortName::new(&base, &suffix);
        if !taken(&candidate) {
            trace!("Short name of {} is {}", name, candidate);
            return Ok((candidate, true));
        }
    }
    Err(Error::ShortNameExhausted)
}
