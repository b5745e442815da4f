// input.rs - Linear string views handed to the matcher.
//
// Strings are sequences of code units, either narrow (Latin-1, one byte per
// unit) or wide (UTF-16). All offsets are code-unit indices.

/// Character width of an input string; selects a compiled-code slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CharWidth {
    Latin1,
    TwoByte,
}

impl CharWidth {
    pub(crate) fn index(self) -> usize {
        match self {
            CharWidth::Latin1 => 0,
            CharWidth::TwoByte => 1,
        }
    }
}

/// A code unit the matcher can run over.
pub trait CodeUnit: Copy + Eq + 'static {
    /// Largest value representable by this unit.
    const MAX: u32;

    fn to_u32(self) -> u32;

    /// Index of the first unit equal to `needle`.
    fn find_unit(haystack: &[Self], needle: u32) -> Option<usize>;
}

impl CodeUnit for u8 {
    const MAX: u32 = 0xFF;

    #[inline]
    fn to_u32(self) -> u32 {
        self as u32
    }

    #[inline]
    fn find_unit(haystack: &[u8], needle: u32) -> Option<usize> {
        if needle > <u8 as CodeUnit>::MAX {
            return None;
        }
        memchr::memchr(needle as u8, haystack)
    }
}

impl CodeUnit for u16 {
    const MAX: u32 = 0xFFFF;

    #[inline]
    fn to_u32(self) -> u32 {
        self as u32
    }

    fn find_unit(haystack: &[u16], needle: u32) -> Option<usize> {
        haystack.iter().position(|&u| u as u32 == needle)
    }
}

/// Borrowed linear string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Chars<'a> {
    Latin1(&'a [u8]),
    TwoByte(&'a [u16]),
}

impl<'a> Chars<'a> {
    pub fn len(&self) -> usize {
        match self {
            Chars::Latin1(s) => s.len(),
            Chars::TwoByte(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> CharWidth {
        match self {
            Chars::Latin1(_) => CharWidth::Latin1,
            Chars::TwoByte(_) => CharWidth::TwoByte,
        }
    }

    /// Code unit at `i` widened to `u32`.
    pub fn unit_at(&self, i: usize) -> u32 {
        match self {
            Chars::Latin1(s) => s[i] as u32,
            Chars::TwoByte(s) => s[i] as u32,
        }
    }

    /// View starting at `offset`. Used for sticky displacement.
    pub fn slice_from(&self, offset: usize) -> Chars<'a> {
        match *self {
            Chars::Latin1(s) => Chars::Latin1(&s[offset..]),
            Chars::TwoByte(s) => Chars::TwoByte(&s[offset..]),
        }
    }

    /// Decode the range `start..end` into a `String`. Unpaired surrogates
    /// become U+FFFD.
    pub fn to_string_lossy(&self, start: usize, end: usize) -> String {
        match self {
            Chars::Latin1(s) => s[start..end].iter().map(|&b| b as char).collect(),
            Chars::TwoByte(s) => String::from_utf16_lossy(&s[start..end]),
        }
    }

    pub fn to_owned_string(&self) -> LinearString {
        match self {
            Chars::Latin1(s) => LinearString::Latin1(s.to_vec()),
            Chars::TwoByte(s) => LinearString::TwoByte(s.to_vec()),
        }
    }
}

/// Owned linear string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinearString {
    Latin1(Vec<u8>),
    TwoByte(Vec<u16>),
}

impl LinearString {
    pub fn chars(&self) -> Chars<'_> {
        match self {
            LinearString::Latin1(v) => Chars::Latin1(v),
            LinearString::TwoByte(v) => Chars::TwoByte(v),
        }
    }

    pub fn len(&self) -> usize {
        self.chars().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force the wide representation, regardless of content.
    pub fn from_str_two_byte(s: &str) -> LinearString {
        LinearString::TwoByte(s.encode_utf16().collect())
    }
}

impl From<&str> for LinearString {
    fn from(s: &str) -> Self {
        if s.chars().all(|c| (c as u32) <= 0xFF) {
            LinearString::Latin1(s.chars().map(|c| c as u8).collect())
        } else {
            LinearString::TwoByte(s.encode_utf16().collect())
        }
    }
}

impl From<String> for LinearString {
    fn from(s: String) -> Self {
        LinearString::from(s.as_str())
    }
}
