// regflags.rs - Pattern flag bitset.
//
// Parsing of flag strings (`"gimy"`) into `RegExpFlag` and the canonical
// textual rendering used by `/source/flags`.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::error::RegexError;

bitflags! {
    /// Flags attached to a pattern. Any combination is valid.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RegExpFlag: u32 {
        const IGNORE_CASE = 0x01;
        const GLOBAL = 0x02;
        const MULTILINE = 0x04;
        const STICKY = 0x08;
    }
}

/// Rendering order of flag letters.
const FLAG_LETTERS: [(RegExpFlag, char); 4] = [
    (RegExpFlag::GLOBAL, 'g'),
    (RegExpFlag::IGNORE_CASE, 'i'),
    (RegExpFlag::MULTILINE, 'm'),
    (RegExpFlag::STICKY, 'y'),
];

impl RegExpFlag {
    #[inline]
    pub fn ignore_case(self) -> bool {
        self.contains(RegExpFlag::IGNORE_CASE)
    }

    #[inline]
    pub fn global(self) -> bool {
        self.contains(RegExpFlag::GLOBAL)
    }

    #[inline]
    pub fn multiline(self) -> bool {
        self.contains(RegExpFlag::MULTILINE)
    }

    #[inline]
    pub fn sticky(self) -> bool {
        self.contains(RegExpFlag::STICKY)
    }

    /// Map a single flag letter to its bit.
    pub fn from_letter(c: char) -> Option<RegExpFlag> {
        FLAG_LETTERS
            .iter()
            .find(|(_, letter)| *letter == c)
            .map(|(flag, _)| *flag)
    }

    /// Decode a serialized flag word. Bits outside the four known flags are
    /// rejected rather than truncated.
    pub fn from_word(word: u32) -> Result<RegExpFlag, RegexError> {
        RegExpFlag::from_bits(word).ok_or(RegexError::InvalidArgument("unknown flag bits"))
    }
}

/// Parse a sequence of flag letters.
///
/// The empty string is valid and yields no flags. An unknown letter fails
/// with `InvalidFlag`, a repeated one with `DuplicateFlag`; both report the
/// offending character.
pub fn parse_regexp_flags(flags: &str) -> Result<RegExpFlag, RegexError> {
    let mut out = RegExpFlag::empty();
    for c in flags.chars() {
        let flag = RegExpFlag::from_letter(c).ok_or(RegexError::InvalidFlag(c))?;
        if out.contains(flag) {
            return Err(RegexError::DuplicateFlag(c));
        }
        out |= flag;
    }
    Ok(out)
}

impl FromStr for RegExpFlag {
    type Err = RegexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_regexp_flags(s)
    }
}

impl fmt::Display for RegExpFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (flag, letter) in FLAG_LETTERS {
            if self.contains(flag) {
                write!(f, "{}", letter)?;
            }
        }
        Ok(())
    }
}

/// Textual round-trip form of a pattern: `/source/flags`.
pub fn regexp_to_string(source: &str, flags: RegExpFlag) -> String {
    let mut out = String::with_capacity(source.len() + 6);
    if source.is_empty() {
        out.push_str("/(?:)/");
    } else {
        out.push('/');
        out.push_str(source);
        out.push('/');
    }
    out.push_str(&flags.to_string());
    out
}
