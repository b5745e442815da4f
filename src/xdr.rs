// xdr.rs - Pattern serialization.
//
// Wire form: u32 LE byte length, UTF-8 source bytes, u32 LE flag word.
// Decoding rebuilds the value from source and flags alone; compiled code is
// never carried across.

use crate::error::RegexError;
use crate::regflags::RegExpFlag;
use crate::regobject::RegExpObject;

/// Append `obj`'s serialized form to `buf`.
pub fn encode_regexp(obj: &RegExpObject, buf: &mut Vec<u8>) -> Result<(), RegexError> {
    let source = obj.source().as_bytes();
    let len = u32::try_from(source.len()).map_err(|_| RegexError::InvalidArgument("source too long"))?;
    buf.reserve(8 + source.len());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(source);
    buf.extend_from_slice(&obj.flags().bits().to_le_bytes());
    Ok(())
}

fn read_u32(input: &mut &[u8]) -> Result<u32, RegexError> {
    let (head, rest) = input
        .split_first_chunk::<4>()
        .ok_or(RegexError::InvalidArgument("truncated regexp data"))?;
    *input = rest;
    Ok(u32::from_le_bytes(*head))
}

/// Read one serialized pattern from the front of `input`, advancing it.
pub fn decode_regexp(input: &mut &[u8]) -> Result<RegExpObject, RegexError> {
    let len = read_u32(input)? as usize;
    if input.len() < len {
        return Err(RegexError::InvalidArgument("truncated regexp data"));
    }
    let (bytes, rest) = input.split_at(len);
    let source =
        std::str::from_utf8(bytes).map_err(|_| RegexError::InvalidArgument("regexp source is not UTF-8"))?;
    *input = rest;
    let flags = RegExpFlag::from_word(read_u32(input)?)?;
    RegExpObject::create_no_statics(source, flags)
}

/// Fresh copy of a script-embedded pattern, rebuilt from source and flags.
pub fn clone_script_regexp(obj: &RegExpObject) -> Result<RegExpObject, RegexError> {
    RegExpObject::create_no_statics(obj.source(), obj.flags())
}
