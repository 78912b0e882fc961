//! Classification of the next MessagePack token in a buffer.
//!
//! Marker parsing and header lengths come from `rmp`; this module only decides
//! which family a marker belongs to and slices out the payload, so that the
//! input archive can act on one whole token at a time.

use std::fmt;

use rmp::decode;
use rmp::Marker;

use crate::error::DecodeError;

/// Shape of a token, used in diagnostics.
#[derive(Clone, Copy, Eq, PartialEq, Hash)]
pub enum TokenKind {
    Nil,
    Bool,
    Uint,
    Sint,
    F32,
    F64,
    Str,
    Bin,
    Ext,
    Array,
    Map,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use TokenKind::*;

        let s = match self {
            Nil => "nil",
            Bool => "boolean",
            Uint => "unsigned integer",
            Sint => "signed integer",
            F32 => "32-bit float",
            F64 => "64-bit float",
            Str => "string",
            Bin => "raw block",
            Ext => "extension",
            Array => "array header",
            Map => "map header",
        };

        write!(f, "{}", s)
    }
}

impl fmt::Debug for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// One decoded token. Container headers carry only their declared length;
/// the elements follow as independent tokens.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    Nil,
    Bool(bool),
    Uint(u64),
    Sint(i64),
    F32(f32),
    F64(f64),
    /// Text payload, not yet checked for UTF-8.
    Str(&'a [u8]),
    Bin(&'a [u8]),
    Ext(i8, &'a [u8]),
    Array(u32),
    Map(u32),
}

impl Token<'_> {
    pub fn kind(&self) -> TokenKind {
        match self {
            Token::Nil => TokenKind::Nil,
            Token::Bool(_) => TokenKind::Bool,
            Token::Uint(_) => TokenKind::Uint,
            Token::Sint(_) => TokenKind::Sint,
            Token::F32(_) => TokenKind::F32,
            Token::F64(_) => TokenKind::F64,
            Token::Str(_) => TokenKind::Str,
            Token::Bin(_) => TokenKind::Bin,
            Token::Ext(..) => TokenKind::Ext,
            Token::Array(_) => TokenKind::Array,
            Token::Map(_) => TokenKind::Map,
        }
    }
}

/// Take `len` payload bytes from the front of `rd`.
fn take<'a>(rd: &mut &'a [u8], len: u32, offset: usize) -> Result<&'a [u8], DecodeError> {
    let len = len as usize;
    if rd.len() < len {
        return Err(DecodeError::UnexpectedEof { offset });
    }
    let (payload, rest) = rd.split_at(len);
    *rd = rest;
    Ok(payload)
}

// The marker has already been classified, so the only way rmp can fail is by
// running out of input.
fn eof<E>(offset: usize) -> impl FnOnce(E) -> DecodeError {
    move |_| DecodeError::UnexpectedEof { offset }
}

/// Read the token starting at `*pos`, advancing the position past it.
///
/// On error the position is left untouched.
pub(crate) fn read_token<'a>(data: &'a [u8], pos: &mut usize) -> Result<Token<'a>, DecodeError> {
    let offset = *pos;
    let byte = *data
        .get(offset)
        .ok_or(DecodeError::UnexpectedEof { offset })?;

    let mut rd = &data[offset..];

    let token = match Marker::from_u8(byte) {
        Marker::Null => {
            decode::read_nil(&mut rd).map_err(eof(offset))?;
            Token::Nil
        }
        Marker::True | Marker::False => {
            Token::Bool(decode::read_bool(&mut rd).map_err(eof(offset))?)
        }
        Marker::FixPos(_) | Marker::U8 | Marker::U16 | Marker::U32 | Marker::U64 => {
            Token::Uint(decode::read_int::<u64, _>(&mut rd).map_err(eof(offset))?)
        }
        Marker::FixNeg(_) | Marker::I8 | Marker::I16 | Marker::I32 | Marker::I64 => {
            Token::Sint(decode::read_int::<i64, _>(&mut rd).map_err(eof(offset))?)
        }
        Marker::F32 => Token::F32(decode::read_f32(&mut rd).map_err(eof(offset))?),
        Marker::F64 => Token::F64(decode::read_f64(&mut rd).map_err(eof(offset))?),
        Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => {
            let len = decode::read_str_len(&mut rd).map_err(eof(offset))?;
            Token::Str(take(&mut rd, len, offset)?)
        }
        Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => {
            let len = decode::read_bin_len(&mut rd).map_err(eof(offset))?;
            Token::Bin(take(&mut rd, len, offset)?)
        }
        Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => {
            Token::Array(decode::read_array_len(&mut rd).map_err(eof(offset))?)
        }
        Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => {
            Token::Map(decode::read_map_len(&mut rd).map_err(eof(offset))?)
        }
        Marker::FixExt1
        | Marker::FixExt2
        | Marker::FixExt4
        | Marker::FixExt8
        | Marker::FixExt16
        | Marker::Ext8
        | Marker::Ext16
        | Marker::Ext32 => {
            let meta = decode::read_ext_meta(&mut rd).map_err(eof(offset))?;
            Token::Ext(meta.typeid, take(&mut rd, meta.size, offset)?)
        }
        Marker::Reserved => return Err(DecodeError::ReservedMarker { offset, byte }),
    };

    *pos = data.len() - rd.len();
    Ok(token)
}
