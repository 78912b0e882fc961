use std::fmt;
use std::str::Utf8Error;

use rmp::encode::ValueWriteError;

use crate::token::TokenKind;

/// Failure while appending tokens to an output archive.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Writing to the archive sink failed.")]
    Io(#[from] std::io::Error),

    #[error("Length {len} does not fit in a 32-bit token header.")]
    TooLong { len: usize },

    #[error("Some(nil) cannot be told apart from None on the wire.")]
    AmbiguousNil,
}

impl From<ValueWriteError<std::io::Error>> for EncodeError {
    fn from(err: ValueWriteError<std::io::Error>) -> Self {
        match err {
            ValueWriteError::InvalidMarkerWrite(e) | ValueWriteError::InvalidDataWrite(e) => {
                EncodeError::Io(e)
            }
        }
    }
}

impl From<EncodeError> for std::io::Error {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::Io(e) => e,
            e @ (EncodeError::TooLong { .. } | EncodeError::AmbiguousNil) => {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
            }
        }
    }
}

/// Failure while reading tokens from an input archive.
///
/// Every variant is fatal to the load sequence: the archive is left at an
/// unspecified position and should be discarded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Expected a map for named field '{name}' at offset {offset}, but got a {found}.")]
    NotAMap {
        offset: usize,
        name: String,
        found: TokenKind,
    },

    #[error("Expected a single-entry map for named field '{name}' at offset {offset}, but got a size {size}.")]
    MapSize {
        offset: usize,
        name: String,
        size: u32,
    },

    #[error("Map key at offset {offset} repeats an earlier key.")]
    DuplicateKey { offset: usize },

    #[error("Expected {expected} entries at offset {offset}, but got {found}.")]
    LengthMismatch {
        offset: usize,
        expected: usize,
        found: u32,
    },

    #[error("Expected name '{expected}' at offset {offset}, but got '{found}'.")]
    NameMismatch {
        offset: usize,
        expected: String,
        found: String,
    },

    #[error("Expected {expected} at offset {offset}, but got a {found}.")]
    TypeMismatch {
        offset: usize,
        expected: &'static str,
        found: TokenKind,
    },

    #[error("Value {value} at offset {offset} is out of range for {expected}.")]
    OutOfRange {
        offset: usize,
        expected: &'static str,
        value: i128,
    },

    #[error("Raw block of {stored} bytes at offset {offset} does not fit in a destination of {capacity} bytes.")]
    Bounds {
        offset: usize,
        stored: usize,
        capacity: usize,
    },

    #[error("Archive ended in the middle of a token at offset {offset}.")]
    UnexpectedEof { offset: usize },

    #[error("Reserved marker byte {byte:#04x} at offset {offset}.")]
    ReservedMarker { offset: usize, byte: u8 },

    #[error("Invalid UTF-8 in text token at offset {offset}.")]
    InvalidUtf8 {
        offset: usize,
        #[source]
        source: Utf8Error,
    },

    #[error("{remaining} unread bytes left at offset {offset}.")]
    TrailingBytes { offset: usize, remaining: usize },
}

/// Coarse grouping of [`DecodeError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The next token is not shaped the way the current load requires.
    Structure,
    /// A named field's key differs from the expected name.
    SchemaMismatch,
    /// A scalar token cannot be converted to the requested type.
    TypeMismatch,
    /// A raw block does not fit its destination.
    Bounds,
    /// The byte stream itself is not a valid token sequence.
    Malformed,
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        use DecodeError::*;

        match self {
            NotAMap { .. } | MapSize { .. } | DuplicateKey { .. } | LengthMismatch { .. } => {
                ErrorKind::Structure
            }
            NameMismatch { .. } => ErrorKind::SchemaMismatch,
            TypeMismatch { .. } | OutOfRange { .. } | InvalidUtf8 { .. } => {
                ErrorKind::TypeMismatch
            }
            Bounds { .. } => ErrorKind::Bounds,
            UnexpectedEof { .. } | ReservedMarker { .. } | TrailingBytes { .. } => {
                ErrorKind::Malformed
            }
        }
    }

    /// Byte offset of the token that failed to decode.
    pub fn offset(&self) -> usize {
        use DecodeError::*;

        match *self {
            NotAMap { offset, .. }
            | MapSize { offset, .. }
            | DuplicateKey { offset }
            | LengthMismatch { offset, .. }
            | NameMismatch { offset, .. }
            | TypeMismatch { offset, .. }
            | OutOfRange { offset, .. }
            | Bounds { offset, .. }
            | UnexpectedEof { offset }
            | ReservedMarker { offset, .. }
            | InvalidUtf8 { offset, .. }
            | TrailingBytes { offset, .. } => offset,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Structure => "structure",
            ErrorKind::SchemaMismatch => "schema mismatch",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::Bounds => "bounds",
            ErrorKind::Malformed => "malformed",
        };

        write!(f, "{}", s)
    }
}

impl From<DecodeError> for std::io::Error {
    fn from(err: DecodeError) -> Self {
        let kind = match err.kind() {
            ErrorKind::Malformed if matches!(err, DecodeError::UnexpectedEof { .. }) => {
                std::io::ErrorKind::UnexpectedEof
            }
            _ => std::io::ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, err)
    }
}
