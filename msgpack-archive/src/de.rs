use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use bytes::Bytes;

use crate::error::DecodeError;
use crate::field::CollectionSize;
use crate::meta::{ArchiveOptions, Elision, Metadata, MetadataKind, RawBlockPolicy};
use crate::token::{self, Token, TokenKind};

/// Values an [`InputArchive`] knows how to rebuild.
///
/// Implementations must read exactly the tokens the matching
/// [`Save`](crate::Save) implementation wrote, in the same order.
pub trait Load: Sized {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError>;
}

/// Decoder over an owned copy of a complete archive buffer.
///
/// The cursor only moves forward, one token per load. After any error the
/// archive should be dropped rather than resumed.
pub struct InputArchive {
    data: Bytes,
    pos: usize,
    options: ArchiveOptions,
}

impl InputArchive {
    /// Copy `buffer` and start decoding at its first byte.
    pub fn new(buffer: &[u8]) -> InputArchive {
        InputArchive::from_bytes(Bytes::copy_from_slice(buffer))
    }

    pub fn with_options(buffer: &[u8], options: ArchiveOptions) -> InputArchive {
        let mut ar = InputArchive::new(buffer);
        ar.options = options;
        ar
    }

    /// Decode from an already shared buffer without copying it.
    pub fn from_bytes(data: Bytes) -> InputArchive {
        InputArchive {
            data,
            pos: 0,
            options: ArchiveOptions::default(),
        }
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Classify the next token without consuming it.
    pub fn peek_kind(&self) -> Result<TokenKind, DecodeError> {
        let mut pos = self.pos;
        token::read_token(&self.data, &mut pos).map(|token| token.kind())
    }

    /// Check that every byte of the archive has been consumed.
    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(DecodeError::TrailingBytes {
                offset: self.pos,
                remaining,
            }),
        }
    }

    pub fn load<T: Load>(&mut self) -> Result<T, DecodeError> {
        T::load(self)
    }

    /// Load into an existing slot. The slot is untouched on error.
    pub fn load_into<T: Load>(&mut self, slot: &mut T) -> Result<(), DecodeError> {
        *slot = T::load(self)?;
        Ok(())
    }

    /// Load a value saved as `nvp(name, ..)`, checking that the stored field
    /// name is exactly `name`.
    pub fn load_field<T: Load>(&mut self, name: &str) -> Result<T, DecodeError> {
        let (offset, token) = self.next_token()?;
        let size = match token {
            Token::Map(size) => size,
            other => {
                return Err(DecodeError::NotAMap {
                    offset,
                    name: name.to_owned(),
                    found: other.kind(),
                })
            }
        };
        if size != 1 {
            return Err(DecodeError::MapSize {
                offset,
                name: name.to_owned(),
                size,
            });
        }

        let (offset, token) = self.next_token()?;
        let key = match token {
            Token::Str(key) => key,
            other => {
                return Err(DecodeError::TypeMismatch {
                    offset,
                    expected: "field name",
                    found: other.kind(),
                })
            }
        };
        if key != name.as_bytes() {
            return Err(DecodeError::NameMismatch {
                offset,
                expected: name.to_owned(),
                found: String::from_utf8_lossy(key).into_owned(),
            });
        }

        T::load(self)
    }

    pub fn load_field_into<T: Load>(
        &mut self,
        name: &str,
        slot: &mut T,
    ) -> Result<(), DecodeError> {
        *slot = self.load_field(name)?;
        Ok(())
    }

    /// Read the metadata value of `kind`. Elided kinds consume nothing and
    /// return `None`.
    pub fn load_metadata(
        &mut self,
        kind: MetadataKind,
    ) -> Result<Option<Metadata>, DecodeError> {
        match kind.elision(&self.options) {
            Elision::Elide => {
                if kind == MetadataKind::ClassName {
                    tracing::debug!(
                        %kind,
                        offset = self.pos,
                        "class name was not written; nothing to read"
                    );
                } else {
                    tracing::trace!(%kind, "metadata elided on read");
                }
                Ok(None)
            }
            Elision::Carry => Metadata::load_payload(kind, self).map(Some),
        }
    }

    /// Copy the next raw block into `dest` and return the stored size.
    ///
    /// A block larger than `dest` is an error under
    /// [`RawBlockPolicy::Reject`]; under [`RawBlockPolicy::Truncate`] the
    /// first `dest.len()` bytes are copied and the larger stored size is
    /// still returned.
    pub fn load_binary(&mut self, dest: &mut [u8]) -> Result<usize, DecodeError> {
        let policy = self.options.raw_block_policy;
        let (offset, token) = self.next_token()?;
        let stored = match token {
            Token::Bin(stored) => stored,
            other => {
                return Err(DecodeError::TypeMismatch {
                    offset,
                    expected: "raw block",
                    found: other.kind(),
                })
            }
        };

        let capacity = dest.len();
        if stored.len() <= capacity {
            dest[..stored.len()].copy_from_slice(stored);
            return Ok(stored.len());
        }

        match policy {
            RawBlockPolicy::Reject => Err(DecodeError::Bounds {
                offset,
                stored: stored.len(),
                capacity,
            }),
            RawBlockPolicy::Truncate => {
                tracing::warn!(
                    offset,
                    stored = stored.len(),
                    capacity,
                    "raw block truncated to destination"
                );
                dest.copy_from_slice(&stored[..capacity]);
                Ok(stored.len())
            }
        }
    }

    /// Read the next token and return it with its starting offset.
    pub(crate) fn next_token(&mut self) -> Result<(usize, Token<'_>), DecodeError> {
        let offset = self.pos;
        let token = token::read_token(&self.data, &mut self.pos)?;
        tracing::trace!(offset, kind = %token.kind(), "read token");
        Ok((offset, token))
    }

    /// Read a container header of exactly `expected` entries.
    fn expect_array(&mut self, expected: usize) -> Result<(), DecodeError> {
        let (offset, token) = self.next_token()?;
        match token {
            Token::Array(len) if len as usize == expected => Ok(()),
            Token::Array(found) => Err(DecodeError::LengthMismatch {
                offset,
                expected,
                found,
            }),
            other => Err(DecodeError::TypeMismatch {
                offset,
                expected: "array header",
                found: other.kind(),
            }),
        }
    }

    fn expect_map(&mut self) -> Result<usize, DecodeError> {
        let (offset, token) = self.next_token()?;
        match token {
            Token::Map(len) => Ok(len as usize),
            other => Err(DecodeError::TypeMismatch {
                offset,
                expected: "map header",
                found: other.kind(),
            }),
        }
    }

    /// Untrusted lengths never reserve more slots than there are bytes left,
    /// since every token takes at least one byte.
    fn capacity_hint(&self, len: usize) -> usize {
        len.min(self.remaining())
    }
}

impl<T: Load> Load for Box<T> {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        T::load(ar).map(Box::new)
    }
}

impl Load for () {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        let (offset, token) = ar.next_token()?;
        match token {
            Token::Nil => Ok(()),
            other => Err(mismatch(offset, "nil", other)),
        }
    }
}

impl Load for bool {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        let (offset, token) = ar.next_token()?;
        match token {
            Token::Bool(value) => Ok(value),
            other => Err(mismatch(offset, "bool", other)),
        }
    }
}

fn mismatch(offset: usize, expected: &'static str, found: Token<'_>) -> DecodeError {
    DecodeError::TypeMismatch {
        offset,
        expected,
        found: found.kind(),
    }
}

macro_rules! impl_load_int {
    ($($ty:ty),*) => {$(
        impl Load for $ty {
            fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
                let (offset, token) = ar.next_token()?;
                let out_of_range = |value: i128| DecodeError::OutOfRange {
                    offset,
                    expected: stringify!($ty),
                    value,
                };
                match token {
                    Token::Uint(value) => {
                        <$ty>::try_from(value).map_err(|_| out_of_range(i128::from(value)))
                    }
                    Token::Sint(value) => {
                        <$ty>::try_from(value).map_err(|_| out_of_range(i128::from(value)))
                    }
                    other => Err(mismatch(offset, stringify!($ty), other)),
                }
            }
        }
    )*};
}

impl_load_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

/// Integer tokens are accepted and converted with `as`, so integers beyond
/// 2^53 in magnitude round to the nearest representable value.
impl Load for f64 {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        let (offset, token) = ar.next_token()?;
        match token {
            Token::F64(value) => Ok(value),
            Token::F32(value) => Ok(f64::from(value)),
            Token::Uint(value) => Ok(value as f64),
            Token::Sint(value) => Ok(value as f64),
            other => Err(mismatch(offset, "f64", other)),
        }
    }
}

/// Accepts `f64` tokens and integer tokens, both converted with `as`. Values
/// outside the exact range of `f32` round silently.
impl Load for f32 {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        let (offset, token) = ar.next_token()?;
        match token {
            Token::F32(value) => Ok(value),
            Token::F64(value) => Ok(value as f32),
            Token::Uint(value) => Ok(value as f32),
            Token::Sint(value) => Ok(value as f32),
            other => Err(mismatch(offset, "f32", other)),
        }
    }
}

impl Load for String {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        let (offset, token) = ar.next_token()?;
        match token {
            Token::Str(raw) | Token::Bin(raw) => std::str::from_utf8(raw)
                .map(str::to_owned)
                .map_err(|source| DecodeError::InvalidUtf8 { offset, source }),
            other => Err(mismatch(offset, "string", other)),
        }
    }
}

impl Load for Bytes {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        let data = ar.data.clone();
        let offset = ar.pos;
        match token::read_token(&data, &mut ar.pos)? {
            Token::Bin(raw) | Token::Str(raw) => {
                tracing::trace!(offset, len = raw.len(), "read token");
                Ok(data.slice_ref(raw))
            }
            other => Err(mismatch(offset, "bytes", other)),
        }
    }
}

/// Nil is `None`; any other token is loaded as `T`. The output archive refuses
/// to write a `Some` holding a nil, so nested options stay unambiguous.
impl<T: Load> Load for Option<T> {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        if ar.peek_kind()? == TokenKind::Nil {
            ar.next_token()?;
            return Ok(None);
        }
        T::load(ar).map(Some)
    }
}

impl<T: Load> Load for Vec<T> {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        let CollectionSize(len) = ar.load()?;
        let mut items = Vec::with_capacity(ar.capacity_hint(len));
        for _ in 0..len {
            items.push(T::load(ar)?);
        }
        Ok(items)
    }
}

impl<K: Load + Ord, V: Load> Load for BTreeMap<K, V> {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        let len = ar.expect_map()?;
        let mut map = BTreeMap::new();
        for _ in 0..len {
            let offset = ar.pos;
            let key = K::load(ar)?;
            let value = V::load(ar)?;
            if map.insert(key, value).is_some() {
                return Err(DecodeError::DuplicateKey { offset });
            }
        }
        Ok(map)
    }
}

impl<K: Load + Eq + Hash, V: Load, S: BuildHasher + Default> Load for HashMap<K, V, S> {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        let len = ar.expect_map()?;
        let mut map = HashMap::with_capacity_and_hasher(ar.capacity_hint(len), S::default());
        for _ in 0..len {
            let offset = ar.pos;
            let key = K::load(ar)?;
            let value = V::load(ar)?;
            if map.insert(key, value).is_some() {
                return Err(DecodeError::DuplicateKey { offset });
            }
        }
        Ok(map)
    }
}

macro_rules! impl_load_tuple {
    ($len:expr => $($name:ident),+) => {
        impl<$($name: Load),+> Load for ($($name,)+) {
            fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
                ar.expect_array($len)?;
                Ok(($($name::load(ar)?,)+))
            }
        }
    };
}

impl_load_tuple!(1 => A);
impl_load_tuple!(2 => A, B);
impl_load_tuple!(3 => A, B, C);
impl_load_tuple!(4 => A, B, C, D);
