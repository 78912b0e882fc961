use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use bytes::{Bytes, BytesMut};
use rmp::encode;

use crate::counting::CountingWriter;
use crate::error::EncodeError;
use crate::field::CollectionSize;
use crate::meta::ArchiveOptions;
use crate::token::TokenKind;

/// Values an [`OutputArchive`] knows how to append.
///
/// Implement this for your own types by saving their fields in a fixed order,
/// usually wrapped in [`nvp`](crate::nvp) so the input archive can check the
/// names on the way back.
pub trait Save {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError>;

    /// Whether this value is written as a lone nil token. `Option` uses nil
    /// for `None`, so a `Some` around such a value could not be told apart.
    fn is_nil(&self) -> bool {
        false
    }
}

/// Append-only encoder bound to one sink for its whole lifetime.
pub struct OutputArchive<W: Write> {
    writer: CountingWriter<W>,
    options: ArchiveOptions,
}

impl<W: Write> OutputArchive<W> {
    pub fn new(writer: W) -> OutputArchive<W> {
        OutputArchive::with_options(writer, ArchiveOptions::default())
    }

    pub fn with_options(writer: W, options: ArchiveOptions) -> OutputArchive<W> {
        OutputArchive {
            writer: CountingWriter::new(writer),
            options,
        }
    }

    pub fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Append `value`. Scalars become one token, named fields a single-entry
    /// map, collection sizes an array header and elided metadata nothing.
    pub fn save<T: Save + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        value.save(self)
    }

    /// Append an opaque block of bytes as one raw token.
    pub fn save_binary(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.write_bin(bytes)
    }

    pub fn bytes_written(&self) -> u64 {
        self.writer.bytes_written()
    }

    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    #[inline]
    fn trace(&self, kind: TokenKind) {
        tracing::trace!(offset = self.bytes_written(), %kind, "write token");
    }

    pub(crate) fn write_nil(&mut self) -> Result<(), EncodeError> {
        self.trace(TokenKind::Nil);
        encode::write_nil(&mut self.writer)?;
        Ok(())
    }

    pub(crate) fn write_bool(&mut self, value: bool) -> Result<(), EncodeError> {
        self.trace(TokenKind::Bool);
        encode::write_bool(&mut self.writer, value)?;
        Ok(())
    }

    pub(crate) fn write_uint(&mut self, value: u64) -> Result<(), EncodeError> {
        self.trace(TokenKind::Uint);
        encode::write_uint(&mut self.writer, value)?;
        Ok(())
    }

    /// Non-negative values take the unsigned encodings, as the format prescribes.
    pub(crate) fn write_sint(&mut self, value: i64) -> Result<(), EncodeError> {
        self.trace(TokenKind::Sint);
        encode::write_sint(&mut self.writer, value)?;
        Ok(())
    }

    pub(crate) fn write_f32(&mut self, value: f32) -> Result<(), EncodeError> {
        self.trace(TokenKind::F32);
        encode::write_f32(&mut self.writer, value)?;
        Ok(())
    }

    pub(crate) fn write_f64(&mut self, value: f64) -> Result<(), EncodeError> {
        self.trace(TokenKind::F64);
        encode::write_f64(&mut self.writer, value)?;
        Ok(())
    }

    pub(crate) fn write_str(&mut self, value: &str) -> Result<(), EncodeError> {
        header_len(value.len())?;
        self.trace(TokenKind::Str);
        encode::write_str(&mut self.writer, value)?;
        Ok(())
    }

    pub(crate) fn write_bin(&mut self, value: &[u8]) -> Result<(), EncodeError> {
        header_len(value.len())?;
        self.trace(TokenKind::Bin);
        encode::write_bin(&mut self.writer, value)?;
        Ok(())
    }

    pub(crate) fn write_array_len(&mut self, len: usize) -> Result<(), EncodeError> {
        let len = header_len(len)?;
        self.trace(TokenKind::Array);
        encode::write_array_len(&mut self.writer, len)?;
        Ok(())
    }

    pub(crate) fn write_map_len(&mut self, len: usize) -> Result<(), EncodeError> {
        let len = header_len(len)?;
        self.trace(TokenKind::Map);
        encode::write_map_len(&mut self.writer, len)?;
        Ok(())
    }
}

/// Token headers carry 32-bit lengths.
fn header_len(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::TooLong { len })
}

impl<T: Save + ?Sized> Save for &T {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        (**self).save(ar)
    }

    fn is_nil(&self) -> bool {
        (**self).is_nil()
    }
}

impl<T: Save + ?Sized> Save for Box<T> {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        (**self).save(ar)
    }

    fn is_nil(&self) -> bool {
        (**self).is_nil()
    }
}

impl Save for () {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_nil()
    }

    fn is_nil(&self) -> bool {
        true
    }
}

impl Save for bool {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_bool(*self)
    }
}

macro_rules! impl_save_uint {
    ($($ty:ty),*) => {$(
        impl Save for $ty {
            fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
                ar.write_uint(*self as u64)
            }
        }
    )*};
}

macro_rules! impl_save_sint {
    ($($ty:ty),*) => {$(
        impl Save for $ty {
            fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
                ar.write_sint(*self as i64)
            }
        }
    )*};
}

impl_save_uint!(u8, u16, u32, u64, usize);
impl_save_sint!(i8, i16, i32, i64, isize);

impl Save for f32 {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_f32(*self)
    }
}

impl Save for f64 {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_f64(*self)
    }
}

impl Save for str {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_str(self)
    }
}

impl Save for String {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_str(self)
    }
}

impl Save for Bytes {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_bin(self)
    }
}

impl Save for BytesMut {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_bin(self)
    }
}

/// `None` is nil and `Some(v)` is `v` itself. A `Some` whose payload is also
/// nil (`Some(None)`, `Some(())`) would read back as `None`, so it is refused
/// before anything is written.
impl<T: Save> Save for Option<T> {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        match self {
            Some(value) if value.is_nil() => Err(EncodeError::AmbiguousNil),
            Some(value) => value.save(ar),
            None => ar.write_nil(),
        }
    }

    fn is_nil(&self) -> bool {
        self.is_none()
    }
}

impl<T: Save> Save for [T] {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.save(&CollectionSize(self.len()))?;
        for item in self.iter() {
            item.save(ar)?;
        }
        Ok(())
    }
}

impl<T: Save> Save for Vec<T> {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        self.as_slice().save(ar)
    }
}

impl<K: Save, V: Save> Save for BTreeMap<K, V> {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_map_len(self.len())?;
        for (key, value) in self.iter() {
            key.save(ar)?;
            value.save(ar)?;
        }
        Ok(())
    }
}

impl<K: Save, V: Save, S> Save for HashMap<K, V, S> {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_map_len(self.len())?;
        for (key, value) in self.iter() {
            key.save(ar)?;
            value.save(ar)?;
        }
        Ok(())
    }
}

macro_rules! impl_save_tuple {
    ($len:expr => $($name:ident : $idx:tt),+) => {
        impl<$($name: Save),+> Save for ($($name,)+) {
            fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
                ar.write_array_len($len)?;
                $(self.$idx.save(ar)?;)+
                Ok(())
            }
        }
    };
}

impl_save_tuple!(1 => A: 0);
impl_save_tuple!(2 => A: 0, B: 1);
impl_save_tuple!(3 => A: 0, B: 1, C: 2);
impl_save_tuple!(4 => A: 0, B: 1, C: 2, D: 3);
