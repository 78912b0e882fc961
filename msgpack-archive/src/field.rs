//! Wrappers the object-graph walker hands to the archives: named fields and
//! collection sizes.

#[cfg(feature = "reader")]
use crate::de::{InputArchive, Load};
#[cfg(feature = "reader")]
use crate::error::DecodeError;
#[cfg(feature = "writer")]
use crate::error::EncodeError;
#[cfg(feature = "reader")]
use crate::token::Token;
#[cfg(feature = "writer")]
use crate::ser::{OutputArchive, Save};

/// A named field, written as the single-entry map `{name: value}`.
#[derive(Debug)]
pub struct Nvp<'a, T: ?Sized> {
    name: &'a str,
    value: &'a T,
}

/// Pair a field name with the value to save under it.
pub fn nvp<'a, T: ?Sized>(name: &'a str, value: &'a T) -> Nvp<'a, T> {
    Nvp { name, value }
}

impl<T: ?Sized> Clone for Nvp<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Nvp<'_, T> {}

impl<'a, T: ?Sized> Nvp<'a, T> {
    /// The key written into the single-entry map.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// The wrapped value, saved right after the name.
    pub fn value(&self) -> &'a T {
        self.value
    }
}

#[cfg(feature = "writer")]
impl<T: Save + ?Sized> Save for Nvp<'_, T> {
    fn save<W: std::io::Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_map_len(1)?;
        ar.write_str(self.name)?;
        self.value.save(ar)
    }
}

/// Element count of a collection, written as an array header. The elements
/// themselves are saved by the caller afterwards, one call each.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct CollectionSize(pub usize);

impl CollectionSize {
    pub fn get(self) -> usize {
        self.0
    }
}

impl From<usize> for CollectionSize {
    fn from(len: usize) -> Self {
        CollectionSize(len)
    }
}

#[cfg(feature = "writer")]
impl Save for CollectionSize {
    fn save<W: std::io::Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.write_array_len(self.0)
    }
}

#[cfg(feature = "reader")]
impl Load for CollectionSize {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        let (offset, token) = ar.next_token()?;
        match token {
            Token::Array(len) => Ok(CollectionSize(len as usize)),
            other => Err(DecodeError::TypeMismatch {
                offset,
                expected: "collection size",
                found: other.kind(),
            }),
        }
    }
}
