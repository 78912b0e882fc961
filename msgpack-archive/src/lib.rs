//! MessagePack archives for object-graph serialization.
//!
//! An [`OutputArchive`] turns an ordered stream of save calls (scalars, named
//! fields, collection sizes, raw blocks and protocol metadata) into a flat
//! sequence of MessagePack tokens. An [`InputArchive`] replays the same
//! sequence of load calls against those bytes, checking field names and
//! token shapes as it goes.
//!
//! ```
//! use msgpack_archive::{nvp, CollectionSize, InputArchive, OutputArchive};
//!
//! let mut out = OutputArchive::new(Vec::new());
//! out.save(&nvp("count", &CollectionSize(3))).unwrap();
//! for n in [1u32, 2, 3] {
//!     out.save(&n).unwrap();
//! }
//! let bytes = out.into_inner();
//!
//! let mut input = InputArchive::new(&bytes);
//! let CollectionSize(len) = input.load_field("count").unwrap();
//! let items: Vec<u32> = (0..len).map(|_| input.load().unwrap()).collect();
//! assert_eq!(items, [1, 2, 3]);
//! ```

#[cfg(feature = "writer")]
mod counting;
#[cfg(feature = "reader")]
mod de;
mod error;
mod field;
mod meta;
#[cfg(feature = "writer")]
mod ser;
mod token;

#[cfg(feature = "reader")]
pub use de::{InputArchive, Load};
pub use error::{DecodeError, EncodeError, ErrorKind};
pub use field::{nvp, CollectionSize, Nvp};
pub use meta::{ArchiveOptions, Elision, Metadata, MetadataKind, RawBlockPolicy};
#[cfg(feature = "writer")]
pub use ser::{OutputArchive, Save};
pub use token::{Token, TokenKind};

#[doc(hidden)]
pub use bytes;
