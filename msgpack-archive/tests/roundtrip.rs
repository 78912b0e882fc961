//! End-to-end tests: values saved through an output archive and loaded back
//! through an input archive over the same bytes.

use std::collections::{BTreeMap, HashMap};
use std::io::Write;

use msgpack_archive::bytes::Bytes;
use msgpack_archive::{
    nvp, ArchiveOptions, CollectionSize, DecodeError, EncodeError, ErrorKind, InputArchive, Load,
    Metadata, MetadataKind, OutputArchive, Save,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn encode<T: Save + ?Sized>(value: &T) -> Vec<u8> {
    let mut ar = OutputArchive::new(Vec::new());
    ar.save(value).unwrap();
    ar.into_inner()
}

fn roundtrip<T: Save + Load + PartialEq + std::fmt::Debug>(value: T) {
    let bytes = encode(&value);
    let mut ar = InputArchive::new(&bytes);
    assert_eq!(ar.load::<T>().unwrap(), value);
    ar.finish().unwrap();
}

/// A type driven the way an object-graph walker drives the archives: class
/// bookkeeping first, then each field by name.
#[derive(Debug, Clone, PartialEq)]
struct Sample {
    id: u32,
    label: String,
    weights: Vec<f64>,
    parent: Option<u64>,
    blob: [u8; 8],
}

impl Save for Sample {
    fn save<W: Write>(&self, ar: &mut OutputArchive<W>) -> Result<(), EncodeError> {
        ar.save(&Metadata::ClassIdOptional(1))?;
        ar.save(&Metadata::Tracking(false))?;
        ar.save(&Metadata::Version(2))?;
        ar.save(&nvp("id", &self.id))?;
        ar.save(&nvp("label", &self.label))?;
        ar.save(&nvp("weights", &CollectionSize(self.weights.len())))?;
        ar.save(&Metadata::ItemVersion(0))?;
        for w in &self.weights {
            ar.save(w)?;
        }
        ar.save(&nvp("parent", &self.parent))?;
        ar.save_binary(&self.blob)
    }
}

impl Load for Sample {
    fn load(ar: &mut InputArchive) -> Result<Self, DecodeError> {
        ar.load_metadata(MetadataKind::ClassIdOptional)?;
        ar.load_metadata(MetadataKind::Tracking)?;
        ar.load_metadata(MetadataKind::Version)?;
        let id = ar.load_field("id")?;
        let label = ar.load_field("label")?;
        let CollectionSize(len) = ar.load_field("weights")?;
        ar.load_metadata(MetadataKind::ItemVersion)?;
        let mut weights = Vec::with_capacity(len);
        for _ in 0..len {
            weights.push(ar.load()?);
        }
        let parent = ar.load_field("parent")?;
        let mut blob = [0u8; 8];
        ar.load_binary(&mut blob)?;
        Ok(Sample {
            id,
            label,
            weights,
            parent,
            blob,
        })
    }
}

fn sample() -> Sample {
    Sample {
        id: 7,
        label: "seven".into(),
        weights: vec![0.5, -1.25, 1e10],
        parent: Some(3),
        blob: *b"\x00\x01\x02\x03\xfc\xfd\xfe\xff",
    }
}

/// Scalars of every supported type come back unchanged.
#[test]
fn test_scalar_roundtrip() {
    init_tracing();

    roundtrip(());
    roundtrip(true);
    roundtrip(false);
    roundtrip(0u8);
    roundtrip(u8::MAX);
    roundtrip(u16::MAX);
    roundtrip(u32::MAX);
    roundtrip(u64::MAX);
    roundtrip(usize::MAX);
    roundtrip(i8::MIN);
    roundtrip(i16::MIN);
    roundtrip(i32::MIN);
    roundtrip(i64::MIN);
    roundtrip(-33i64);
    roundtrip(3.25f32);
    roundtrip(-0.1f64);
    roundtrip(f64::MAX);
    roundtrip(String::new());
    roundtrip("a string longer than thirty-one bytes, past fixstr".to_string());
    roundtrip(Bytes::from_static(b"\x00raw\xff"));
}

/// Composed shapes: options, sequences, maps and tuples.
#[test]
fn test_composed_roundtrip() {
    init_tracing();

    roundtrip(Some(5i16));
    roundtrip(None::<String>);
    roundtrip(vec![1u32, 2, 3]);
    roundtrip(Vec::<u8>::new());
    roundtrip(vec![vec!["a".to_string()], vec![]]);
    roundtrip((1u8, "two".to_string(), 3.0f64, false));

    let mut tree = BTreeMap::new();
    tree.insert("x".to_string(), vec![1i64, -1]);
    tree.insert("y".to_string(), vec![]);
    roundtrip(tree);

    let mut hash = HashMap::new();
    hash.insert(10u16, Some(true));
    hash.insert(20u16, None);
    roundtrip(hash);
}

/// Nested options either come back exactly or are refused when saved.
#[test]
fn test_nested_option() {
    init_tracing();

    roundtrip(Some(Some(4u8)));
    roundtrip(None::<Option<u8>>);
    roundtrip(vec![Some(1i8), None, Some(-1)]);

    let mut out = OutputArchive::new(Vec::new());
    assert!(matches!(
        out.save(&Some(None::<u8>)),
        Err(EncodeError::AmbiguousNil)
    ));
    assert!(matches!(out.save(&Some(())), Err(EncodeError::AmbiguousNil)));
    assert!(out.into_inner().is_empty());
}

/// A named field decodes under its own name and fails under any other.
#[test]
fn test_named_field() {
    init_tracing();

    let bytes = encode(&nvp("x", &-17i32));

    let mut ar = InputArchive::new(&bytes);
    assert_eq!(ar.load_field::<i32>("x").unwrap(), -17);
    ar.finish().unwrap();

    let err = InputArchive::new(&bytes)
        .load_field::<i32>("y")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    assert_eq!(err.to_string(), "Expected name 'y' at offset 1, but got 'x'.");
}

/// Collection sizes of zero, one and more than 16 bits survive.
#[test]
fn test_collection_size() {
    init_tracing();

    for n in [0usize, 1, 15, 16, 65_535, 65_536, 1 << 31] {
        let bytes = encode(&CollectionSize(n));
        let mut ar = InputArchive::new(&bytes);
        assert_eq!(ar.load::<CollectionSize>().unwrap(), CollectionSize(n));
        ar.finish().unwrap();
    }
}

/// The scalar and `count` walkthrough from the format description.
#[test]
fn test_count_then_elements() {
    init_tracing();

    let bytes = encode(&42i64);
    assert_eq!(InputArchive::new(&bytes).load::<i64>().unwrap(), 42);

    let mut out = OutputArchive::new(Vec::new());
    out.save(&nvp("count", &CollectionSize(3))).unwrap();
    for n in [1i32, 2, 3] {
        out.save(&n).unwrap();
    }
    let bytes = out.into_inner();
    assert_eq!(
        bytes,
        [0x81, 0xa5, b'c', b'o', b'u', b'n', b't', 0x93, 0x01, 0x02, 0x03]
    );

    let mut ar = InputArchive::new(&bytes);
    let size: CollectionSize = ar.load_field("count").unwrap();
    assert_eq!(size.get(), 3);
    let items: Vec<i32> = (0..size.get()).map(|_| ar.load().unwrap()).collect();
    assert_eq!(items, [1, 2, 3]);
    ar.finish().unwrap();
}

/// Metadata around a value leaves the bytes identical to the bare value.
#[test]
fn test_metadata_elision() {
    init_tracing();

    let bare = encode(&nvp("v", &9u8));

    let mut out = OutputArchive::new(Vec::new());
    out.save(&Metadata::ObjectId(4)).unwrap();
    out.save(&Metadata::ObjectReference(4)).unwrap();
    out.save(&Metadata::ClassId(2)).unwrap();
    out.save(&Metadata::ClassIdReference(2)).unwrap();
    out.save(&Metadata::ClassName("sample".into())).unwrap();
    out.save(&nvp("v", &9u8)).unwrap();
    out.save(&Metadata::Version(1)).unwrap();
    out.save(&Metadata::ItemVersion(1)).unwrap();
    assert_eq!(out.into_inner(), bare);

    let mut ar = InputArchive::new(&bare);
    for kind in MetadataKind::ALL {
        assert!(ar.load_metadata(kind).unwrap().is_none());
    }
    assert_eq!(ar.position(), 0);
    assert_eq!(ar.load_field::<u8>("v").unwrap(), 9);
}

/// Carried metadata is written and read symmetrically when both sides agree.
#[test]
fn test_carried_class_name() {
    init_tracing();

    let options = ArchiveOptions::new().carry(MetadataKind::ClassName);
    let mut out = OutputArchive::with_options(Vec::new(), options.clone());
    out.save(&Metadata::ClassName("sample".into())).unwrap();
    out.save(&Metadata::Version(1)).unwrap();
    out.save(&5u8).unwrap();
    let bytes = out.into_inner();

    let mut ar = InputArchive::with_options(&bytes, options);
    assert_eq!(
        ar.load_metadata(MetadataKind::ClassName).unwrap(),
        Some(Metadata::ClassName("sample".into()))
    );
    assert_eq!(ar.load_metadata(MetadataKind::Version).unwrap(), None);
    assert_eq!(ar.load::<u8>().unwrap(), 5);
    ar.finish().unwrap();
}

/// A whole object with interleaved metadata, fields and a raw block.
#[test]
fn test_object_graph() {
    init_tracing();

    let original = sample();
    let bytes = encode(&original);

    let mut ar = InputArchive::new(&bytes);
    let decoded: Sample = ar.load().unwrap();
    assert_eq!(decoded, original);
    ar.finish().unwrap();
}

/// Loading an object whose fields were renamed reports the first mismatch.
#[test]
fn test_object_schema_drift() {
    init_tracing();

    let mut out = OutputArchive::new(Vec::new());
    out.save(&nvp("identifier", &7u32)).unwrap();
    let bytes = out.into_inner();

    let err = InputArchive::new(&bytes).load::<Sample>().unwrap_err();
    match err {
        DecodeError::NameMismatch {
            expected, found, ..
        } => {
            assert_eq!(expected, "id");
            assert_eq!(found, "identifier");
        }
        other => panic!("unexpected error: {}", other),
    }
}

/// A truncated archive fails instead of producing a partial object.
#[test]
fn test_truncated_object() {
    init_tracing();

    let bytes = encode(&sample());
    for cut in 0..bytes.len() {
        let err = InputArchive::new(&bytes[..cut])
            .load::<Sample>()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Malformed, "cut at {}", cut);
    }
}

/// Decode errors convert into `std::io::Error` for io-based hosts.
#[test]
fn test_io_error_conversion() {
    let err = InputArchive::new(&[]).load::<u8>().unwrap_err();
    let io: std::io::Error = err.into();
    assert_eq!(io.kind(), std::io::ErrorKind::UnexpectedEof);

    let err = InputArchive::new(&[0x01]).load::<String>().unwrap_err();
    let io: std::io::Error = err.into();
    assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
}
