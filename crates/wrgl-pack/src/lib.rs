//! Packfile wire codec for wrgl.
//!
//! A packfile is the unit of object transfer between two repositories: a
//! 4-byte `PACK` magic and a big-endian `u32` version, followed by any
//! number of records. Each record is a variable-length header carrying the
//! object type and payload length, then the payload bytes exactly as they
//! are stored.
//!
//! ```text
//! first header byte   MSB: more length bytes follow
//!                     bits 6-4: type (1 commit, 2 table, 3 block)
//!                     bits 3-0: low 4 bits of length
//! following bytes     MSB: more bytes follow, bits 6-0: next 7 length bits
//! ```
//!
//! There is no record count and no trailer: the stream ends where the
//! transport body ends.

pub mod entry;
pub mod error;
pub mod reader;
pub mod writer;

pub use entry::ObjectType;
pub use error::{PackError, PackResult};
pub use reader::PackfileReader;
pub use writer::{encoded_len, PackfileWriter};

/// Leading magic of every packfile.
pub const MAGIC: [u8; 4] = *b"PACK";

/// Current packfile version.
pub const VERSION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn object_type() -> impl Strategy<Value = ObjectType> {
        prop_oneof![
            Just(ObjectType::Commit),
            Just(ObjectType::Table),
            Just(ObjectType::Block),
        ]
    }

    // Lengths chosen to need one, two and three or more header bytes.
    fn payload() -> impl Strategy<Value = Vec<u8>> {
        prop_oneof![
            prop::collection::vec(any::<u8>(), 0..16),
            prop::collection::vec(any::<u8>(), 16..2048),
            prop::collection::vec(any::<u8>(), 2048..6000),
        ]
    }

    fn pack(objects: &[(ObjectType, Vec<u8>)]) -> Vec<u8> {
        let mut w = PackfileWriter::new(Vec::new()).unwrap();
        for (ty, data) in objects {
            w.write_object(*ty, data).unwrap();
        }
        w.into_inner()
    }

    proptest! {
        #[test]
        fn roundtrip(objects in prop::collection::vec((object_type(), payload()), 0..8)) {
            let bytes = pack(&objects);
            let read: Vec<_> = PackfileReader::new(bytes.as_slice())
                .unwrap()
                .collect::<PackResult<_>>()
                .unwrap();
            prop_assert_eq!(read, objects);
        }

        #[test]
        fn write_object_reports_encoded_len(ty in object_type(), data in payload()) {
            let mut w = PackfileWriter::new(Vec::new()).unwrap();
            let n = w.write_object(ty, &data).unwrap();
            prop_assert_eq!(n, encoded_len(data.len()));
            prop_assert_eq!(w.into_inner().len(), 8 + n);
        }
    }

    #[test]
    fn empty_packfile() {
        let bytes = pack(&[]);
        let mut r = PackfileReader::new(bytes.as_slice()).unwrap();
        assert!(r.read_object().unwrap().is_none());
        assert!(r.read_object().unwrap().is_none());
    }

    #[test]
    fn truncated_payload() {
        let mut bytes = pack(&[(ObjectType::Block, vec![1u8; 100])]);
        bytes.truncate(bytes.len() - 1);
        let mut r = PackfileReader::new(bytes.as_slice()).unwrap();
        assert!(matches!(r.read_object(), Err(PackError::UnexpectedEof)));
    }

    #[test]
    fn truncated_header() {
        let mut bytes = pack(&[(ObjectType::Table, vec![0u8; 300])]);
        bytes.truncate(9);
        let mut r = PackfileReader::new(bytes.as_slice()).unwrap();
        assert!(matches!(r.read_object(), Err(PackError::UnexpectedEof)));
    }

    #[test]
    fn bad_magic() {
        let err = PackfileReader::new(&b"PAKC\0\0\0\x01"[..]).err().unwrap();
        assert!(matches!(err, PackError::InvalidMagic { .. }));
    }

    #[test]
    fn bad_version() {
        let err = PackfileReader::new(&b"PACK\0\0\0\x02"[..]).err().unwrap();
        assert!(matches!(err, PackError::UnsupportedVersion(2)));
    }

    #[test]
    fn short_file_header() {
        let err = PackfileReader::new(&b"PAC"[..]).err().unwrap();
        assert!(matches!(err, PackError::UnexpectedEof));
    }

    #[test]
    fn unknown_type_in_stream() {
        let mut bytes = pack(&[]);
        bytes.push(0x70);
        let mut r = PackfileReader::new(bytes.as_slice()).unwrap();
        assert!(matches!(r.read_object(), Err(PackError::UnknownObjectType(7))));
    }
}
