use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Width in bytes of every object sum.
pub const SUM_LEN: usize = 32;

/// Content-addressed identifier for a commit, table, block or block index.
///
/// An `ObjectSum` is the BLAKE3 hash of an object's stored bytes. Identical
/// content always produces the same sum, which is what lets two repositories
/// deduplicate tables and blocks during a transfer.
///
/// Human-readable formats (JSON) carry sums as hex strings; binary formats
/// carry the raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectSum([u8; SUM_LEN]);

impl ObjectSum {
    /// Hash raw bytes without domain separation.
    pub fn digest(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create an `ObjectSum` from a pre-computed hash.
    pub const fn from_hash(hash: [u8; SUM_LEN]) -> Self {
        Self(hash)
    }

    /// The null sum (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self([0u8; SUM_LEN])
    }

    /// Returns `true` if this is the null sum.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; SUM_LEN]
    }

    /// The raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; SUM_LEN] {
        &self.0
    }

    /// Hex-encoded string representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::BadHex {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_slice(&bytes)
    }

    /// Copy from a byte slice of exactly [`SUM_LEN`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        if bytes.len() != SUM_LEN {
            return Err(TypeError::BadSumLength(bytes.len()));
        }
        let mut arr = [0u8; SUM_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ObjectSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectSum({})", self.short_hex())
    }
}

impl fmt::Display for ObjectSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for ObjectSum {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; SUM_LEN]> for ObjectSum {
    fn from(bytes: [u8; SUM_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<ObjectSum> for [u8; SUM_LEN] {
    fn from(sum: ObjectSum) -> Self {
        sum.0
    }
}

impl Serialize for ObjectSum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

struct SumVisitor;

impl<'de> Visitor<'de> for SumVisitor {
    type Value = ObjectSum;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {SUM_LEN}-byte sum as hex string or bytes")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<ObjectSum, E> {
        ObjectSum::from_hex(v).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<ObjectSum, E> {
        ObjectSum::from_slice(v).map_err(E::custom)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<ObjectSum, A::Error> {
        let mut arr = [0u8; SUM_LEN];
        for (i, byte) in arr.iter_mut().enumerate() {
            *byte = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        Ok(ObjectSum(arr))
    }
}

impl<'de> Deserialize<'de> for ObjectSum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(SumVisitor)
        } else {
            deserializer.deserialize_bytes(SumVisitor)
        }
    }
}
