use wrgl_objects::ObjectKind;

use crate::error::{PackError, PackResult};

/// Type tag of a packfile record.
///
/// Only three kinds ever travel: block indices are derived by the receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Commit = 1,
    Table = 2,
    Block = 3,
}

impl ObjectType {
    /// The 3-bit wire tag.
    pub fn type_bits(self) -> u8 {
        self as u8
    }

    /// Parse a wire tag.
    pub fn from_type_bits(bits: u8) -> PackResult<Self> {
        match bits {
            1 => Ok(Self::Commit),
            2 => Ok(Self::Table),
            3 => Ok(Self::Block),
            other => Err(PackError::UnknownObjectType(other)),
        }
    }

    /// Storage kind the record decodes to.
    pub fn object_kind(self) -> ObjectKind {
        match self {
            Self::Commit => ObjectKind::Commit,
            Self::Table => ObjectKind::Table,
            Self::Block => ObjectKind::Block,
        }
    }

    /// Wire tag for a storage kind. `None` for kinds that never travel.
    pub fn from_object_kind(kind: ObjectKind) -> Option<Self> {
        match kind {
            ObjectKind::Commit => Some(Self::Commit),
            ObjectKind::Table => Some(Self::Table),
            ObjectKind::Block => Some(Self::Block),
            ObjectKind::BlockIndex => None,
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.object_kind().fmt(f)
    }
}
