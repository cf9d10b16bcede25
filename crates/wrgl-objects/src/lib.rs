//! Content-addressed objects for wrgl.
//!
//! A repository is a Merkle DAG of [`Commit`]s. Each commit points at one
//! [`Table`], and a table is split into fixed-size [`Block`]s of rows so
//! that two repositories can exchange only the blocks the other side lacks.
//! Every object is stored under the domain-separated BLAKE3 sum of its
//! encoded bytes.
//!
//! # Storage
//!
//! All backends implement [`ObjectStore`]; [`InMemoryObjectStore`] is the
//! `HashMap`-backed implementation used by tests and embedders.

pub mod error;
pub mod hasher;
pub mod index;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use hasher::ContentHasher;
pub use index::{build_table, index_table};
pub use memory::InMemoryObjectStore;
pub use object::{
    row_key, Block, BlockIndex, Commit, ObjectKind, StoredObject, Table, BLOCK_SIZE,
};
pub use traits::ObjectStore;
