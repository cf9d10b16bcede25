//! Foundation types for wrgl.
//!
//! Every object a wrgl repository stores (commits, tables, blocks and block
//! indices) is addressed by an [`ObjectSum`]. Every other wrgl crate depends
//! on `wrgl-types`.

pub mod error;
pub mod sum;

pub use error::TypeError;
pub use sum::{ObjectSum, SUM_LEN};
