//! Reference management for wrgl.
//!
//! Refs are named pointers to commit sums: local branches (`heads/*`), tags
//! (`tags/*`) and remote tracking refs (`remotes/<remote>/*`). Every move of
//! a ref is recorded in its reflog.
//!
//! # Modules
//!
//! - [`error`]: Error types for ref operations
//! - [`types`]: [`Reflog`] entries and [`RefChange`] descriptions
//! - [`traits`]: The [`RefStore`] trait defining the storage interface
//! - [`names`]: Ref name validation
//! - [`memory`]: In-memory [`InMemoryRefStore`]

pub mod error;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use memory::InMemoryRefStore;
pub use names::{head_ref, remote_ref, validate_ref_name};
pub use traits::RefStore;
pub use types::{RefChange, Reflog};
