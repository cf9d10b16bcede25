//! Commit DAG walking for wrgl.
//!
//! [`CommitsQueue`] walks history newest-first from a set of tips, the way a
//! negotiation walks local refs. [`is_ancestor_of`] and [`ancestors`] answer
//! reachability questions for fast-forward checks and common-set tracking.

pub mod ancestry;
pub mod error;
pub mod queue;

pub use ancestry::{ancestors, is_ancestor_of};
pub use error::{DagError, DagResult};
pub use queue::CommitsQueue;
