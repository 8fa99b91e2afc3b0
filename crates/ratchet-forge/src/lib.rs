//! Code-host integration: reviews, merges, reverts, and the trunk
//!
//! The [`CodeHost`] trait is the seam to whatever holds the repository.
//! [`MemoryForge`] is the in-process implementation used by tests and
//! dry runs; it models conflicts through declared touched paths so
//! merge-order behavior can be exercised without a real host.
//!
//! Trunk mutations go through [`Trunk`] / [`TrunkWriter`], which hand
//! out at most one writer at a time. History is append-only: a revert
//! is a new commit, never a rewrite.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod host;
pub mod memory;
pub mod trunk;
pub mod types;

pub use error::ForgeError;
pub use host::CodeHost;
pub use memory::MemoryForge;
pub use trunk::{Trunk, TrunkWriter, WriterBusy};
pub use types::{CommitId, Issue, MergeReceipt, Review, ReviewId, ReviewState};
