//! Ratchet Verdict - what each run observation means for its branch
//!
//! Maps run states and comparison results onto branch standing:
//! - [`assess`]: per-branch disposition (fix path, early discard, hold)
//! - [`promote_finalists`]: batch-level winner/loser split from win counts
//!
//! Failed and crashed runs never receive a verdict; they are routed to
//! diagnosis. Ties at the top of a batch are promoted together, never
//! broken automatically.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod promote;
mod verdict;

pub use promote::{promote_finalists, Promotion};
pub use verdict::{assess, Disposition, Verdict, VerdictPolicy};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
