//! Crescent decision trees.
//!
//! - [`PreTree`]: one tree under construction, grown by committing splits.
//! - [`Crit`]: a single splitting test.
//! - [`SplitBits`]: factor-split membership bits.

mod bits;
mod crit;
mod merge;
mod pretree;

pub use bits::{SplitBits, SLOT_BITS};
pub use crit::{Crit, SplitVal};
pub use pretree::{PreTree, PreTreeError, PtId, PtNode};
