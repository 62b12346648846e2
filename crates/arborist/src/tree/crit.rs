//! Splitting criteria.

use serde::{Deserialize, Serialize};

/// Value carried by a criterion, keyed by predictor type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SplitVal {
    /// Numeric cut. Holds a (possibly fractional) rank until the forest's
    /// split update replaces it with a value in original units.
    NumericCut(f64),
    /// Offset of the criterion's first bit in the tree's split bits.
    FactorBits(usize),
}

/// One splitting test on one predictor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Crit {
    pub pred_idx: u32,
    pub val: SplitVal,
}

impl Crit {
    #[inline]
    pub fn cut(pred_idx: u32, cut: f64) -> Self {
        Self { pred_idx, val: SplitVal::NumericCut(cut) }
    }

    #[inline]
    pub fn bits(pred_idx: u32, offset: usize) -> Self {
        Self { pred_idx, val: SplitVal::FactorBits(offset) }
    }

    #[inline]
    pub fn is_factor(&self) -> bool {
        matches!(self.val, SplitVal::FactorBits(_))
    }
}
