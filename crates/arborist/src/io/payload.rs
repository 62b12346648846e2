//! Payload structures for the forest archive.
//!
//! Encoded with postcard behind the [`super::native`] header.

use serde::{Deserialize, Serialize};

use crate::data::TrainFrame;
use crate::forest::RawForest;

// ============================================================================
// Top-Level Payload
// ============================================================================

/// Version-tagged payload. New layouts add variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    V1(ForestArchive),
}

/// A trained forest with what prediction needs to decode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestArchive {
    pub metadata: ForestMetadata,
    pub forest: RawForest,
    /// Split info summed per predictor.
    pub pred_info: Vec<f64>,
}

impl ForestArchive {
    pub fn new(frame: &TrainFrame, forest: RawForest, pred_info: Vec<f64>) -> Self {
        Self {
            metadata: ForestMetadata::from_frame(frame),
            forest,
            pred_info,
        }
    }

    #[inline]
    pub fn n_pred(&self) -> usize {
        self.metadata.n_pred()
    }
}

// ============================================================================
// Metadata
// ============================================================================

/// Shape of the training frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestMetadata {
    pub n_row: u64,
    pub n_pred_num: u32,
    /// Training cardinality of each factor predictor.
    pub cardinality: Vec<u32>,
    /// Free-form key/value attributes.
    pub attributes: Vec<(String, String)>,
}

impl ForestMetadata {
    pub fn from_frame(frame: &TrainFrame) -> Self {
        Self {
            n_row: frame.n_row() as u64,
            n_pred_num: frame.n_pred_num() as u32,
            cardinality: frame.frame().cardinalities().to_vec(),
            attributes: Vec::new(),
        }
    }

    #[inline]
    pub fn n_pred(&self) -> usize {
        self.n_pred_num as usize + self.cardinality.len()
    }

    /// Index of the first factor predictor.
    #[inline]
    pub fn fac_first(&self) -> usize {
        self.n_pred_num as usize
    }
}
