//! Training view of an observation frame.

use super::error::FrameError;
use super::frame::{ObservationFrame, PredictorKind};
use super::layout::{Layout, RankCursor};
use super::rle::Rank;
use crate::utils::Parallelism;

/// Observation frame plus layout and predictor-type bookkeeping.
///
/// Built once before training and shared read-only by every tree.
#[derive(Debug, Clone)]
pub struct TrainFrame {
    frame: ObservationFrame,
    layout: Layout,
    missing: Vec<Option<Rank>>,
}

impl TrainFrame {
    /// Lays out `frame` with the given auto-compression threshold.
    ///
    /// # Errors
    ///
    /// [`FrameError::InvalidAutoCompress`] unless `0 <= auto_compress <= 1`.
    pub fn new(
        frame: ObservationFrame,
        auto_compress: f64,
        parallelism: Parallelism,
    ) -> Result<Self, FrameError> {
        let layout = Layout::new(&frame, auto_compress, parallelism)?;
        let missing = (0..frame.n_pred())
            .map(|pred| detect_missing(&frame, pred))
            .collect();
        Ok(Self { frame, layout, missing })
    }

    #[inline]
    pub fn frame(&self) -> &ObservationFrame {
        &self.frame
    }

    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    #[inline]
    pub fn n_row(&self) -> usize {
        self.frame.n_row()
    }

    #[inline]
    pub fn n_pred(&self) -> usize {
        self.frame.n_pred()
    }

    #[inline]
    pub fn n_pred_num(&self) -> usize {
        self.frame.n_pred_num()
    }

    #[inline]
    pub fn n_pred_fac(&self) -> usize {
        self.frame.n_pred_fac()
    }

    #[inline]
    pub fn fac_first(&self) -> usize {
        self.frame.fac_first()
    }

    #[inline]
    pub fn kind(&self, pred: usize) -> PredictorKind {
        self.frame.kind(pred)
    }

    #[inline]
    pub fn is_factor(&self, pred: usize) -> bool {
        self.frame.is_factor(pred)
    }

    /// Position of `pred` among factor predictors.
    #[inline]
    pub fn fac_index(&self, pred: usize) -> Option<usize> {
        pred.checked_sub(self.frame.n_pred_num())
    }

    #[inline]
    pub fn cardinality(&self, pred: usize) -> Option<u32> {
        self.frame.cardinality(pred)
    }

    /// Largest factor cardinality, zero without factors.
    pub fn card_extent(&self) -> u32 {
        self.frame.cardinalities().iter().copied().max().unwrap_or(0)
    }

    #[inline]
    pub fn rank_count(&self, pred: usize) -> usize {
        self.frame.rank_count(pred)
    }

    /// Rank holding missing observations: the NaN rank of a numeric
    /// predictor, or the out-of-range sentinel of a factor.
    #[inline]
    pub fn missing_rank(&self, pred: usize) -> Option<Rank> {
        self.missing[pred]
    }

    /// Maps a possibly fractional rank of a numeric predictor back to its
    /// original units by linear interpolation between neighbouring ranks.
    ///
    /// Ranks past the last non-missing value clamp to that value, so a cut
    /// separating missing observations from the rest stays finite. Returns
    /// `None` for factor predictors and columns without a non-missing value.
    pub fn interpolate(&self, pred: usize, rank: f64) -> Option<f64> {
        let values = self.frame.num_values(pred)?;
        let n_value = self.missing[pred].map_or(values.len(), |missing| missing as usize);
        let last = n_value.min(values.len()).checked_sub(1)?;
        let floor = rank.floor().max(0.0);
        let lo = (floor as usize).min(last);
        let hi = (rank.ceil().max(0.0) as usize).min(last);
        let val_floor = values[lo];
        let val_ceil = values[hi];
        Some(val_floor + (rank - floor) * (val_ceil - val_floor))
    }

    #[inline]
    pub fn rank_at(&self, pred: usize, row: usize) -> Rank {
        self.layout.rank_at(pred, row)
    }

    #[inline]
    pub fn cursor(&self, pred: usize) -> RankCursor<'_> {
        self.layout.cursor(pred)
    }
}

fn detect_missing(frame: &ObservationFrame, pred: usize) -> Option<Rank> {
    match frame.cardinality(pred) {
        Some(card) => frame
            .runs(pred)
            .iter()
            .any(|r| r.rank >= card)
            .then_some(card),
        None => {
            let values = frame.num_values(pred)?;
            match values.last() {
                Some(v) if v.is_nan() => Some((values.len() - 1) as Rank),
                _ => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ObservationFrameBuilder;
    use approx::assert_relative_eq;

    fn train_frame() -> TrainFrame {
        let frame = ObservationFrameBuilder::new(5)
            .numeric_column(&[3.1, 1.0, 1.0, 7.2, f64::NAN])
            .numeric_column(&[1.0, 2.0, 3.0, 4.0, 5.0])
            .factor_column(&[0, 1, 4, 1, 0], 3)
            .factor_column(&[0, 1, 2, 1, 0], 3)
            .build(Parallelism::Sequential)
            .unwrap();
        TrainFrame::new(frame, 0.25, Parallelism::Sequential).unwrap()
    }

    #[test]
    fn test_predictor_ranges() {
        let tf = train_frame();
        assert_eq!(tf.n_pred_num(), 2);
        assert_eq!(tf.n_pred_fac(), 2);
        assert_eq!(tf.fac_first(), 2);
        assert!(!tf.is_factor(1));
        assert!(tf.is_factor(2));
        assert_eq!(tf.fac_index(3), Some(1));
        assert_eq!(tf.fac_index(0), None);
        assert_eq!(tf.card_extent(), 3);
    }

    #[test]
    fn test_missing_ranks() {
        let tf = train_frame();
        assert_eq!(tf.missing_rank(0), Some(3));
        assert_eq!(tf.missing_rank(1), None);
        assert_eq!(tf.missing_rank(2), Some(3));
        assert_eq!(tf.missing_rank(3), None);
        assert_eq!(tf.rank_count(2), 4);
    }

    #[test]
    fn test_interpolate_between_ranks() {
        let tf = train_frame();
        assert_relative_eq!(tf.interpolate(0, 0.5).unwrap(), 2.05, epsilon = 1e-12);
        assert_relative_eq!(tf.interpolate(0, 1.0).unwrap(), 3.1);
        assert_relative_eq!(tf.interpolate(1, 2.25).unwrap(), 3.25);
        assert_eq!(tf.interpolate(2, 0.5), None);
    }

    #[test]
    fn test_interpolate_never_reaches_missing_rank() {
        let tf = train_frame();
        // Ranks 0..=2 hold 1.0, 3.1 and 7.2; rank 3 is NaN.
        assert_relative_eq!(tf.interpolate(0, 2.0).unwrap(), 7.2);
        assert_relative_eq!(tf.interpolate(0, 2.5).unwrap(), 7.2);
        assert!(!tf.interpolate(0, 2.99).unwrap().is_nan());
    }

    #[test]
    fn test_rank_lookup_matches_frame() {
        let tf = train_frame();
        for pred in 0..tf.n_pred() {
            let expected = tf.frame().row_ranks(pred);
            for (row, &rank) in expected.iter().enumerate() {
                assert_eq!(tf.rank_at(pred, row), rank);
            }
        }
    }
}
