//! Observation data: run-length encoding, frames and layout.
//!
//! # Key Types
//!
//! - [`RunLengthEncoder`] / [`RleRun`]: column encoding into rank runs
//! - [`SparseMatrix`]: sparse numeric input in CSC, CSR or coordinate form
//! - [`ObservationFrame`] / [`ObservationFrameBuilder`]: per-predictor runs
//! - [`Layout`]: dense (implicit rank) vs explicit storage and row lookups
//! - [`TrainFrame`]: the read-only view consumed by training

mod error;
mod frame;
mod layout;
mod rle;
mod sparse;
mod train_frame;

pub use error::FrameError;
pub use frame::{ObservationFrame, ObservationFrameBuilder, PredictorKind, MAX_ROWS};
pub use layout::{ImplExpl, Layout, RankCursor};
pub use rle::{scatter_ranks, ColumnValues, EncodedColumn, Rank, RleRun, RunLengthEncoder, ValueRun};
pub use sparse::{SparseConvention, SparseMatrix};
pub use train_frame::TrainFrame;
