//! Persistence of trained forests.
//!
//! The native archive is a fixed header with a CRC32 over a postcard
//! payload holding the [`RawForest`](crate::forest::RawForest) buffers.

pub mod native;
pub mod payload;

pub use native::{
    DeserializeError, FormatFlags, FormatHeader, NativeCodec, SerializeError,
    CURRENT_VERSION_MAJOR, CURRENT_VERSION_MINOR, HEADER_SIZE, MAGIC,
};
pub use payload::{ForestArchive, ForestMetadata, Payload};
