//! Native archive format for trained forests.
//!
//! A 32-byte header followed by a postcard-encoded [`Payload`].
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    Header (32 bytes)                        │
//! ├────────────────────────────────────────────────────────────┤
//! │                    Payload (variable)                       │
//! └────────────────────────────────────────────────────────────┘
//! ```

use std::io::{Read, Write};

use thiserror::Error;

use super::payload::{ForestArchive, Payload};

// ============================================================================
// Constants
// ============================================================================

/// Magic bytes identifying a forest archive.
pub const MAGIC: &[u8; 4] = b"ARBF";

pub const CURRENT_VERSION_MAJOR: u8 = 1;

pub const CURRENT_VERSION_MINOR: u8 = 0;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 32;

// ============================================================================
// Format Flags
// ============================================================================

/// Bitfield of archive features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatFlags(u16);

impl FormatFlags {
    /// Forest contains factor splits.
    pub const HAS_FACTORS: u16 = 1 << 0;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }
}

// ============================================================================
// Format Header
// ============================================================================

/// 32-byte archive header.
///
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       4     Magic ("ARBF")
/// 4       1     Version major
/// 5       1     Version minor
/// 6       2     Flags (bitfield)
/// 8       4     Payload size (bytes)
/// 12      4     CRC32 checksum of payload
/// 16      4     Number of trees
/// 20      4     Number of predictors
/// 24      8     Reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub flags: FormatFlags,
    pub payload_size: u32,
    pub checksum: u32,
    pub n_tree: u32,
    pub n_pred: u32,
}

impl FormatHeader {
    pub fn new(n_tree: u32, n_pred: u32) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            flags: FormatFlags::empty(),
            payload_size: 0,
            checksum: 0,
            n_tree,
            n_pred,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[6..8].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[8..12].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        buf[16..20].copy_from_slice(&self.n_tree.to_le_bytes());
        buf[20..24].copy_from_slice(&self.n_pred.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, DeserializeError> {
        if &buf[0..4] != MAGIC {
            return Err(DeserializeError::NotAnArchive);
        }
        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(DeserializeError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }
        let le_u32 = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);

        Ok(Self {
            version_major,
            version_minor,
            flags: FormatFlags::from_bits(u16::from_le_bytes([buf[6], buf[7]])),
            payload_size: le_u32(8),
            checksum: le_u32(12),
            n_tree: le_u32(16),
            n_pred: le_u32(20),
        })
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    #[error("payload of {0} bytes exceeds the format limit")]
    TooLarge(usize),
}

#[derive(Debug, Error)]
pub enum DeserializeError {
    #[error("not a forest archive")]
    NotAnArchive,

    #[error("archive requires format {major}.{minor} or later")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("archive truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding error: {0}")]
    Decoding(#[from] postcard::Error),
}

/// CRC32 of `data`.
pub fn compute_checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

// ============================================================================
// Native Codec
// ============================================================================

/// Reads and writes forest archives.
#[derive(Debug, Clone, Default)]
pub struct NativeCodec;

impl NativeCodec {
    pub fn new() -> Self {
        Self
    }

    /// Writes header and payload, filling in size and checksum.
    pub fn write_to<W: Write>(
        &self,
        writer: &mut W,
        header: &mut FormatHeader,
        payload: &[u8],
    ) -> Result<(), SerializeError> {
        header.payload_size =
            u32::try_from(payload.len()).map_err(|_| SerializeError::TooLarge(payload.len()))?;
        header.checksum = compute_checksum(payload);
        writer.write_all(&header.to_bytes())?;
        writer.write_all(payload)?;
        Ok(())
    }

    /// Reads header and payload, verifying the checksum.
    pub fn read_from<R: Read>(
        &self,
        reader: &mut R,
    ) -> Result<(FormatHeader, Vec<u8>), DeserializeError> {
        let mut header_buf = [0u8; HEADER_SIZE];
        read_all(reader, &mut header_buf)?;
        let header = FormatHeader::from_bytes(&header_buf)?;

        let mut payload = vec![0u8; header.payload_size as usize];
        read_all(reader, &mut payload)?;

        let actual = compute_checksum(&payload);
        if actual != header.checksum {
            return Err(DeserializeError::ChecksumMismatch {
                expected: header.checksum,
                actual,
            });
        }
        Ok((header, payload))
    }

    /// Encodes a forest archive with its header.
    pub fn serialize(&self, archive: &ForestArchive) -> Result<Vec<u8>, SerializeError> {
        let payload = postcard::to_allocvec(&Payload::V1(archive.clone()))?;

        let mut header = FormatHeader::new(archive.forest.n_tree() as u32, archive.n_pred() as u32);
        if !archive.metadata.cardinality.is_empty() {
            header.flags.set(FormatFlags::HAS_FACTORS);
        }

        let mut out = Vec::with_capacity(HEADER_SIZE + payload.len());
        self.write_to(&mut out, &mut header, &payload)?;
        Ok(out)
    }

    /// Decodes and validates a forest archive.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<(FormatHeader, ForestArchive), DeserializeError> {
        let mut cursor = std::io::Cursor::new(bytes);
        let (header, payload) = self.read_from(&mut cursor)?;
        let Payload::V1(archive): Payload = postcard::from_bytes(&payload)?;

        if archive.forest.n_tree() != header.n_tree as usize
            || archive.n_pred() != header.n_pred as usize
        {
            return Err(DeserializeError::CorruptPayload(format!(
                "header declares {} trees over {} predictors, payload holds {} over {}",
                header.n_tree,
                header.n_pred,
                archive.forest.n_tree(),
                archive.n_pred()
            )));
        }
        if archive.pred_info.len() != archive.n_pred() {
            return Err(DeserializeError::CorruptPayload(format!(
                "{} info entries for {} predictors",
                archive.pred_info.len(),
                archive.n_pred()
            )));
        }
        archive
            .forest
            .validate()
            .map_err(|e| DeserializeError::CorruptPayload(e.to_string()))?;
        Ok((header, archive))
    }
}

fn read_all<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), DeserializeError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(DeserializeError::Truncated {
                    expected: buf.len(),
                    actual: filled,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(DeserializeError::Io(e)),
        }
    }
    Ok(())
}
