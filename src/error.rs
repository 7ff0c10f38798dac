//! Error kinds raised while decoding DVB subtitle segments.

use std::collections::TryReserveError;
use std::io::Error as IoError;

use thiserror::Error as ThisError;

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Everything that can go wrong inside the decoder.
///
/// Only [`DecodeError::OutOfMemory`] escapes [`crate::DvbDecoder::decode`];
/// the other kinds abort the segment or object they occur in and are counted
/// in [`crate::Diagnostics`].
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A byte or bit read ran past the declared end of its field.
    #[error("truncated {0}")]
    Truncated(&'static str),
    /// A value outside its permitted range.
    #[error("malformed {0}")]
    Malformed(String),
    /// Recognized by the standard but not implemented here.
    #[error("unsupported {0}")]
    Unsupported(String),
    /// The OCR collaborator could not be created.
    #[error("OCR engine could not be initialized")]
    OcrInitFailed,
    #[error("failed to allocate {0} bytes")]
    OutOfMemory(usize),
}

impl DecodeError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub(crate) fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    /// Whether this error must be surfaced to the host instead of being
    /// absorbed by the segment loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::OutOfMemory(_))
    }
}

impl From<IoError> for DecodeError {
    fn from(_: IoError) -> Self {
        Self::Truncated("segment data")
    }
}

/// Allocate a buffer of `len` bytes set to `fill` without aborting on failure.
pub(crate) fn try_alloc(len: usize, fill: u8) -> DecodeResult<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_: TryReserveError| DecodeError::OutOfMemory(len))?;
    buf.resize(len, fill);
    Ok(buf)
}
