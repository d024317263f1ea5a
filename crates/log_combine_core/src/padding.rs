use std::sync::OnceLock;

use crate::contract::ValidationError;

/// Size of the filler block, equal to the multipart copy primitive's
/// minimum part size. Every part except the last must be at least this
/// large, so the scratch object is seeded with a block of exactly this
/// size and the block is stripped again before publishing.
pub const FILLER_LEN: u64 = 5 * 1024 * 1024;

static FILLER: OnceLock<Vec<u8>> = OnceLock::new();

/// Process-scoped filler buffer, built once and reused across jobs.
pub fn filler_block() -> &'static [u8] {
    FILLER.get_or_init(|| vec![b'0'; FILLER_LEN as usize])
}

/// Inclusive byte range within an object, in the copy primitive's
/// `bytes=start-end` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end_inclusive: u64,
}

impl ByteRange {
    /// Number of bytes covered; always at least 1, the range is inclusive.
    pub fn byte_count(&self) -> u64 {
        self.end_inclusive - self.start + 1
    }

    pub fn to_copy_source_range(&self) -> String {
        format!("bytes={}-{}", self.start, self.end_inclusive)
    }
}

/// Locates the real payload inside a scratch object of `total_bytes`,
/// skipping the leading filler block. `Ok(None)` means the scratch object
/// is filler-only and the payload is empty.
pub fn payload_range(
    total_bytes: u64,
    filler_len: u64,
) -> Result<Option<ByteRange>, ValidationError> {
    if total_bytes < filler_len {
        return Err(ValidationError::new(format!(
            "scratch object is smaller than the filler block ({total_bytes} < {filler_len} bytes)"
        )));
    }
    if total_bytes == filler_len {
        return Ok(None);
    }
    Ok(Some(ByteRange {
        start: filler_len,
        end_inclusive: total_bytes - 1,
    }))
}
