//! Byte-range arithmetic for chunk boundaries and acknowledged sizes.

use std::fmt;

use crate::TransferError;
use crate::status::UploadStatus;

/// Number of chunks needed for `total_size` bytes: `ceil(total_size / chunk_size)`.
///
/// `chunk_size` is expected to be non-zero; a zero value is treated as 1.
pub fn total_parts(total_size: u64, chunk_size: usize) -> u64 {
    total_size.div_ceil(chunk_size.max(1) as u64)
}

/// Size of chunk `index`: `min(chunk_size, total_size - index * chunk_size)`, never negative.
///
/// Zero means there is nothing left to send for this index.
pub fn part_size(index: u64, chunk_size: usize, total_size: u64) -> u64 {
    let chunk = chunk_size as u64;
    let offset = index.saturating_mul(chunk);
    total_size.saturating_sub(offset).min(chunk)
}

/// Value of a `Content-Range` request header.
///
/// The first chunk declares `to = part_size` rather than the inclusive
/// `part_size - 1`. Receivers of this protocol depend on that, so it is
/// kept as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub from: u64,
    pub to: u64,
    pub total: u64,
}

impl ContentRange {
    /// Computes the declared range for chunk `index`.
    pub fn for_part(index: u64, chunk_size: usize, part_size: u64, total_size: u64) -> Self {
        if index == 0 {
            return Self {
                from: 0,
                to: part_size,
                total: total_size,
            };
        }

        let chunk = chunk_size as u64;
        let from = chunk.saturating_mul(index);
        let to = chunk
            .saturating_mul(index + 1)
            .min(total_size.saturating_sub(1));
        Self {
            from,
            to,
            total: total_size,
        }
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bytes {}-{}/{}", self.from, self.to, self.total)
    }
}

/// Extracts the `to` offset from a server-reported `"{from}-{to}/{total}"` body.
///
/// Returns `Ok(None)` for a blank body. Any other body must carry a range;
/// an optional `bytes ` prefix and surrounding whitespace are accepted.
pub fn parse_accepted_range(body: &str) -> Result<Option<u64>, TransferError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let range = trimmed.strip_prefix("bytes ").unwrap_or(trimmed);
    let span = range.split('/').next().unwrap_or(range);
    let (_, to) = span
        .split_once('-')
        .ok_or_else(|| TransferError::Parse(trimmed.to_string()))?;

    to.trim()
        .parse::<u64>()
        .map(Some)
        .map_err(|e| TransferError::Parse(format!("{trimmed}: {e}")))
}

/// Returns how many bytes the last accepted chunk adds to `status.transferred_size`.
///
/// A range reported in the response body wins over `part_size`. Either way
/// the result is capped so the running total never passes `status.total_size`.
pub fn reconcile_transferred_size(
    body: &str,
    part_size: u64,
    status: &UploadStatus,
) -> Result<u64, TransferError> {
    let delta = parse_accepted_range(body)?.unwrap_or(part_size);
    let remaining = status.total_size.saturating_sub(status.transferred_size);
    Ok(delta.min(remaining))
}
