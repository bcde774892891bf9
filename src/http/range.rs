//! HTTP Range request parsing module
//!
//! Single `bytes=` ranges for resumable downloads (RFC 7233). Multi-range
//! requests are answered with the full body.

/// An inclusive byte range already clamped to the file size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

impl ByteRange {
    /// Number of bytes covered by the range
    pub const fn content_length(self) -> usize {
        self.end - self.start + 1
    }

    /// Value of the `Content-Range` header for this range
    pub fn content_range(self, total_size: usize) -> String {
        format!("bytes {}-{}/{total_size}", self.start, self.end)
    }
}

/// What a `Range` header asks for
#[derive(Debug, PartialEq, Eq)]
pub enum RangeOutcome {
    /// No usable Range header, send the whole body
    Full,
    /// Send only this part (206)
    Partial(ByteRange),
    /// The range lies outside the file (416)
    Unsatisfiable,
}

/// Parse a `Range` header against a body of `file_size` bytes
///
/// Supported forms: `bytes=start-end`, `bytes=start-`, `bytes=-suffix`.
/// Anything malformed or using another unit yields [`RangeOutcome::Full`].
///
/// # Examples
/// ```
/// use upserve::http::range::{parse_range_header, ByteRange, RangeOutcome};
///
/// assert_eq!(
///     parse_range_header(Some("bytes=0-99"), 1000),
///     RangeOutcome::Partial(ByteRange { start: 0, end: 99 })
/// );
/// assert_eq!(parse_range_header(None, 1000), RangeOutcome::Full);
/// ```
pub fn parse_range_header(range_header: Option<&str>, file_size: usize) -> RangeOutcome {
    let Some(spec) = range_header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeOutcome::Full;
    };
    if spec.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = spec.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        return suffix_range(last, file_size);
    }

    let Ok(start) = first.parse::<usize>() else {
        return RangeOutcome::Full;
    };
    if start >= file_size {
        return RangeOutcome::Unsatisfiable;
    }

    let end = if last.is_empty() {
        file_size - 1
    } else {
        match last.parse::<usize>() {
            Ok(e) => e.min(file_size - 1),
            Err(_) => return RangeOutcome::Full,
        }
    };

    if start > end {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Partial(ByteRange { start, end })
}

/// Last `n` bytes, e.g. `-500`
fn suffix_range(last: &str, file_size: usize) -> RangeOutcome {
    let Ok(suffix) = last.parse::<usize>() else {
        return RangeOutcome::Full;
    };
    if suffix == 0 || file_size == 0 {
        return RangeOutcome::Unsatisfiable;
    }
    RangeOutcome::Partial(ByteRange {
        start: file_size.saturating_sub(suffix),
        end: file_size - 1,
    })
}
