//! HTTP Range request parsing module
//!
//! `Range` header parsing for partial downloads, compliant with RFC 7233.
//! Multiple ranges are kept in request order and never merged.

/// One satisfiable byte range: `[start, start + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub length: u64,
}

impl ByteRange {
    /// Last byte position (inclusive); only meaningful for non-empty ranges
    #[inline]
    pub const fn end(&self) -> u64 {
        self.start + self.length - 1
    }

    /// `Content-Range` value for this range within a resource of `size` bytes
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{size}", self.start, self.end())
    }
}

/// Range header parse failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    /// Not a `bytes=` range set, or a spec with broken syntax
    #[error("invalid range")]
    Invalid,
    /// Syntactically valid, but no spec overlaps the content - should return 416
    #[error("invalid range: failed to overlap")]
    NoOverlap,
}

/// Parse a `Range` header against a resource of `size` bytes
///
/// Supported specs, any number of them separated by commas:
/// - `bytes=start-end` - Specific range, `end` clamped to the last byte
/// - `bytes=start-` - From start to end
/// - `bytes=-suffix` - Last suffix bytes, clamped to the whole resource
///
/// An absent or empty header yields no ranges.
///
/// # Examples
/// ```
/// use rust_fileserver::http::range::{parse_range, ByteRange, RangeError};
///
/// let ranges = parse_range(Some("bytes=0-99"), 1000).unwrap();
/// assert_eq!(ranges, vec![ByteRange { start: 0, length: 100 }]);
///
/// assert_eq!(parse_range(Some("bytes=5000-"), 1000), Err(RangeError::NoOverlap));
/// assert!(parse_range(None, 1000).unwrap().is_empty());
/// ```
pub fn parse_range(range_header: Option<&str>, size: u64) -> Result<Vec<ByteRange>, RangeError> {
    let Some(header) = range_header.filter(|h| !h.is_empty()) else {
        return Ok(Vec::new());
    };

    let Some(specs) = header.strip_prefix("bytes=") else {
        return Err(RangeError::Invalid);
    };

    let mut ranges = Vec::new();
    let mut no_overlap = false;
    for spec in specs.split(',').map(str::trim) {
        if spec.is_empty() {
            continue;
        }
        let Some((start_str, end_str)) = spec.split_once('-') else {
            return Err(RangeError::Invalid);
        };
        let (start_str, end_str) = (start_str.trim(), end_str.trim());

        let range = if start_str.is_empty() {
            parse_suffix_range(end_str, size)?
        } else {
            parse_standard_range(start_str, end_str, size)?
        };
        match range {
            Some(r) => ranges.push(r),
            None => no_overlap = true,
        }
    }

    if no_overlap && ranges.is_empty() {
        return Err(RangeError::NoOverlap);
    }
    Ok(ranges)
}

/// Parse suffix range (e.g., "-500"); `None` when it selects no bytes
fn parse_suffix_range(suffix_str: &str, size: u64) -> Result<Option<ByteRange>, RangeError> {
    let suffix = parse_position(suffix_str)?;
    if suffix == 0 || size == 0 {
        return Ok(None);
    }

    // Suffix larger than the content selects all of it
    let start = size - suffix.min(size);
    Ok(Some(ByteRange {
        start,
        length: size - start,
    }))
}

/// Parse standard range (e.g., "0-99" or "100-"); `None` when it starts past the end
fn parse_standard_range(
    start_str: &str,
    end_str: &str,
    size: u64,
) -> Result<Option<ByteRange>, RangeError> {
    let start = parse_position(start_str)?;
    if start >= size {
        return Ok(None);
    }

    let end = if end_str.is_empty() {
        size - 1
    } else {
        let end = parse_position(end_str)?;
        if end < start {
            return Err(RangeError::Invalid);
        }
        end.min(size - 1)
    };
    Ok(Some(ByteRange {
        start,
        length: end - start + 1,
    }))
}

fn parse_position(s: &str) -> Result<u64, RangeError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Invalid);
    }
    s.parse().map_err(|_| RangeError::Invalid)
}

/// Total number of bytes selected by `ranges`, saturating at `u64::MAX`
pub fn sum_ranges_size(ranges: &[ByteRange]) -> u64 {
    ranges.iter().map(|r| r.length).fold(0, u64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;

    const fn br(start: u64, length: u64) -> ByteRange {
        ByteRange { start, length }
    }

    #[test]
    fn test_no_range() {
        assert_eq!(parse_range(None, 100), Ok(vec![]));
        assert_eq!(parse_range(Some(""), 100), Ok(vec![]));
    }

    #[test]
    fn test_standard_range() {
        assert_eq!(parse_range(Some("bytes=0-9"), 100), Ok(vec![br(0, 10)]));
        for (start, end) in [(0, 0), (3, 7), (99, 99), (0, 99)] {
            let header = format!("bytes={start}-{end}");
            assert_eq!(
                parse_range(Some(&header), 100),
                Ok(vec![br(start, end - start + 1)])
            );
        }
    }

    #[test]
    fn test_open_range() {
        assert_eq!(parse_range(Some("bytes=50-"), 100), Ok(vec![br(50, 50)]));
    }

    #[test]
    fn test_end_clamped_to_size() {
        let ranges = parse_range(Some("bytes=50-149"), 100).unwrap();
        assert_eq!(ranges, vec![br(50, 50)]);
        assert_eq!(ranges[0].content_range(100), "bytes 50-99/100");
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(parse_range(Some("bytes=-20"), 100), Ok(vec![br(80, 20)]));
        assert_eq!(parse_range(Some("bytes=-500"), 100), Ok(vec![br(0, 100)]));
    }

    #[test]
    fn test_multiple_ranges_keep_order() {
        assert_eq!(
            parse_range(Some("bytes=5-6, 0-0 ,,-1"), 10),
            Ok(vec![br(5, 2), br(0, 1), br(9, 1)])
        );
    }

    #[test]
    fn test_not_satisfiable() {
        assert_eq!(parse_range(Some("bytes=200-"), 100), Err(RangeError::NoOverlap));
        assert_eq!(
            parse_range(Some("bytes=100-150,300-400"), 100),
            Err(RangeError::NoOverlap)
        );
        assert_eq!(parse_range(Some("bytes=-0"), 100), Err(RangeError::NoOverlap));
        assert_eq!(parse_range(Some("bytes=0-"), 0), Err(RangeError::NoOverlap));
    }

    #[test]
    fn test_partial_overlap_drops_out_of_bounds_specs() {
        assert_eq!(
            parse_range(Some("bytes=200-300,0-1"), 100),
            Ok(vec![br(0, 2)])
        );
    }

    #[test]
    fn test_invalid_format() {
        for header in [
            "bytes=a-b",
            "bytes=5",
            "bytes=9-3",
            "bytes=-",
            "bytes=--5",
            "bytes=1-2-3",
            "items=0-1",
            "0-1",
            "bytes=0-1,x-2",
        ] {
            assert_eq!(parse_range(Some(header), 100), Err(RangeError::Invalid), "{header}");
        }
    }

    #[test]
    fn test_sum_ranges_size() {
        assert_eq!(sum_ranges_size(&[]), 0);
        assert_eq!(sum_ranges_size(&[br(0, 60), br(10, 60)]), 120);
    }

    #[test]
    fn test_sum_ranges_size_saturates() {
        let size = u64::MAX - 1;
        let ranges = parse_range(Some("bytes=0-,0-,0-"), size).unwrap();
        assert_eq!(ranges.len(), 3);
        assert_eq!(sum_ranges_size(&ranges), u64::MAX);
        assert!(sum_ranges_size(&ranges) > size);
    }
}
