//! Byte-range evaluation for partial-content responses.
//!
//! Only single ranges are served. Multi-range and malformed headers degrade
//! to a full-body response; ranges that lie entirely past the end of the
//! payload are unsatisfiable and map to 416.

/// An inclusive byte range within a payload of known total length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ranges are non-empty by construction.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// How a `Range` request header applies to a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOutcome {
    /// Serve the whole payload with 200.
    Full,
    /// Serve the given slice with 206 and a `Content-Range` header.
    Partial(ByteRange),
    /// No byte of the request lies within the payload; respond 416.
    Unsatisfiable,
}

/// Evaluates a `Range` header value against a payload of `total` bytes.
pub fn evaluate(header: &str, total: u64) -> RangeOutcome {
    let Some(spec) = strip_bytes_unit(header) else {
        return RangeOutcome::Full;
    };

    // Multi-range requests are not served; fall back to the full payload.
    if spec.contains(',') {
        return RangeOutcome::Full;
    }

    let Some((first, last)) = spec.split_once('-') else {
        return RangeOutcome::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    match (parse_part(first), parse_part(last)) {
        // "a-b": explicit range, end clamped to the payload
        (Some(Some(start)), Some(Some(end))) => {
            if start > end {
                RangeOutcome::Full
            } else if start >= total {
                RangeOutcome::Unsatisfiable
            } else {
                RangeOutcome::Partial(ByteRange {
                    start,
                    end: end.min(total - 1),
                })
            }
        }
        // "a-": from offset to the end
        (Some(Some(start)), Some(None)) => {
            if start >= total {
                RangeOutcome::Unsatisfiable
            } else {
                RangeOutcome::Partial(ByteRange {
                    start,
                    end: total - 1,
                })
            }
        }
        // "-n": the final n bytes
        (Some(None), Some(Some(suffix))) => {
            if suffix == 0 || total == 0 {
                RangeOutcome::Unsatisfiable
            } else {
                RangeOutcome::Partial(ByteRange {
                    start: total.saturating_sub(suffix),
                    end: total - 1,
                })
            }
        }
        _ => RangeOutcome::Full,
    }
}

/// Strips the `bytes=` unit prefix, case-insensitively. Returns the range
/// spec, or `None` when the unit is unknown or missing.
fn strip_bytes_unit(header: &str) -> Option<&str> {
    let (unit, spec) = header.trim().split_once('=')?;
    if unit.trim().eq_ignore_ascii_case("bytes") {
        Some(spec.trim())
    } else {
        None
    }
}

/// `Some(None)` for an empty part, `Some(Some(n))` for a number, `None` for garbage.
fn parse_part(part: &str) -> Option<Option<u64>> {
    if part.is_empty() {
        Some(None)
    } else {
        part.parse::<u64>().ok().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_range() {
        assert_eq!(
            evaluate("bytes=0-99", 500),
            RangeOutcome::Partial(ByteRange { start: 0, end: 99 })
        );
        assert_eq!(
            evaluate("bytes=100-199", 500),
            RangeOutcome::Partial(ByteRange {
                start: 100,
                end: 199
            })
        );
    }

    #[test]
    fn test_open_and_suffix_ranges() {
        assert_eq!(
            evaluate("bytes=450-", 500),
            RangeOutcome::Partial(ByteRange {
                start: 450,
                end: 499
            })
        );
        assert_eq!(
            evaluate("bytes=-100", 500),
            RangeOutcome::Partial(ByteRange {
                start: 400,
                end: 499
            })
        );
        // suffix longer than the payload covers all of it
        assert_eq!(
            evaluate("bytes=-9999", 500),
            RangeOutcome::Partial(ByteRange { start: 0, end: 499 })
        );
    }

    #[test]
    fn test_end_clamped_to_payload() {
        assert_eq!(
            evaluate("bytes=400-9999", 500),
            RangeOutcome::Partial(ByteRange {
                start: 400,
                end: 499
            })
        );
    }

    #[test]
    fn test_unsatisfiable() {
        assert_eq!(evaluate("bytes=9999-", 500), RangeOutcome::Unsatisfiable);
        assert_eq!(evaluate("bytes=500-600", 500), RangeOutcome::Unsatisfiable);
        assert_eq!(evaluate("bytes=-0", 500), RangeOutcome::Unsatisfiable);
        assert_eq!(evaluate("bytes=0-", 0), RangeOutcome::Unsatisfiable);
    }

    #[test]
    fn test_malformed_falls_back_to_full() {
        assert_eq!(evaluate("bytes=10-5", 500), RangeOutcome::Full);
        assert_eq!(evaluate("bytes=abc-def", 500), RangeOutcome::Full);
        assert_eq!(evaluate("bytes=", 500), RangeOutcome::Full);
        assert_eq!(evaluate("bytes=-", 500), RangeOutcome::Full);
        assert_eq!(evaluate("items=0-10", 500), RangeOutcome::Full);
        assert_eq!(evaluate("garbage", 500), RangeOutcome::Full);
    }

    #[test]
    fn test_multi_range_falls_back_to_full() {
        assert_eq!(evaluate("bytes=0-1,3-4", 500), RangeOutcome::Full);
    }

    #[test]
    fn test_unit_is_case_insensitive() {
        assert_eq!(
            evaluate("BYTES=0-0", 500),
            RangeOutcome::Partial(ByteRange { start: 0, end: 0 })
        );
    }
}
