//! Bytes-allocated estimation from a captured run.
//!
//! The JVM does not report allocation directly, so every heap transition in
//! the GC log is counted as `before - after` bytes allocated. This is an
//! approximation: objects still live at exit, or dying without a collection
//! during the run, are not counted. Lines from the runtime's own counter
//! (`allocated <N>`) are added as-is.

use anyhow::Result;
use serde::Serialize;

use super::patterns::{ALLOCATED_RE, GC_TRANSITION_RE};
use crate::error::JtError;

/// Allocation measured in a single run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AllocationSample {
    /// Estimated bytes allocated
    pub bytes: i64,
    /// Number of lines that contributed to `bytes`
    pub matches: usize,
}

impl AllocationSample {
    /// Nothing in the trace was recognised. Not an error, but the result is
    /// almost certainly meaningless.
    pub fn is_degenerate(&self) -> bool {
        self.matches == 0
    }
}

pub fn memory_allocated(trace: &str) -> Result<AllocationSample> {
    let mut sample = AllocationSample::default();
    for line in trace.lines() {
        let bytes = if let Some(caps) = GC_TRANSITION_RE.captures(line) {
            let before = parse_count(&caps[1], line)?;
            let after = parse_count(&caps[2], line)?;
            (before - after)
                .checked_mul(1024)
                .ok_or_else(|| invalid_number(&caps[1], line))?
        } else if let Some(caps) = ALLOCATED_RE.captures(line) {
            parse_count(&caps[1], line)?
        } else {
            continue;
        };
        sample.bytes = sample
            .bytes
            .checked_add(bytes)
            .ok_or_else(|| invalid_number(&bytes.to_string(), line))?;
        sample.matches += 1;
    }
    Ok(sample)
}

fn invalid_number(value: &str, line: &str) -> JtError {
    JtError::InvalidNumber {
        value: value.to_string(),
        line: line.to_string(),
    }
}

fn parse_count(value: &str, line: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| invalid_number(value, line).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gc_transitions_sum() {
        let trace = "\
[GC (Allocation Failure)  65536K->1024K(251392K), 0.0031 secs]
some program output
[GC (Allocation Failure)  66560K->2048K(251392K), 0.0042 secs]
[Full GC (Ergonomics)  4096K->1000K(300000K), 0.02 secs]
";
        let sample = memory_allocated(trace).unwrap();
        let expected = 1024 * ((65536 - 1024) + (66560 - 2048) + (4096 - 1000));
        assert_eq!(sample.bytes, expected);
        assert_eq!(sample.matches, 3);
    }

    #[test]
    fn test_explicit_counters_sum() {
        let sample = memory_allocated("allocated 100\nallocated 23\n").unwrap();
        assert_eq!(sample.bytes, 123);
        assert_eq!(sample.matches, 2);
    }

    #[test]
    fn test_mixed_sources() {
        let trace = "[GC 10K->4K(100K), 0.001 secs]\nallocated 500\n";
        assert_eq!(memory_allocated(trace).unwrap().bytes, 6 * 1024 + 500);
    }

    #[test]
    fn test_gc_pattern_wins_over_counter() {
        // Only the GC transition is counted for a line matching both patterns.
        let sample = memory_allocated("allocated 5K->1K").unwrap();
        assert_eq!(sample.bytes, 4 * 1024);
        assert_eq!(sample.matches, 1);
    }

    #[test]
    fn test_no_matches_is_zero() {
        let sample = memory_allocated("hello\nworld\n").unwrap();
        assert_eq!(sample.bytes, 0);
        assert!(sample.is_degenerate());
        assert!(memory_allocated("").unwrap().is_degenerate());
    }

    #[test]
    fn test_heap_growth_is_negative() {
        assert_eq!(memory_allocated("[GC 1K->3K(8K)]").unwrap().bytes, -2048);
    }

    #[test]
    fn test_counter_must_own_the_line() {
        assert!(memory_allocated("  allocated 10\n").unwrap().is_degenerate());
    }

    #[test]
    fn test_overflowing_number_is_an_error() {
        let err = memory_allocated("allocated 99999999999999999999999").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JtError>(),
            Some(JtError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_scaled_gc_transition_overflow_is_an_error() {
        let err = memory_allocated("[GC 9000000000000000000K->0K(1K)]").unwrap_err();
        match err.downcast_ref::<JtError>() {
            Some(JtError::InvalidNumber { value, .. }) => assert_eq!(value, "9000000000000000000"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_running_total_overflow_is_an_error() {
        let trace = "allocated 9223372036854775807\nallocated 1\n";
        let err = memory_allocated(trace).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<JtError>(),
            Some(JtError::InvalidNumber { .. })
        ));
    }
}
