//! Line patterns recognised in captured interpreter output.

use std::sync::LazyLock;

use regex::Regex;

/// Heap transition in a `-verbose:gc` log line, e.g. `[GC 65536K->1024K(251392K), 0.01 secs]`.
/// Sizes are in kilobytes; the match may appear anywhere in the line.
pub static GC_TRANSITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)K->(\d+)K").expect("Invalid GC transition regex pattern"));

/// Explicit allocation counter printed by `-Xtruffle.metrics.memory_used_on_exit`.
pub static ALLOCATED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^allocated (\d+)$").expect("Invalid allocation regex pattern"));

/// Phase marker printed by `-Xtruffle.metrics.time`, e.g. `before-parsing 1442.3071`.
pub static PHASE_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([a-z\-]+) (\d+\.\d+)$").expect("Invalid phase marker regex pattern")
});
