//! Reducing nested `before-`/`after-` phase markers to per-region durations.
//!
//! Every `before-` must be closed exactly once by an `after-` at the same
//! depth; anything else is rejected rather than reduced.
//!
//! Region keys are indented by nesting depth, so `main` is recorded as
//! `"  main"` and a phase inside it as `"   parsing"`. The synthetic regions
//! added after parsing carry at most one leading space and therefore never
//! collide with a parsed region.

use std::collections::HashMap;

use anyhow::Result;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use super::patterns::PHASE_MARKER_RE;
use crate::error::JtError;

/// The outermost region the runtime reports.
pub const MAIN_REGION: &str = "  main";
/// Start-up and shutdown time outside of `main`.
pub const JVM_REGION: &str = " jvm";
pub const TOTAL_REGION: &str = "total";
/// Wall-clock time not covered by any top-level phase inside `main`.
pub const UNACCOUNTED_REGION: &str = "unaccounted";

/// Depth at which top-level phases inside `main` close.
const ACCOUNTED_DEPTH: usize = 2;

/// Region durations in seconds, in the order regions were first closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingRecord {
    regions: Vec<(String, f64)>,
}

impl TimingRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration of `region`, keeping its position if already present.
    pub fn insert(&mut self, region: impl Into<String>, seconds: f64) {
        let region = region.into();
        match self.regions.iter_mut().find(|(name, _)| *name == region) {
            Some(entry) => entry.1 = seconds,
            None => self.regions.push((region, seconds)),
        }
    }

    pub fn get(&self, region: &str) -> Option<f64> {
        self.regions
            .iter()
            .find(|(name, _)| name == region)
            .map(|(_, seconds)| *seconds)
    }

    pub fn regions(&self) -> impl Iterator<Item = &str> {
        self.regions.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.regions.iter().map(|(name, s)| (name.as_str(), *s))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

impl Serialize for TimingRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.regions.len()))?;
        for (region, seconds) in &self.regions {
            map.serialize_entry(region.trim_start(), seconds)?;
        }
        map.end()
    }
}

/// Parse one run's trace. `total` is the wall-clock duration of the run in seconds.
pub fn get_times(trace: &str, total: f64) -> Result<TimingRecord> {
    let mut start_times: HashMap<String, f64> = HashMap::new();
    let mut times = TimingRecord::new();
    let mut depth: usize = 1;
    let mut accounted_for = 0.0;

    for line in trace.lines() {
        let Some(caps) = PHASE_MARKER_RE.captures(line) else {
            continue;
        };
        let marker = &caps[1];
        let time: f64 = caps[2].parse().map_err(|_| JtError::InvalidNumber {
            value: caps[2].to_string(),
            line: line.to_string(),
        })?;

        if let Some(name) = marker.strip_prefix("before-") {
            depth += 1;
            start_times.insert(region_key(depth, name), time);
        } else if let Some(name) = marker.strip_prefix("after-") {
            let region = region_key(depth, name);
            depth = depth.saturating_sub(1);
            let Some(start) = start_times.remove(&region) else {
                return Err(JtError::MalformedTrace { region }.into());
            };
            let elapsed = time - start;
            tracing::trace!("{:?} took {}s", region, elapsed);
            times.insert(region, elapsed);
            if depth == ACCOUNTED_DEPTH {
                accounted_for += elapsed;
            }
        }
    }

    // Each depth holds at most one open region, so an empty map also means
    // the depth is back to where it started. Report the innermost one left.
    if let Some(region) = start_times
        .into_keys()
        .max_by_key(|region| region.len() - region.trim_start().len())
    {
        return Err(JtError::UnclosedRegion { region }.into());
    }

    let Some(main) = times.get(MAIN_REGION) else {
        return Err(JtError::MissingRegion {
            region: MAIN_REGION.to_string(),
        }
        .into());
    };
    times.insert(JVM_REGION, total - main);
    times.insert(TOTAL_REGION, total);
    times.insert(UNACCOUNTED_REGION, total - accounted_for);
    Ok(times)
}

fn region_key(depth: usize, name: &str) -> String {
    format!("{}{}", " ".repeat(depth), name)
}
