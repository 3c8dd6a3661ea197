//! Error types shared by the command implementations.
//!
//! Commands return `anyhow::Result` and attach context as they go. The
//! variants here are the conditions callers need to tell apart, mainly so
//! `main` can exit with the failing subprocess's own status code.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum JtError {
    /// An external dependency could not be located.
    #[error("couldn't find {tool} - {hint}")]
    ToolNotFound { tool: String, hint: String },

    /// A subprocess exited with a non-zero status.
    #[error("command failed with exit code {code}: {command}")]
    SubprocessFailed { code: i32, command: String },

    /// An `after-` marker closed a region that was never opened at that depth.
    #[error("malformed trace: region {region:?} closed without a matching before- marker")]
    MalformedTrace { region: String },

    /// A `before-` marker was never closed by the end of the trace.
    #[error("malformed trace: region {region:?} opened but never closed")]
    UnclosedRegion { region: String },

    /// A region every timing trace must contain was not found.
    #[error("timing trace has no {region:?} region - was the command run with metrics enabled?")]
    MissingRegion { region: String },

    /// A later repetition did not report a region seen in the first one.
    #[error("region {region:?} missing from repetition {run}")]
    RegionMismatch { region: String, run: usize },

    /// A captured numeric field did not fit the sample type.
    #[error("invalid number {value:?} in trace line {line:?}")]
    InvalidNumber { value: String, line: String },

    #[error("{0}")]
    InvalidArgument(String),
}

impl JtError {
    pub fn tool_not_found(tool: impl Into<String>, hint: impl Into<String>) -> Self {
        JtError::ToolNotFound {
            tool: tool.into(),
            hint: hint.into(),
        }
    }

    /// Exit code the process should terminate with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            JtError::SubprocessFailed { code, .. } => *code,
            _ => 1,
        }
    }
}

/// Exit code for an arbitrary error chain, honoring a wrapped subprocess failure.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<JtError>())
        .map_or(1, JtError::exit_code)
}
