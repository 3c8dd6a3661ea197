//! `jt metrics alloc` and `jt metrics time`.

use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Subcommand;

use super::run::{prepare, run_invocation, RunOptions};
use crate::config::Config;
use crate::metrics::{self, get_times, memory_allocated, AllocSummary, TimeSummary};
use crate::shell::Runner;

const ALLOC_FLAGS: [&str; 2] = ["-Xtruffle.metrics.memory_used_on_exit=true", "-J-verbose:gc"];
const TIME_FLAGS: [&str; 1] = ["-Xtruffle.metrics.time=true"];

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum MetricsCommand {
    /// How much memory is allocated running a program (use -X-T to test normal JRuby)
    Alloc {
        #[command(flatten)]
        opts: RunOptions,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// How long a command takes to run, broken down into phases
    Time {
        #[command(flatten)]
        opts: RunOptions,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

fn with_flags(flags: &[&str], args: &[String]) -> Vec<String> {
    flags
        .iter()
        .map(|flag| flag.to_string())
        .chain(args.iter().cloned())
        .collect()
}

pub fn metrics_alloc<R: Runner>(
    config: &Config,
    runner: &R,
    opts: &RunOptions,
    args: &[String],
    progress: Option<&mut dyn Write>,
) -> Result<AllocSummary> {
    prepare(config, opts)?;
    let invocation =
        run_invocation(config, Vec::new(), opts, &with_flags(&ALLOC_FLAGS, args))?.captured();

    let samples = metrics::collect(config.metrics_reps, progress, |rep| {
        let captured = runner.run(&invocation)?;
        let sample = memory_allocated(&captured.output)
            .with_context(|| format!("Failed to parse allocation trace of run {}", rep + 1))?;
        if sample.is_degenerate() {
            tracing::warn!(
                "run {} reported no GC activity or allocation counter; counting it as 0 bytes",
                rep + 1
            );
        }
        Ok(sample.bytes)
    })?;

    AllocSummary::from_samples(&samples)
}

pub fn metrics_time<R: Runner>(
    config: &Config,
    runner: &R,
    opts: &RunOptions,
    args: &[String],
    progress: Option<&mut dyn Write>,
) -> Result<TimeSummary> {
    prepare(config, opts)?;
    let invocation =
        run_invocation(config, Vec::new(), opts, &with_flags(&TIME_FLAGS, args))?.captured();

    let samples = metrics::collect(config.metrics_reps, progress, |rep| {
        let start = Instant::now();
        let captured = runner.run(&invocation)?;
        let total = start.elapsed().as_secs_f64();
        get_times(&captured.output, total)
            .with_context(|| format!("Failed to parse timing trace of run {}", rep + 1))
    })?;

    TimeSummary::from_samples(&samples)
}

pub fn metrics<R: Runner>(
    config: &Config,
    runner: &R,
    command: &MetricsCommand,
    progress: Option<&mut dyn Write>,
) -> Result<()> {
    match command {
        MetricsCommand::Alloc { opts, json, args } => {
            let summary = metrics_alloc(config, runner, opts, args, progress)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{summary}");
            }
        }
        MetricsCommand::Time { opts, json, args } => {
            let summary = metrics_time(config, runner, opts, args, progress)?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{summary}");
            }
        }
    }
    Ok(())
}
