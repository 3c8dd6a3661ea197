//! Driving the bench9000 harness.

use std::path::Path;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;
use crate::discovery::{find_bench, find_graal};
use crate::error::JtError;
use crate::igv;
use crate::shell::{Invocation, Runner};

const BENCH_CONFIG_NAME: &str = "jruby-dev-truffle-graal";
const DEFAULT_BENCHMARKS: &str = "5";

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum BenchCommand {
    /// Run a single benchmark with options for compiler debugging
    Debug {
        /// Make sure IGV is running and dump Graal graphs after partial escape
        #[arg(long)]
        igv: bool,
        /// With --igv, show all phases, not just up to the Truffle partial escape
        #[arg(long, requires = "igv")]
        full: bool,
        /// Print a Ruby backtrace on any compilation failures
        #[arg(long)]
        ruby_backtrace: bool,
        /// VM arguments (starting with -) and exactly one benchmark
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run a set of benchmarks and record a reference point
    Reference {
        /// Benchmarks or groups supported by bench9000, e.g. all, classic, chunky, 3, 5
        benchmarks: Vec<String>,
    },
    /// Run a set of benchmarks and compare against a reference point
    Compare { benchmarks: Vec<String> },
}

/// Build the bench9000 command line given where bench9000 and Graal live.
pub fn bench_invocation(
    config: &Config,
    command: &BenchCommand,
    bench_dir: &Path,
    graal: &Path,
) -> Result<Invocation> {
    let mut env = vec![
        (
            "JRUBY_DEV_DIR".to_string(),
            config.repo_dir.display().to_string(),
        ),
        ("GRAAL_BIN".to_string(), graal.display().to_string()),
    ];
    let bench_config = bench_dir
        .join("benchmarks/default.config.rb")
        .display()
        .to_string();
    let mut argv = vec![
        "ruby".to_string(),
        bench_dir.join("bin/bench9000").display().to_string(),
    ];

    match command {
        BenchCommand::Debug {
            igv,
            full,
            ruby_backtrace,
            args,
        } => {
            let mut vm_args = vec![
                "-G:+TraceTruffleCompilation".to_string(),
                "-G:+DumpOnError".to_string(),
            ];
            if *igv {
                vm_args.push(if *full {
                    "-G:Dump=Truffle".into()
                } else {
                    "-G:Dump=TrufflePartialEscape".into()
                });
            }
            vm_args.push(if *ruby_backtrace {
                "-G:+TruffleCompilationExceptionsAreThrown".into()
            } else {
                "-G:+TruffleCompilationExceptionsAreFatal".into()
            });

            let (extra_vm_args, benchmarks): (Vec<&String>, Vec<&String>) =
                args.iter().partition(|arg| arg.starts_with('-'));
            vm_args.extend(extra_vm_args.into_iter().cloned());
            if benchmarks.len() != 1 {
                return Err(JtError::InvalidArgument(
                    "specify a single benchmark for run - eg classic-fannkuch-redux".into(),
                )
                .into());
            }

            let jruby_opts = vm_args
                .iter()
                .map(|arg| format!("-J{arg}"))
                .collect::<Vec<_>>()
                .join(" ");
            env.push(("JRUBY_OPTS".to_string(), jruby_opts));
            argv.extend([
                "score".to_string(),
                "--config".to_string(),
                bench_config,
                BENCH_CONFIG_NAME.to_string(),
                "--show-commands".to_string(),
                "--show-samples".to_string(),
            ]);
            argv.extend(benchmarks.into_iter().cloned());
        }
        BenchCommand::Reference { benchmarks } => {
            argv.extend([
                "reference".to_string(),
                "--config".to_string(),
                bench_config,
                BENCH_CONFIG_NAME.to_string(),
                "--show-commands".to_string(),
            ]);
            argv.extend(benchmarks_or_default(benchmarks));
        }
        BenchCommand::Compare { benchmarks } => {
            argv.extend([
                "compare-reference".to_string(),
                "--config".to_string(),
                bench_config,
                BENCH_CONFIG_NAME.to_string(),
            ]);
            argv.extend(benchmarks_or_default(benchmarks));
        }
    }

    Ok(Invocation::new(argv).envs(env))
}

fn benchmarks_or_default(benchmarks: &[String]) -> Vec<String> {
    if benchmarks.is_empty() {
        vec![DEFAULT_BENCHMARKS.to_string()]
    } else {
        benchmarks.to_vec()
    }
}

pub fn bench<R: Runner>(config: &Config, runner: &R, command: &BenchCommand) -> Result<()> {
    let bench_dir = find_bench(config)?;
    let graal = find_graal(config)?;
    let invocation = bench_invocation(config, command, &bench_dir, &graal)?;
    if let BenchCommand::Debug { igv: true, .. } = command {
        igv::warn_if_master(config);
        igv::ensure_running(config)?;
    }
    runner.run(&invocation)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invocation(command: BenchCommand) -> Result<Invocation> {
        bench_invocation(
            &Config::for_repo("/repo"),
            &command,
            Path::new("/bench9000"),
            Path::new("/graal/bin/javao"),
        )
    }

    #[test]
    fn test_reference_defaults_to_group_five() {
        let invocation = invocation(BenchCommand::Reference { benchmarks: vec![] }).unwrap();
        assert_eq!(
            invocation.printable(),
            "JRUBY_DEV_DIR=/repo GRAAL_BIN=/graal/bin/javao ruby /bench9000/bin/bench9000 reference --config /bench9000/benchmarks/default.config.rb jruby-dev-truffle-graal --show-commands 5"
        );
    }

    #[test]
    fn test_compare_with_benchmarks() {
        let invocation = invocation(BenchCommand::Compare {
            benchmarks: vec!["classic".into(), "chunky".into()],
        })
        .unwrap();
        let tail: Vec<&str> = invocation.argv[2..].iter().map(String::as_str).collect();
        assert_eq!(
            tail,
            vec![
                "compare-reference",
                "--config",
                "/bench9000/benchmarks/default.config.rb",
                "jruby-dev-truffle-graal",
                "classic",
                "chunky"
            ]
        );
    }

    #[test]
    fn test_debug_splits_vm_args() {
        let invocation = invocation(BenchCommand::Debug {
            igv: true,
            full: false,
            ruby_backtrace: true,
            args: vec!["-G:+TraceTruffleInlining".into(), "classic-fannkuch-redux".into()],
        })
        .unwrap();
        assert_eq!(
            invocation.env[2],
            (
                "JRUBY_OPTS".to_string(),
                "-J-G:+TraceTruffleCompilation -J-G:+DumpOnError -J-G:Dump=TrufflePartialEscape -J-G:+TruffleCompilationExceptionsAreThrown -J-G:+TraceTruffleInlining".to_string()
            )
        );
        assert_eq!(invocation.argv.last().unwrap(), "classic-fannkuch-redux");
        assert!(invocation.argv.contains(&"--show-samples".to_string()));
    }

    #[test]
    fn test_debug_needs_exactly_one_benchmark() {
        let err = invocation(BenchCommand::Debug {
            igv: false,
            full: false,
            ruby_backtrace: false,
            args: vec!["a".into(), "b".into()],
        })
        .unwrap_err();
        assert!(err.to_string().contains("single benchmark"));
    }
}
