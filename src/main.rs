use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jt::cmds::bench::{bench, BenchCommand};
use jt::cmds::build::{build, checkout, clean, rebuild, BuildProject};
use jt::cmds::metrics::{metrics, MetricsCommand};
use jt::cmds::run::{eval, eval_and_print, irb, run, RunOptions};
use jt::cmds::test::{test, TestSuite};
use jt::specs::{run_specs, tag_request, Scope, SpecArgs, SpecRequest, TagMode};
use jt::{exit_code_for, Config, JtError, SystemRunner};

/// JRuby+Truffle workflow tool
#[derive(Debug, Parser)]
#[command(name = "jt")]
#[command(version)]
#[command(arg_required_else_help = true)]
#[command(after_help = "\
Recognised environment variables:
  RUBY_BIN                      The JRuby+Truffle executable to use (normally just bin/jruby)
  GRAAL_BIN                     GraalVM executable (java command) to use
  GRAAL_BIN_...git_branch_name... GraalVM executable to use for a given branch
  GRAAL_JS_JAR                  The location of trufflejs.jar
  BENCH_DIR                     The location of bench9000
  METRICS_REPS                  Repetitions for each metrics command (default 10)
  JRUBY_ECLIPSE                 Use tool/jruby_eclipse on master")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Root of the JRuby checkout
    #[arg(long, env = "JRUBY_DIR", default_value = ".")]
    repo: PathBuf,

    /// Build everything before running the command
    #[arg(long, conflicts_with = "rebuild")]
    build: bool,

    /// Copy the bash launcher, clean and build before running the command
    #[arg(long)]
    rebuild: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the project
    Build { project: Option<BuildProject> },
    /// Copy bin/jruby.bash to bin/jruby, clean and build
    Rebuild,
    /// Clean the project
    Clean,
    /// Checkout a branch and rebuild
    Checkout { branch: String },
    /// Run JRuby+Truffle with -X+T and core libraries
    #[command(visible_alias = "ruby")]
    Run {
        #[command(flatten)]
        opts: RunOptions,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Evaluate an expression, as in `jt e 14 + 2`
    E {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        code: Vec<String>,
    },
    /// Evaluate an expression and print the result with puts
    Puts {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        code: Vec<String>,
    },
    /// Evaluate an expression and print the result with p
    P {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        code: Vec<String>,
    },
    /// Run irb
    Irb {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run the tests; everything when no suite is given
    Test {
        #[command(subcommand)]
        suite: Option<TestSuite>,
    },
    /// Tag failing specs in a directory or file
    Tag {
        /// Tag every spec without running guards, same as a leading `all`
        #[arg(long)]
        all: bool,
        #[command(flatten)]
        args: SpecArgs,
        /// `[all] [spec directory or file]`
        #[arg(value_name = "PATH")]
        targets: Vec<String>,
    },
    /// Remove tags from specs that now pass
    Untag {
        #[command(flatten)]
        args: SpecArgs,
        /// Spec directory or file, or `all`
        scope: Option<Scope>,
    },
    /// Benchmarking with bench9000
    Bench {
        #[command(subcommand)]
        command: BenchCommand,
    },
    /// Repeated-run allocation and timing metrics
    Metrics {
        #[command(subcommand)]
        command: MetricsCommand,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn dispatch(config: &Config, command: Commands) -> Result<()> {
    let runner = SystemRunner;
    let mut stdout = io::stdout();

    match command {
        Commands::Build { project } => build(config, &runner, project),
        Commands::Rebuild => rebuild(config, &runner),
        Commands::Clean => clean(config, &runner),
        Commands::Checkout { branch } => checkout(config, &runner, &branch),
        Commands::Run { opts, args } => run(config, &runner, &opts, &args),
        Commands::E { code } => eval(config, &runner, &code),
        Commands::Puts { code } => eval_and_print(config, &runner, "puts", &code),
        Commands::P { code } => eval_and_print(config, &runner, "p", &code),
        Commands::Irb { args } => irb(config, &runner, &args),
        Commands::Test { suite } => test(config, &runner, suite, &mut stdout),
        Commands::Tag { all, args, targets } => {
            let request = tag_request(all, &targets, args)?;
            run_specs(config, &runner, &request, &mut stdout)
        }
        Commands::Untag { args, scope } => {
            let request =
                SpecRequest::new(TagMode::Untag, scope.unwrap_or_default()).with_args(args);
            run_specs(config, &runner, &request, &mut stdout)
        }
        Commands::Bench { command } => bench(config, &runner, &command),
        Commands::Metrics { command } => {
            let progress: Option<&mut dyn Write> = if stdout.is_terminal() {
                Some(&mut stdout)
            } else {
                None
            };
            metrics(config, &runner, &command, progress)
        }
    }
}

fn jt(cli: Cli) -> Result<()> {
    // The child process gets the interrupt; jt just waits for it to exit.
    ctrlc::set_handler(|| {}).context("Error setting Ctrl-C handler")?;

    let config = Config::load(&cli.repo)?;
    tracing::debug!(?config, "loaded configuration");

    let runner = SystemRunner;
    if cli.rebuild {
        rebuild(&config, &runner)?;
    } else if cli.build {
        build(&config, &runner, None)?;
    }

    match cli.command {
        Some(command) => dispatch(&config, command),
        None => Ok(()),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match jt(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let subprocess_failed = err.chain().any(|cause| {
                matches!(
                    cause.downcast_ref::<JtError>(),
                    Some(JtError::SubprocessFailed { .. })
                )
            });
            // The runner has already reported the failing command.
            if !subprocess_failed {
                let args: Vec<String> = std::env::args().skip(1).collect();
                println!("Error during command: {}", args.join(" "));
                eprintln!("Error: {err:?}");
            }
            ExitCode::from(u8::try_from(exit_code_for(&err)).unwrap_or(1))
        }
    }
}
