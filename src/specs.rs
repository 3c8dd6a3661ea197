//! Running specs through mspec and maintaining the `fails` tags.
//!
//! Each [`TagMode`] maps to a fixed mspec subcommand and option set. The
//! tag files themselves belong to mspec; we only tell it what to add or
//! remove.

use std::convert::Infallible;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Args;

use crate::config::{jdebug, Config, JEXCEPTION};
use crate::discovery::{find_graal, find_jruby};
use crate::error::JtError;
use crate::shell::{Invocation, Runner};

const MSPEC: &str = "spec/mspec/bin/mspec";
const MSPEC_CONFIG: &str = "spec/truffle/truffle.mspec";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
    /// Run everything not already tagged as failing
    Run,
    /// Tag specs that fail
    Tag,
    /// Remove the tag from specs that now pass
    Untag,
    /// Tag every spec without running anything
    TagAll,
}

impl TagMode {
    pub fn mspec_command(self) -> &'static str {
        match self {
            TagMode::Run => "run",
            TagMode::Tag | TagMode::Untag | TagMode::TagAll => "tag",
        }
    }

    pub fn options(self) -> &'static [&'static str] {
        match self {
            TagMode::Run => &["--excl-tag", "fails"],
            TagMode::Tag => &["--add", "fails", "--fail"],
            TagMode::Untag => &["--del", "fails", "--pass"],
            TagMode::TagAll => &["--unguarded", "--all", "--dry-run", "--add", "fails"],
        }
    }
}

/// Which specs an operation applies to.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Scope {
    #[default]
    All,
    /// A spec directory or a single spec file
    Path(PathBuf),
}

impl FromStr for Scope {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" | "all" => Scope::All,
            path => Scope::Path(PathBuf::from(path)),
        })
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::All => write!(f, "all"),
            Scope::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Modifiers accepted by every spec-running command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct SpecArgs {
    /// Skip slow specs (sub-processes, GC, sleep, ...) and shorten backtraces
    #[arg(long)]
    pub fast: bool,
    /// Run on Graal
    #[arg(long)]
    pub graal: bool,
    /// Run a JDWP debug server
    #[arg(long)]
    pub jdebug: bool,
    /// Print Java exceptions
    #[arg(long, alias = "jexceptions")]
    pub jexception: bool,
    /// Report with spec/truffle/truffle_formatter.rb
    #[arg(long)]
    pub truffle_formatter: bool,
}

impl SpecArgs {
    /// The command-line flags that would reproduce these modifiers.
    pub fn flags(&self) -> Vec<&'static str> {
        [
            (self.fast, "--fast"),
            (self.graal, "--graal"),
            (self.jdebug, "--jdebug"),
            (self.jexception, "--jexception"),
            (self.truffle_formatter, "--truffle-formatter"),
        ]
        .into_iter()
        .filter_map(|(set, flag)| set.then_some(flag))
        .collect()
    }
}

/// One mspec invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRequest {
    pub mode: TagMode,
    pub scope: Scope,
    pub args: SpecArgs,
    /// Passed to mspec after the scope
    pub extra: Vec<String>,
}

impl SpecRequest {
    pub fn new(mode: TagMode, scope: Scope) -> Self {
        SpecRequest {
            mode,
            scope,
            args: SpecArgs::default(),
            extra: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: SpecArgs) -> Self {
        self.args = args;
        self
    }

    pub fn with_extra(mut self, extra: Vec<String>) -> Self {
        self.extra = extra;
        self
    }

    /// Warning the operator must see before the run, if any.
    pub fn warning(&self) -> Option<String> {
        if self.mode != TagMode::Untag {
            return None;
        }
        let mut target = match &self.scope {
            Scope::All => vec!["specs".to_string()],
            Scope::Path(path) => vec![path.display().to_string()],
        };
        target.extend(self.args.flags().into_iter().map(String::from));
        target.extend(self.extra.iter().cloned());
        Some(format!(
            "WARNING: untag is currently not very reliable - run `jt test {}` after and manually annotate any new failures",
            target.join(" ")
        ))
    }
}

/// Resolve the positional arguments of `jt tag`.
///
/// A leading literal `all`, like the `--all` flag, selects
/// [`TagMode::TagAll`]; what follows is the scope.
pub fn tag_request(all: bool, targets: &[String], args: SpecArgs) -> Result<SpecRequest> {
    let (mode, rest) = match targets.split_first() {
        Some((first, rest)) if first == "all" => (TagMode::TagAll, rest),
        _ if all => (TagMode::TagAll, targets),
        _ => (TagMode::Tag, targets),
    };
    let scope = match rest {
        [] => Scope::All,
        [path] => path.parse()?,
        _ => {
            return Err(JtError::InvalidArgument(format!(
                "tag takes a single spec directory or file, got {}",
                rest.join(" ")
            ))
            .into())
        }
    };
    Ok(SpecRequest::new(mode, scope).with_args(args))
}

/// Build the mspec command line for `request`.
pub fn spec_invocation(config: &Config, request: &SpecRequest) -> Result<Invocation> {
    let mut env = Vec::new();
    let mut options: Vec<String> = Vec::new();

    if config.use_jruby_eclipse {
        options.push("-ttool/jruby_eclipse".into());
    }
    options.extend(request.mode.options().iter().map(|s| s.to_string()));

    let args = &request.args;
    if args.fast {
        options.extend(["--excl-tag", "slow", "-T-Xtruffle.backtraces.limit=4"].map(String::from));
    }
    if args.graal {
        env.push((
            "JAVACMD".to_string(),
            find_graal(config)?.display().to_string(),
        ));
        options.push("-T-J-server".into());
    }
    if args.jdebug {
        options.push(format!("-T{}", jdebug()));
    }
    if args.jexception {
        options.push(format!("-T{JEXCEPTION}"));
    }
    if args.truffle_formatter {
        options.extend(["--format", "spec/truffle/truffle_formatter.rb"].map(String::from));
    }
    if config.travis {
        // Lots of output keeps Travis from timing the job out
        options.extend(["--format", "specdoc"].map(String::from));
    }

    let mut argv = vec![
        find_jruby(config).display().to_string(),
        MSPEC.to_string(),
        request.mode.mspec_command().to_string(),
        "--config".to_string(),
        MSPEC_CONFIG.to_string(),
    ];
    argv.extend(options);
    if let Scope::Path(path) = &request.scope {
        argv.push(path.display().to_string());
    }
    argv.extend(request.extra.iter().cloned());

    Ok(Invocation::new(argv).envs(env).cwd(&config.repo_dir))
}

/// Print any warning for `request` to `out`, then run mspec.
pub fn run_specs<R: Runner>(
    config: &Config,
    runner: &R,
    request: &SpecRequest,
    out: &mut dyn Write,
) -> Result<()> {
    if let Some(warning) = request.warning() {
        writeln!(out)?;
        writeln!(out, "{warning}")?;
        writeln!(out)?;
        out.flush()?;
    }
    let invocation = spec_invocation(config, request)?;
    tracing::info!(mode = ?request.mode, scope = %request.scope, "running mspec");
    runner.run(&invocation)?;
    Ok(())
}
