//! Running subprocesses.
//!
//! Every command goes through the [`Runner`] trait so the metrics and
//! tagging logic can be exercised with stub runners. [`SystemRunner`] is
//! the real implementation on top of `std::process::Command`.

use std::fs::File;
use std::io::Read;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use nix::unistd::pipe;

use crate::error::JtError;

/// Where a subprocess's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Share the terminal with the child
    #[default]
    Inherit,
    /// Merge stdout and stderr into one pipe and return the text
    Capture,
}

/// A fully described subprocess call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    /// Environment overlay, in the order it was built
    pub env: Vec<(String, String)>,
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub output: OutputMode,
    /// Print `$ <command>` before running
    pub echo: bool,
}

impl Invocation {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation {
            argv: argv.into_iter().map(Into::into).collect(),
            echo: true,
            ..Default::default()
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs(mut self, env: Vec<(String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Capture output silently, without the `$ cmd` echo.
    pub fn captured(mut self) -> Self {
        self.output = OutputMode::Capture;
        self.echo = false;
        self
    }

    pub fn printable(&self) -> String {
        printable_cmd(&self.env, &self.argv)
    }
}

/// Output of a finished subprocess. Empty unless it was captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub output: String,
}

pub trait Runner {
    /// Run to completion. A non-zero exit is returned as
    /// [`JtError::SubprocessFailed`] carrying the child's exit code.
    fn run(&self, invocation: &Invocation) -> Result<Captured>;
}

impl<R: Runner + ?Sized> Runner for &R {
    fn run(&self, invocation: &Invocation) -> Result<Captured> {
        (**self).run(invocation)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<Captured> {
        let Some((program, args)) = invocation.argv.split_first() else {
            return Err(JtError::InvalidArgument("No command specified to run".into()).into());
        };

        if invocation.echo {
            println!("$ {}", invocation.printable());
        }
        tracing::debug!(cwd = ?invocation.cwd, "spawning {}", program);

        let mut command = Command::new(program);
        command.args(args);
        command.envs(invocation.env.iter().map(|(k, v)| (k, v)));
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let (status, output) = match invocation.output {
            OutputMode::Inherit => {
                let status = command
                    .status()
                    .with_context(|| format!("Failed to run {program}"))?;
                (status, String::new())
            }
            OutputMode::Capture => run_captured(command, program)?,
        };

        check_status(status, invocation)?;
        Ok(Captured { output })
    }
}

fn run_captured(mut command: Command, program: &str) -> Result<(ExitStatus, String)> {
    let (read_end, write_end) = pipe().context("Failed to create output pipe")?;
    let stderr_end = write_end
        .try_clone()
        .context("Failed to duplicate output pipe")?;
    command
        .stdin(Stdio::null())
        .stdout(Stdio::from(write_end))
        .stderr(Stdio::from(stderr_end));

    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to run {program}"))?;
    // Our copies of the write end must be closed or the read never sees EOF.
    drop(command);

    let mut output = Vec::new();
    File::from(read_end)
        .read_to_end(&mut output)
        .context("Failed to read subprocess output")?;
    let status = child
        .wait()
        .with_context(|| format!("Failed to wait for {program}"))?;
    Ok((status, String::from_utf8_lossy(&output).into_owned()))
}

/// Turn a non-zero exit status into a [`JtError::SubprocessFailed`].
pub fn check_status(status: ExitStatus, invocation: &Invocation) -> Result<()> {
    if status.success() {
        return Ok(());
    }
    let code = status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1);
    let command = invocation.printable();
    eprintln!("FAILED ({status}): {command}");
    Err(JtError::SubprocessFailed { code, command }.into())
}

/// Render a command line the way a user would type it.
pub fn printable_cmd(env: &[(String, String)], argv: &[String]) -> String {
    let env = env
        .iter()
        .map(|(k, v)| format!("{}={}", k, shellescape(v)))
        .collect::<Vec<_>>()
        .join(" ");
    let args = argv
        .iter()
        .map(|a| shellescape(a))
        .collect::<Vec<_>>()
        .join(" ");
    if env.is_empty() {
        args
    } else {
        format!("{env} {args}")
    }
}

/// Quote an argument only if it contains a space.
pub fn shellescape(arg: &str) -> String {
    if !arg.contains(' ') {
        return arg.to_string();
    }
    if !arg.contains('\'') {
        return format!("'{arg}'");
    }
    let mut escaped = String::with_capacity(arg.len() * 2);
    for c in arg.chars() {
        match c {
            '\n' => escaped.push_str("'\n'"),
            c if c.is_ascii_alphanumeric() || "_-.,:+/@".contains(c) => escaped.push(c),
            c => {
                escaped.push('\\');
                escaped.push(c);
            }
        }
    }
    escaped
}
