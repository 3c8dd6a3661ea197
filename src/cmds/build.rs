use std::fs;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::config::Config;
use crate::shell::{Invocation, Runner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BuildProject {
    /// Only the Truffle module; assumes the rest is up to date
    Truffle,
}

/// `./mvnw -q <args>` in the repository root.
pub fn mvn<I, S>(config: &Config, args: I) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut argv = vec!["./mvnw".to_string(), "-q".to_string()];
    argv.extend(args.into_iter().map(Into::into));
    Invocation::new(argv).cwd(&config.repo_dir)
}

pub fn build<R: Runner>(config: &Config, runner: &R, project: Option<BuildProject>) -> Result<()> {
    let invocation = match project {
        Some(BuildProject::Truffle) => mvn(config, ["-DskipTests", "-pl", "truffle", "package"]),
        None => mvn(config, ["-DskipTests", "package"]),
    };
    runner.run(&invocation)?;
    Ok(())
}

pub fn clean<R: Runner>(config: &Config, runner: &R) -> Result<()> {
    runner.run(&mvn(config, ["clean"]))?;
    Ok(())
}

pub fn rebuild<R: Runner>(config: &Config, runner: &R) -> Result<()> {
    let launcher = config.repo_dir.join("bin/jruby");
    let source = config.repo_dir.join("bin/jruby.bash");
    fs::copy(&source, &launcher).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            source.display(),
            launcher.display()
        )
    })?;
    clean(config, runner)?;
    build(config, runner, None)
}

pub fn checkout<R: Runner>(config: &Config, runner: &R, branch: &str) -> Result<()> {
    let invocation = Invocation::new(["git", "checkout", branch]).cwd(&config.repo_dir);
    runner.run(&invocation)?;
    rebuild(config, runner)
}
