//! Startup configuration.
//!
//! Everything the commands need from the environment is read once into a
//! [`Config`] and passed around by reference.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Result};

use crate::error::JtError;

/// Port the JDWP debug server listens on.
pub const JDEBUG_PORT: u16 = 51819;

/// Number of repetitions for `jt metrics` unless `METRICS_REPS` says otherwise.
pub const DEFAULT_METRICS_REPS: usize = 10;

/// Interpreter flag that makes Truffle print Java exceptions.
pub const JEXCEPTION: &str = "-Xtruffle.exceptions.print_java=true";

/// JVM flag for attaching a suspended JDWP debugger to the interpreter.
pub fn jdebug() -> String {
    format!("-J-agentlib:jdwp=transport=dt_socket,server=y,address={JDEBUG_PORT},suspend=y")
}

/// Maven property for attaching a debugger to surefire test runs.
pub fn jdebug_test() -> String {
    format!(
        "-Dmaven.surefire.debug=-Xdebug -Xrunjdwp:transport=dt_socket,server=y,suspend=y,address={JDEBUG_PORT} -Xnoagent -Djava.compiler=NONE"
    )
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the JRuby checkout
    pub repo_dir: PathBuf,
    /// Current git branch, resolved once at startup
    pub git_branch: Option<String>,
    /// Explicit GraalVM java executable (GRAAL_BIN)
    pub graal_bin: Option<String>,
    /// Per-branch GraalVM executable (GRAAL_BIN_<BRANCH>)
    pub graal_bin_for_branch: Option<String>,
    /// Location of trufflejs.jar (GRAAL_JS_JAR)
    pub graal_js_jar: Option<String>,
    /// Interpreter to run instead of bin/jruby (RUBY_BIN)
    pub ruby_bin: Option<String>,
    /// bench9000 checkout (BENCH_DIR)
    pub bench_dir: Option<String>,
    /// Search path handed to test scripts
    pub path: Option<String>,
    /// Use tool/jruby_eclipse as the launcher
    pub use_jruby_eclipse: bool,
    /// Running under Travis; spec output is made verbose
    pub travis: bool,
    /// Repetitions for each metrics command
    pub metrics_reps: usize,
}

impl Config {
    /// Build a config from the process environment, asking git for the branch.
    pub fn load(repo_dir: &Path) -> Result<Self> {
        let repo_dir = repo_dir
            .canonicalize()
            .unwrap_or_else(|_| repo_dir.to_path_buf());
        let branch = current_git_branch(&repo_dir);
        Self::from_vars(repo_dir, std::env::vars(), branch)
    }

    /// Build a config from an explicit set of environment variables.
    pub fn from_vars<I>(repo_dir: PathBuf, vars: I, git_branch: Option<String>) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let get = |name: &str| vars.get(name).filter(|v| !v.is_empty()).cloned();

        let graal_bin_for_branch = git_branch
            .as_deref()
            .and_then(|branch| get(&format!("GRAAL_BIN_{}", mangle_for_env(branch))));

        let metrics_reps = match get("METRICS_REPS") {
            Some(reps) => {
                let reps: usize = reps.parse().map_err(|_| {
                    JtError::InvalidArgument(format!("METRICS_REPS must be a number, got {reps:?}"))
                })?;
                if reps == 0 {
                    bail!(JtError::InvalidArgument(
                        "METRICS_REPS must be at least 1".into()
                    ));
                }
                reps
            }
            None => DEFAULT_METRICS_REPS,
        };

        // tool/jruby_eclipse only works on master
        let use_jruby_eclipse = vars.get("JRUBY_ECLIPSE").map(String::as_str) == Some("true")
            && git_branch.as_deref() == Some("master");

        Ok(Config {
            repo_dir,
            graal_bin: get("GRAAL_BIN"),
            graal_bin_for_branch,
            graal_js_jar: get("GRAAL_JS_JAR"),
            ruby_bin: get("RUBY_BIN"),
            bench_dir: get("BENCH_DIR"),
            path: vars.get("PATH").cloned(),
            use_jruby_eclipse,
            travis: vars.contains_key("TRAVIS"),
            metrics_reps,
            git_branch,
        })
    }

    /// A config for `repo_dir` with nothing set in the environment.
    pub fn for_repo(repo_dir: impl Into<PathBuf>) -> Self {
        Config {
            repo_dir: repo_dir.into(),
            git_branch: None,
            graal_bin: None,
            graal_bin_for_branch: None,
            graal_js_jar: None,
            ruby_bin: None,
            bench_dir: None,
            path: None,
            use_jruby_eclipse: false,
            travis: false,
            metrics_reps: DEFAULT_METRICS_REPS,
        }
    }

    pub fn on_master(&self) -> bool {
        self.git_branch.as_deref() == Some("master")
    }
}

/// Turn a branch name into an environment variable suffix.
pub fn mangle_for_env(name: &str) -> String {
    name.to_uppercase().replace('-', "_")
}

fn current_git_branch(repo_dir: &Path) -> Option<String> {
    let output = Command::new("git")
        .env("GIT_DIR", repo_dir.join(".git"))
        .args(["rev-parse", "--abbrev-ref", "HEAD"])
        .output();
    match output {
        Ok(output) if output.status.success() => {
            let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
            tracing::debug!("git branch is {}", branch);
            (!branch.is_empty()).then_some(branch)
        }
        Ok(output) => {
            tracing::debug!(
                "git rev-parse failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
            None
        }
        Err(err) => {
            tracing::debug!("could not run git: {}", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_mangle_for_env() {
        assert_eq!(mangle_for_env("truffle-head"), "TRUFFLE_HEAD");
        assert_eq!(mangle_for_env("master"), "MASTER");
    }

    #[test]
    fn test_branch_specific_graal() {
        let config = Config::from_vars(
            "/repo".into(),
            vars(&[("GRAAL_BIN_TRUFFLE_HEAD", "/opt/graal/bin/java")]),
            Some("truffle-head".into()),
        )
        .unwrap();
        assert_eq!(
            config.graal_bin_for_branch.as_deref(),
            Some("/opt/graal/bin/java")
        );
        assert!(config.graal_bin.is_none());
    }

    #[test]
    fn test_metrics_reps() {
        let config = Config::from_vars("/repo".into(), vars(&[]), None).unwrap();
        assert_eq!(config.metrics_reps, DEFAULT_METRICS_REPS);

        let config =
            Config::from_vars("/repo".into(), vars(&[("METRICS_REPS", "3")]), None).unwrap();
        assert_eq!(config.metrics_reps, 3);

        assert!(Config::from_vars("/repo".into(), vars(&[("METRICS_REPS", "0")]), None).is_err());
        assert!(
            Config::from_vars("/repo".into(), vars(&[("METRICS_REPS", "many")]), None).is_err()
        );
    }

    #[test]
    fn test_jruby_eclipse_needs_master() {
        let env = vars(&[("JRUBY_ECLIPSE", "true")]);
        let on_master = Config::from_vars("/repo".into(), env.clone(), Some("master".into()));
        assert!(on_master.unwrap().use_jruby_eclipse);
        let elsewhere = Config::from_vars("/repo".into(), env, Some("truffle-head".into()));
        assert!(!elsewhere.unwrap().use_jruby_eclipse);
    }

    #[test]
    fn test_travis_flag() {
        let config = Config::from_vars("/repo".into(), vars(&[("TRAVIS", "true")]), None).unwrap();
        assert!(config.travis);
        assert!(!Config::for_repo("/repo").travis);
    }

    #[test]
    fn test_jdebug_mentions_port() {
        assert!(jdebug().contains("address=51819"));
        assert!(jdebug_test().contains("address=51819"));
    }
}
