//! Common test utilities for jt integration tests.
//!
//! Each test gets a throwaway repository directory and a fake interpreter
//! written as a `#!/bin/sh` script, which `jt` is pointed at through
//! `RUBY_BIN`.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Environment variables that change what jt runs; cleared for every test.
const JT_VARS: &[&str] = &[
    "GRAAL_BIN",
    "GRAAL_JS_JAR",
    "BENCH_DIR",
    "METRICS_REPS",
    "JRUBY_ECLIPSE",
    "JRUBY_DIR",
    "TRAVIS",
    "RUST_LOG",
];

/// An empty JRuby checkout layout.
pub fn fake_repo() -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    for sub in ["bin", "truffle/src/main/ruby", "spec/ruby/core/array", "test"] {
        fs::create_dir_all(dir.path().join(sub)).expect("Failed to create repo layout");
    }
    dir
}

/// Write an executable shell script named `name` into `dir`.
pub fn fake_interpreter(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write fake interpreter");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to make fake interpreter executable");
    path
}

/// Run jt against `repo` with `ruby_bin` as the interpreter.
pub fn run_jt(repo: &Path, ruby_bin: &Path, env: &[(&str, &str)], args: &[&str]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_jt"));
    for var in JT_VARS {
        command.env_remove(var);
    }
    command
        .env("RUBY_BIN", ruby_bin)
        .envs(env.iter().copied())
        .arg("--repo")
        .arg(repo)
        .args(args)
        .output()
        .expect("Failed to run jt")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[allow(dead_code)]
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
