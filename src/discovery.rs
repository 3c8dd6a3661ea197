//! Locating the external tools the workflow depends on.
//!
//! Relative candidates are resolved against the repository root. Every
//! lookup failure is a [`JtError::ToolNotFound`] with instructions for
//! getting the missing piece.

use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;

use crate::config::Config;
use crate::error::JtError;

const GRAAL_HINT: &str = "download it as described in https://github.com/jruby/jruby/wiki/Downloading-GraalVM and extract it into the JRuby repository or parent directory";
const GRAAL_CHECKOUT_HINT: &str =
    "set GRAAL_BIN, and you need to use a checkout of Graal, not a build";

/// Resolve `path` against `base` the way a shell would, without touching the filesystem.
pub fn expand_path(base: &Path, path: &Path) -> PathBuf {
    let joined = base.join(path);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out
}

pub fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// The GraalVM `java` executable.
pub fn find_graal(config: &Config) -> Result<PathBuf> {
    let candidates = [
        config.graal_bin.as_deref(),
        config.graal_bin_for_branch.as_deref(),
        Some("GraalVM-0.9/jre/bin/javao"),
        Some("../GraalVM-0.9/jre/bin/javao"),
        Some("../../GraalVM-0.9/jre/bin/javao"),
    ];
    candidates
        .into_iter()
        .flatten()
        .map(|candidate| expand_path(&config.repo_dir, Path::new(candidate)))
        .find(|location| is_executable(location))
        .ok_or_else(|| JtError::tool_not_found("graal", GRAAL_HINT).into())
}

pub fn find_graal_js(config: &Config) -> Result<PathBuf> {
    match &config.graal_js_jar {
        Some(jar) => Ok(PathBuf::from(jar)),
        None => Err(JtError::tool_not_found(
            "trufflejs.jar",
            "download GraalVM as described in https://github.com/jruby/jruby/wiki/Downloading-GraalVM and find it in there",
        )
        .into()),
    }
}

/// The interpreter launcher.
pub fn find_jruby(config: &Config) -> PathBuf {
    if config.use_jruby_eclipse {
        config.repo_dir.join("tool/jruby_eclipse")
    } else if let Some(ruby_bin) = &config.ruby_bin {
        PathBuf::from(ruby_bin)
    } else {
        config.repo_dir.join("bin/jruby")
    }
}

pub fn find_jruby_dir(config: &Config) -> PathBuf {
    let jruby = find_jruby(config);
    jruby
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// The graal-compiler checkout the GraalVM executable was built from.
pub fn find_graal_parent(config: &Config) -> Result<PathBuf> {
    let graal = find_graal(config)?;
    let parent = expand_path(&graal, Path::new("../../../../../graal-compiler"));
    if !parent.is_dir() {
        return Err(JtError::tool_not_found("graal", GRAAL_CHECKOUT_HINT).into());
    }
    Ok(parent)
}

pub fn find_graal_mx(config: &Config) -> Result<PathBuf> {
    let graal = find_graal(config)?;
    let mx = expand_path(&graal, Path::new("../../../../../../mx/mx"));
    if !is_executable(&mx) {
        return Err(JtError::tool_not_found("mx", GRAAL_CHECKOUT_HINT).into());
    }
    Ok(mx)
}

/// The bench9000 checkout.
pub fn find_bench(config: &Config) -> Result<PathBuf> {
    let candidates = [
        config.bench_dir.as_deref(),
        Some("bench9000"),
        Some("../bench9000"),
    ];
    candidates
        .into_iter()
        .flatten()
        .map(|candidate| expand_path(&config.repo_dir, Path::new(candidate)))
        .find(|location| location.is_dir())
        .ok_or_else(|| {
            JtError::tool_not_found(
                "bench9000",
                "clone it from https://github.com/jruby/bench9000.git into the JRuby repository or parent directory",
            )
            .into()
        })
}
