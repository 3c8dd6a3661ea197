//! Making sure the IdealGraphVisualizer is up before dumping Graal graphs.
//!
//! IGV is started through `mx` in its own process group and left running.
//! There is no readiness check; the operator confirms when the window is up.

use std::ffi::OsStr;
use std::io::{self, BufRead};
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use sysinfo::{ProcessRefreshKind, RefreshKind, System, UpdateKind};

use crate::config::Config;
use crate::discovery::{find_graal_mx, find_graal_parent};

const IGV_PROCESS: &str = "IdealGraphVisualizer";
const STARTUP_GRACE: Duration = Duration::from_secs(5);

/// Whether a process command line belongs to IGV.
pub fn mentions_igv<S: AsRef<OsStr>>(cmdline: &[S]) -> bool {
    cmdline
        .iter()
        .any(|arg| arg.as_ref().to_string_lossy().contains(IGV_PROCESS))
}

pub fn is_running() -> bool {
    let system = System::new_with_specifics(
        RefreshKind::nothing()
            .with_processes(ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always)),
    );
    system
        .processes()
        .values()
        .any(|process| mentions_igv(process.cmd()) || mentions_igv(&[process.name()]))
}

/// `--igv` only works reliably on branches that build against the latest Graal.
pub fn warn_if_master(config: &Config) {
    if config.on_master() {
        tracing::warn!(
            "--igv might not work on master - if it does not, use truffle-head instead which builds against latest graal"
        );
    }
}

pub fn ensure_running(config: &Config) -> Result<()> {
    if is_running() {
        tracing::debug!("IGV is already running");
        return Ok(());
    }

    let mx = find_graal_mx(config)?;
    let jvmci = find_graal_parent(config)?.join("../jvmci");
    tracing::info!("starting IGV with {}", mx.display());
    Command::new(&mx)
        .args(["--vm", "server", "igv"])
        .current_dir(&jvmci)
        .process_group(0)
        .spawn()
        .with_context(|| format!("Failed to start IGV with {}", mx.display()))?;

    thread::sleep(STARTUP_GRACE);
    println!();
    println!();
    println!("-------------");
    println!("Waiting for IGV start");
    println!("The first time you run IGV it may take several minutes to download dependencies and compile");
    println!("Press enter when you see the IGV window");
    println!("-------------");
    println!();
    println!();

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read confirmation from stdin")?;
    Ok(())
}
