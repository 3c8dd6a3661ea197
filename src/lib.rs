//! jt - a workflow tool for developing the Truffle backend of JRuby.
//!
//! The `jt` binary is a thin clap front end over this library. Every
//! command builds an [`Invocation`] describing a subprocess and hands it to
//! a [`Runner`], so the command logic can be exercised without spawning
//! anything.
//!
//! # Modules
//!
//! - [`config`] - environment read once at startup
//! - [`discovery`] - locating Graal, bench9000 and the interpreter
//! - [`shell`] - subprocess invocation, echo and output capture
//! - [`specs`] - running and tagging ruby/spec through mspec
//! - [`metrics`] - allocation and phase timing over repeated runs
//! - [`cmds`] - one module per command family
//!
//! # Example
//!
//! ```no_run
//! use jt::{Config, SystemRunner};
//! use jt::cmds::run::{run, RunOptions};
//! use std::path::Path;
//!
//! let config = Config::load(Path::new(".")).expect("Failed to load config");
//! let args = vec!["-e".to_string(), "p 14 + 2".to_string()];
//! run(&config, &SystemRunner, &RunOptions::default(), &args).expect("jruby failed");
//! ```

pub mod cmds;
pub mod config;
pub mod discovery;
pub mod error;
pub mod igv;
pub mod metrics;
pub mod shell;
pub mod specs;

pub use config::Config;
pub use error::{exit_code_for, JtError};
pub use shell::{Captured, Invocation, Runner, SystemRunner};
pub use specs::{Scope, SpecArgs, SpecRequest, TagMode};
