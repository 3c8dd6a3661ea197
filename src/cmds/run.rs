//! Running the interpreter with developer flags.

use anyhow::Result;
use clap::Args;

use crate::config::{jdebug, Config, JEXCEPTION};
use crate::discovery::{find_graal, find_graal_js, find_jruby};
use crate::igv;
use crate::shell::{Invocation, Runner};

#[derive(Debug, Clone, Default, PartialEq, Eq, Args)]
pub struct RunOptions {
    /// Use Graal (set GRAAL_BIN or it will try to find it)
    #[arg(long)]
    pub graal: bool,
    /// Add Graal.js to the classpath (set GRAAL_JS_JAR)
    #[arg(long)]
    pub js: bool,
    /// Show assembly (implies --graal)
    #[arg(long)]
    pub asm: bool,
    /// Run an instrumentation server on port 8080
    #[arg(long)]
    pub server: bool,
    /// Make sure IGV is running and dump Graal graphs after partial escape (implies --graal)
    #[arg(long)]
    pub igv: bool,
    /// With --igv, show all phases, not just up to the Truffle partial escape
    #[arg(long, requires = "igv")]
    pub full: bool,
    /// Run a JDWP debug server
    #[arg(long)]
    pub jdebug: bool,
    /// Print Java exceptions
    #[arg(long, alias = "jexceptions")]
    pub jexception: bool,
}

impl RunOptions {
    pub fn uses_graal(&self) -> bool {
        self.graal || self.asm || self.igv
    }
}

/// Build the interpreter command line. `env` is extended, not replaced.
pub fn run_invocation(
    config: &Config,
    mut env: Vec<(String, String)>,
    opts: &RunOptions,
    args: &[String],
) -> Result<Invocation> {
    let mut jruby_args = vec![
        "-X+T".to_string(),
        format!(
            "-Xtruffle.core.load_path={}",
            config.repo_dir.join("truffle/src/main/ruby").display()
        ),
        "-Xtruffle.graal.warn_unless=false".to_string(),
    ];

    if opts.uses_graal() {
        env.push((
            "JAVACMD".to_string(),
            find_graal(config)?.display().to_string(),
        ));
        jruby_args.push("-J-server".into());
    }
    if opts.js {
        jruby_args.push("-J-classpath".into());
        jruby_args.push(find_graal_js(config)?.display().to_string());
    }
    if opts.asm {
        jruby_args.push("-J-XX:+UnlockDiagnosticVMOptions".into());
        jruby_args.push("-J-XX:CompileCommand=print,*::callRoot".into());
    }
    if opts.jdebug {
        jruby_args.push(jdebug());
    }
    if opts.jexception {
        jruby_args.push(JEXCEPTION.into());
    }
    if opts.server {
        jruby_args.push("-Xtruffle.instrumentation_server_port=8080".into());
        jruby_args.push("-Xtruffle.passalot=1".into());
    }
    if opts.igv {
        jruby_args.push(if opts.full {
            "-J-G:Dump=Truffle".into()
        } else {
            "-J-G:Dump=TrufflePartialEscape".into()
        });
    }

    let mut argv = vec![find_jruby(config).display().to_string()];
    argv.extend(jruby_args);
    argv.extend(args.iter().cloned());
    Ok(Invocation::new(argv).envs(env))
}

/// Side effects some options need before the interpreter starts.
pub fn prepare(config: &Config, opts: &RunOptions) -> Result<()> {
    if opts.igv {
        igv::warn_if_master(config);
        igv::ensure_running(config)?;
    }
    Ok(())
}

pub fn run<R: Runner>(
    config: &Config,
    runner: &R,
    opts: &RunOptions,
    args: &[String],
) -> Result<()> {
    prepare(config, opts)?;
    let invocation = run_invocation(config, Vec::new(), opts, args)?;
    runner.run(&invocation)?;
    Ok(())
}

/// `jt e 14 + 2`
pub fn eval<R: Runner>(config: &Config, runner: &R, code: &[String]) -> Result<()> {
    let args = ["-e".to_string(), code.join(" ")];
    run(config, runner, &RunOptions::default(), &args)
}

/// Evaluate an expression and show it with `puts` or `p`.
pub fn eval_and_print<R: Runner>(
    config: &Config,
    runner: &R,
    printer: &str,
    code: &[String],
) -> Result<()> {
    let mut wrapped = vec![format!("{printer} begin")];
    wrapped.extend(code.iter().cloned());
    wrapped.push("end".to_string());
    eval(config, runner, &wrapped)
}

pub fn irb<R: Runner>(config: &Config, runner: &R, args: &[String]) -> Result<()> {
    let mut irb_args = vec!["-S".to_string(), "irb".to_string()];
    irb_args.extend(args.iter().cloned());
    run(config, runner, &RunOptions::default(), &irb_args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::Captured;
    use std::cell::RefCell;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingRunner {
        calls: RefCell<Vec<Invocation>>,
    }

    impl Runner for RecordingRunner {
        fn run(&self, invocation: &Invocation) -> Result<Captured> {
            self.calls.borrow_mut().push(invocation.clone());
            Ok(Captured::default())
        }
    }

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn config_with_graal(dir: &TempDir) -> Config {
        let graal = dir.path().join("GraalVM-0.9/jre/bin/javao");
        fs::create_dir_all(graal.parent().unwrap()).unwrap();
        fs::write(&graal, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&graal, fs::Permissions::from_mode(0o755)).unwrap();
        Config::for_repo(dir.path())
    }

    #[test]
    fn test_plain_run() {
        let invocation = run_invocation(
            &Config::for_repo("/repo"),
            Vec::new(),
            &RunOptions::default(),
            &strings(&["-e", "p 1"]),
        )
        .unwrap();
        assert_eq!(
            invocation.argv,
            strings(&[
                "/repo/bin/jruby",
                "-X+T",
                "-Xtruffle.core.load_path=/repo/truffle/src/main/ruby",
                "-Xtruffle.graal.warn_unless=false",
                "-e",
                "p 1"
            ])
        );
        assert!(invocation.env.is_empty());
        assert!(invocation.cwd.is_none());
    }

    #[test]
    fn test_asm_implies_graal() {
        let dir = TempDir::new().unwrap();
        let config = config_with_graal(&dir);
        let opts = RunOptions {
            asm: true,
            ..Default::default()
        };
        let invocation = run_invocation(&config, Vec::new(), &opts, &[]).unwrap();
        assert_eq!(invocation.env[0].0, "JAVACMD");
        assert!(invocation.env[0].1.ends_with("GraalVM-0.9/jre/bin/javao"));
        assert_eq!(
            invocation.argv[4..].to_vec(),
            strings(&[
                "-J-server",
                "-J-XX:+UnlockDiagnosticVMOptions",
                "-J-XX:CompileCommand=print,*::callRoot"
            ])
        );
    }

    #[test]
    fn test_graal_missing_is_an_error() {
        let dir = TempDir::new().unwrap();
        let opts = RunOptions {
            graal: true,
            ..Default::default()
        };
        assert!(run_invocation(&Config::for_repo(dir.path()), Vec::new(), &opts, &[]).is_err());
    }

    #[test]
    fn test_flag_order() {
        let mut config = Config::for_repo("/repo");
        config.graal_js_jar = Some("/opt/trufflejs.jar".into());
        let opts = RunOptions {
            js: true,
            jdebug: true,
            jexception: true,
            server: true,
            ..Default::default()
        };
        let env = vec![("EXCLUDES".to_string(), "x".to_string())];
        let invocation = run_invocation(&config, env, &opts, &strings(&["a.rb"])).unwrap();
        assert_eq!(invocation.env.len(), 1);
        assert_eq!(
            invocation.argv[4..].to_vec(),
            vec![
                "-J-classpath".to_string(),
                "/opt/trufflejs.jar".to_string(),
                jdebug(),
                JEXCEPTION.to_string(),
                "-Xtruffle.instrumentation_server_port=8080".to_string(),
                "-Xtruffle.passalot=1".to_string(),
                "a.rb".to_string(),
            ]
        );
    }

    #[test]
    fn test_eval_helpers() {
        let config = Config::for_repo("/repo");
        let runner = RecordingRunner::default();
        eval_and_print(&config, &runner, "puts", &strings(&["14", "+", "2"])).unwrap();
        irb(&config, &runner, &[]).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(
            calls[0].argv[4..].to_vec(),
            strings(&["-e", "puts begin 14 + 2 end"])
        );
        assert_eq!(calls[1].argv[4..].to_vec(), strings(&["-S", "irb"]));
        assert!(calls.iter().all(|c| c.echo));
    }
}
