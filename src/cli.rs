use crate::config::request_file::RequestFile;
use crate::config::types::{Backend, SpawnConfig};
use crate::config::validator::validate_request;
use crate::exec::executor::spawner_for;
use crate::exec::wait::{wait, ChildStatus};
use crate::spawn::actions::ActionSpec;
use crate::spawn::descriptor::DescriptorRef;
use crate::spawn::plan::CompiledPlan;
use crate::spawn::request::{CommandSpec, SpawnRequest};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Launch a process with explicit descriptor actions", long_about = None)]
pub struct Cli {
    /// Set an environment variable in the child (NAME=VALUE)
    #[arg(short = 'e', long = "env", value_name = "NAME=VALUE")]
    env: Vec<String>,
    /// Remove a variable from the child's environment (applied after --env)
    #[arg(short = 'u', long = "unset", value_name = "NAME")]
    unset: Vec<String>,
    /// Start from an empty environment
    #[arg(long)]
    clear_env: bool,
    /// Name the child advertises as argv[0]
    #[arg(long)]
    argv0: Option<String>,
    /// Descriptor action KEY=ACTION, applied in order
    /// (KEY: in|out|err|N|a,b; ACTION: close|&REF|>PATH|>>PATH|<PATH|PATH)
    #[arg(short = 'f', long = "fd", value_name = "KEY=ACTION")]
    fds: Vec<String>,
    /// Working directory for the child (fork backend only)
    #[arg(short = 'C', long)]
    chdir: Option<PathBuf>,
    /// Process-creation backend (fork or posix_spawn)
    #[arg(long)]
    backend: Option<String>,
    /// Launcher settings as JSON, e.g. {"backend": "fork"}
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Load the launch from a JSON request file instead of the command line
    #[arg(long, value_name = "FILE", conflicts_with = "command")]
    request: Option<PathBuf>,
    /// Wait for the child and exit with its status
    #[arg(short = 'w', long)]
    wait: bool,
    /// Print the compiled plan instead of launching
    #[arg(long)]
    print_plan: bool,
    /// Command and arguments; a single argument may be a shell command line
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn split_pair<'a>(raw: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    raw.split_once('=')
        .ok_or_else(|| anyhow!("{} must look like KEY=VALUE, got '{}'", what, raw))
}

impl Cli {
    /// `--backend`, then the request file, then `--config`, then the environment.
    fn backend(&self, file_backend: Option<Backend>) -> Result<Backend> {
        if let Some(name) = &self.backend {
            return Ok(name.parse()?);
        }
        if let Some(backend) = file_backend {
            return Ok(backend);
        }
        let config = match &self.config {
            Some(path) => SpawnConfig::load_from_file(path)?,
            None => SpawnConfig::from_env(),
        };
        Ok(config.backend)
    }

    fn build_request(&self) -> Result<(SpawnRequest, Option<Backend>)> {
        if let Some(path) = &self.request {
            let file = RequestFile::load_from_file(path)?;
            let backend = file.backend;
            return Ok((file.into_request()?, backend));
        }

        let (first, rest) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("no command given"))?;

        let command = match &self.argv0 {
            Some(argv0) => CommandSpec::Program {
                program: first.clone(),
                argv0: argv0.clone(),
            },
            None => CommandSpec::Line(first.clone()),
        };

        let mut request = SpawnRequest::new(command).args(rest.iter().cloned());
        for raw in &self.env {
            let (name, value) = split_pair(raw, "--env")?;
            request = request.env(name, value);
        }
        for name in &self.unset {
            request = request.env_remove(name.as_str());
        }
        for raw in &self.fds {
            let (key, action) = split_pair(raw, "--fd")?;
            let key: DescriptorRef = key.parse()?;
            let action: ActionSpec = action.parse()?;
            request = request.option(key, action);
        }
        if let Some(dir) = &self.chdir {
            request = request.current_dir(dir.clone());
        }
        if self.clear_env {
            request = request.env_clear();
        }

        Ok((request, None))
    }
}

fn exit_code(status: ChildStatus) -> i32 {
    match status {
        ChildStatus::Exited(code) => code,
        ChildStatus::Signaled(sig) => 128 + sig,
    }
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let (request, file_backend) = cli.build_request()?;
    let backend = cli.backend(file_backend)?;

    let validation = validate_request(&request, false)?;
    for warning in &validation.warnings {
        log::warn!("{}", warning);
    }
    if !validation.is_valid() {
        bail!("invalid request:\n{}", validation.errors.join("\n"));
    }

    let plan = CompiledPlan::from_request(&request).context("failed to compile launch plan")?;
    if cli.print_plan {
        println!("{:#?}", plan);
        return Ok(());
    }

    let pid = spawner_for(backend)
        .spawn(&plan)
        .with_context(|| format!("failed to launch {}", plan.display_name))?;

    if !cli.wait {
        println!("{}", pid);
        return Ok(());
    }

    let status = wait(pid)?;
    log::info!("pid {} finished with {}", pid, status);
    std::process::exit(exit_code(status));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::descriptor::StdStream;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pspawn").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn builds_request_from_flags() {
        let cli = parse(&[
            "-e", "A=1", "-u", "B", "-f", "out=>>/tmp/log", "-f", "err=&out", "--argv0", "shout",
            "echo", "hello", "-n",
        ]);
        let (request, backend) = cli.build_request().unwrap();
        assert_eq!(backend, None);

        let expected = SpawnRequest::new(("echo", "shout"))
            .args(["hello", "-n"])
            .env("A", "1")
            .env_remove("B")
            .option(StdStream::Out, ">>/tmp/log".parse().unwrap())
            .redirect(StdStream::Err, StdStream::Out);
        assert_eq!(request, expected);
    }

    #[test]
    fn single_word_command_stays_a_line() {
        let cli = parse(&["true && exit 13"]);
        let (request, _) = cli.build_request().unwrap();
        assert_eq!(request.command, CommandSpec::Line("true && exit 13".to_string()));
    }

    #[test]
    fn malformed_fd_flag_is_rejected() {
        let cli = parse(&["-f", "out", "true"]);
        assert!(cli.build_request().is_err());
    }

    #[test]
    fn backend_flag_overrides_file() {
        let cli = parse(&["--backend", "fork", "true"]);
        assert_eq!(cli.backend(Some(Backend::PosixSpawn)).unwrap(), Backend::Fork);
        let cli = parse(&["true"]);
        assert_eq!(cli.backend(Some(Backend::Fork)).unwrap(), Backend::Fork);
    }

    #[test]
    fn config_file_selects_backend() {
        let path = std::env::temp_dir().join(format!("pspawn-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"backend": "fork"}"#).unwrap();
        let config = path.to_string_lossy().into_owned();

        let cli = parse(&["--config", &config, "true"]);
        assert_eq!(cli.backend(None).unwrap(), Backend::Fork);
        assert_eq!(cli.backend(Some(Backend::PosixSpawn)).unwrap(), Backend::PosixSpawn);

        std::fs::write(&path, "not json").unwrap();
        let cli = parse(&["--config", &config, "true"]);
        assert!(cli.backend(None).is_err());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn signal_exit_codes() {
        assert_eq!(exit_code(ChildStatus::Exited(3)), 3);
        assert_eq!(exit_code(ChildStatus::Signaled(9)), 137);
    }
}
