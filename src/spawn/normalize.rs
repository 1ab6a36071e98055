//! Argument normalizer.

use crate::config::types::{Result, SpawnError};
use crate::spawn::actions::Options;
use crate::spawn::request::{CommandSpec, EnvOverrides, SpawnRequest};
use std::path::PathBuf;

/// Interpreter used for single-string commands that need a shell
pub const SHELL: &str = "/bin/sh";

/// Characters that make a single-string command shell syntax
const SHELL_METACHARACTERS: &[char] = &[
    '*', '?', '{', '}', '[', ']', '<', '>', '(', ')', '~', '&', '|', '\\', '$', ';', '\'', '`',
    '"', '#', '=', '%', '!',
];

/// Executable to look up and the name advertised as argv[0]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Argv0Pair {
    pub program: String,
    pub argv0: String,
}

/// A request with every disambiguation decided
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedCall {
    pub env: EnvOverrides,
    pub argv0_pair: Argv0Pair,
    pub args: Vec<String>,
    pub options: Options,
    pub chdir: Option<PathBuf>,
    pub unsetenv_others: bool,
}

impl NormalizedCall {
    /// argv as the new image sees it
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 1);
        argv.push(self.argv0_pair.argv0.clone());
        argv.extend(self.args.iter().cloned());
        argv
    }
}

/// Whether a lone command string must be handed to the shell.
pub fn needs_shell(command: &str) -> bool {
    command
        .chars()
        .any(|c| c.is_whitespace() || SHELL_METACHARACTERS.contains(&c))
}

/// Resolve the request into its canonical form.
///
/// Only the shape is checked here; option contents are validated when the
/// plan is compiled.
pub fn normalize(request: &SpawnRequest) -> Result<NormalizedCall> {
    if request.command.is_empty() {
        return Err(SpawnError::Argument("empty command".to_string()));
    }

    let (argv0_pair, args) = match &request.command {
        CommandSpec::Line(line) if request.args.is_empty() && needs_shell(line) => {
            log::debug!("Wrapping command in {}: {:?}", SHELL, line);
            (
                Argv0Pair {
                    program: SHELL.to_string(),
                    argv0: SHELL.to_string(),
                },
                vec!["-c".to_string(), line.clone()],
            )
        }
        CommandSpec::Line(line) => (
            Argv0Pair {
                program: line.clone(),
                argv0: line.clone(),
            },
            request.args.clone(),
        ),
        CommandSpec::Program { program, argv0 } => (
            Argv0Pair {
                program: program.clone(),
                argv0: argv0.clone(),
            },
            request.args.clone(),
        ),
    };

    Ok(NormalizedCall {
        env: request.env.clone(),
        argv0_pair,
        args,
        options: request.options.clone(),
        chdir: request.chdir.clone(),
        unsetenv_others: request.unsetenv_others,
    })
}
