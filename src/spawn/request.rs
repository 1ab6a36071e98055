//! Launch requests: the explicit form of a shell-like spawn call.

use crate::spawn::actions::{ActionSpec, Options};
use crate::spawn::descriptor::DescriptorRef;
use std::path::PathBuf;

/// Ordered `(name, value)` overrides; `None` unsets the variable in the child
pub type EnvOverrides = Vec<(String, Option<String>)>;

/// The command half of a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandSpec {
    /// A single string. Without further arguments it may be run through
    /// `/bin/sh -c` when it looks like shell syntax.
    Line(String),
    /// An executable to look up plus the name the process advertises as argv[0]
    Program { program: String, argv0: String },
}

impl CommandSpec {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Line(line) => line.trim().is_empty(),
            Self::Program { program, .. } => program.is_empty(),
        }
    }
}

impl From<&str> for CommandSpec {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<String> for CommandSpec {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

impl<P: Into<String>, A: Into<String>> From<(P, A)> for CommandSpec {
    fn from((program, argv0): (P, A)) -> Self {
        Self::Program {
            program: program.into(),
            argv0: argv0.into(),
        }
    }
}

/// A spawn call with every optional part named.
///
/// ```
/// use pspawn::{SpawnRequest, StdStream};
///
/// let request = SpawnRequest::new("echo")
///     .arg("hello")
///     .env("GREETING", "hi")
///     .env_remove("PAGER")
///     .close(StdStream::Err);
/// assert_eq!(request.args, vec!["hello".to_string()]);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnRequest {
    pub env: EnvOverrides,
    pub command: CommandSpec,
    pub args: Vec<String>,
    pub options: Options,
    /// Working directory for the child
    pub chdir: Option<PathBuf>,
    /// Start from an empty environment instead of the parent's
    pub unsetenv_others: bool,
}

impl SpawnRequest {
    pub fn new<C: Into<CommandSpec>>(command: C) -> Self {
        Self {
            env: Vec::new(),
            command: command.into(),
            args: Vec::new(),
            options: Vec::new(),
            chdir: None,
            unsetenv_others: false,
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.env.push((key.into(), Some(value.into())));
        self
    }

    /// Make sure `key` is absent from the child's environment.
    pub fn env_remove<K: Into<String>>(mut self, key: K) -> Self {
        self.env.push((key.into(), None));
        self
    }

    pub fn envs(mut self, overrides: EnvOverrides) -> Self {
        self.env.extend(overrides);
        self
    }

    /// Append a descriptor option; options apply in the order added.
    pub fn option<R: Into<DescriptorRef>>(mut self, key: R, action: ActionSpec) -> Self {
        self.options.push((key.into(), action));
        self
    }

    pub fn close<R: Into<DescriptorRef>>(self, key: R) -> Self {
        self.option(key, ActionSpec::Close)
    }

    pub fn redirect<R: Into<DescriptorRef>, S: Into<DescriptorRef>>(self, key: R, source: S) -> Self {
        self.option(key, ActionSpec::Dup(source.into()))
    }

    pub fn redirect_to_file<R: Into<DescriptorRef>, P: Into<PathBuf>>(self, key: R, path: P) -> Self {
        self.option(key, ActionSpec::open(path))
    }

    /// Run the child in `dir`. Only the fork backend supports this.
    ///
    /// The directory change happens before descriptor actions, so relative
    /// redirect paths resolve against `dir`, not the caller's directory.
    pub fn current_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.chdir = Some(dir.into());
        self
    }

    pub fn env_clear(mut self) -> Self {
        self.unsetenv_others = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::descriptor::StdStream;

    #[test]
    fn builder_keeps_insertion_order() {
        let request = SpawnRequest::new("cmd")
            .env("B", "2")
            .env_remove("A")
            .env("A", "1")
            .close(StdStream::Out)
            .redirect(StdStream::Err, StdStream::Out);

        assert_eq!(
            request.env,
            vec![
                ("B".to_string(), Some("2".to_string())),
                ("A".to_string(), None),
                ("A".to_string(), Some("1".to_string())),
            ]
        );
        assert_eq!(request.options.len(), 2);
        assert_eq!(request.options[0].1, ActionSpec::Close);
    }

    #[test]
    fn pair_becomes_program_spec() {
        let request = SpawnRequest::new(("true", "not-true"));
        assert_eq!(
            request.command,
            CommandSpec::Program {
                program: "true".to_string(),
                argv0: "not-true".to_string()
            }
        );
    }

    #[test]
    fn empty_command_detection() {
        assert!(CommandSpec::from("   ").is_empty());
        assert!(CommandSpec::from(("", "x")).is_empty());
        assert!(!CommandSpec::from("ls").is_empty());
    }
}
