/// Launch requests loaded from JSON
///
/// ```json
/// {
///   "env": [["GREETING", "hi"], ["PAGER", null]],
///   "command": ["echo", "shout"],
///   "args": ["hello"],
///   "fds": [["out", ">>/tmp/log"], ["err", "&out"], ["in", "close"]],
///   "backend": "fork"
/// }
/// ```
///
/// `command` is either a string or a `[program, argv0]` pair. `env` and
/// `fds` are lists, not objects, so their order is preserved.
use crate::config::types::{Backend, Result, SpawnError};
use crate::spawn::actions::ActionSpec;
use crate::spawn::descriptor::DescriptorRef;
use crate::spawn::request::{CommandSpec, SpawnRequest};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandEntry {
    Line(String),
    Program(String, String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestFile {
    #[serde(default)]
    pub env: Vec<(String, Option<String>)>,
    pub command: CommandEntry,
    #[serde(default)]
    pub args: Vec<String>,
    /// `(key, action)` pairs in the CLI string syntax
    #[serde(default)]
    pub fds: Vec<(String, String)>,
    #[serde(default)]
    pub chdir: Option<PathBuf>,
    #[serde(default)]
    pub unsetenv_others: bool,
    #[serde(default)]
    pub backend: Option<Backend>,
}

impl RequestFile {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SpawnError::Config(format!(
                "Failed to read request file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| SpawnError::Config(format!("Failed to parse request JSON: {}", e)))
    }

    /// Convert into a request; fd strings are parsed here.
    pub fn into_request(self) -> Result<SpawnRequest> {
        let command = match self.command {
            CommandEntry::Line(line) => CommandSpec::Line(line),
            CommandEntry::Program(program, argv0) => CommandSpec::Program { program, argv0 },
        };

        let mut request = SpawnRequest::new(command).args(self.args).envs(self.env);
        for (key, action) in &self.fds {
            let key: DescriptorRef = key.parse()?;
            let action: ActionSpec = action.parse()?;
            request = request.option(key, action);
        }
        request.chdir = self.chdir;
        request.unsetenv_others = self.unsetenv_others;
        Ok(request)
    }
}
