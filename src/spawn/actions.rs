//! Descriptor-action compiler.
//!
//! Turns the ordered option list of a request into the flat list of
//! close / dup2 / open operations applied in the child before exec. Order
//! matters: closing 0 and then duplicating onto 0 is not the same as the
//! reverse, so the compiled list is the single source of truth for the
//! launch backends.

use crate::config::types::{Result, SpawnError};
use crate::spawn::descriptor::DescriptorRef;
use std::os::unix::io::RawFd;
use std::path::PathBuf;
use std::str::FromStr;

/// How a redirect target file is opened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// `r+`: read and write an existing file
    ReadWrite,
    Truncate,
    /// `w+`
    TruncateReadWrite,
    Append,
    /// `a+`
    AppendReadWrite,
}

impl OpenMode {
    /// Interpret an `fopen`-style mode string.
    ///
    /// Anything containing `a` appends, anything starting with `r` reads,
    /// everything else truncates. A `+` adds the other direction.
    pub fn from_mode_str(mode: &str) -> Self {
        let update = mode.contains('+');
        match (mode.contains('a'), mode.starts_with('r'), update) {
            (true, _, false) => Self::Append,
            (true, _, true) => Self::AppendReadWrite,
            (false, true, false) => Self::Read,
            (false, true, true) => Self::ReadWrite,
            (false, false, false) => Self::Truncate,
            (false, false, true) => Self::TruncateReadWrite,
        }
    }

    /// Mode used for a bare path: stdin reads, everything else truncates.
    pub fn default_for(fd: RawFd) -> Self {
        if fd == libc::STDIN_FILENO {
            Self::Read
        } else {
            Self::Truncate
        }
    }

    pub fn oflag(self) -> nix::fcntl::OFlag {
        use nix::fcntl::OFlag;
        match self {
            Self::Read => OFlag::O_RDONLY,
            Self::ReadWrite => OFlag::O_RDWR,
            Self::Truncate => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
            Self::TruncateReadWrite => OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_TRUNC,
            Self::Append => OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_APPEND,
            Self::AppendReadWrite => OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_APPEND,
        }
    }
}

/// Permission bits for files created by redirects (before umask)
pub const REDIRECT_FILE_MODE: libc::mode_t = 0o644;

/// What to do with the descriptor(s) named by an option key
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionSpec {
    Close,
    /// Duplicate the source descriptor onto the key descriptor(s)
    Dup(DescriptorRef),
    /// Open `path` onto the key descriptor(s); `None` picks the per-fd default
    Open { path: PathBuf, mode: Option<OpenMode> },
}

impl ActionSpec {
    pub fn dup<R: Into<DescriptorRef>>(source: R) -> Self {
        Self::Dup(source.into())
    }

    pub fn open<P: Into<PathBuf>>(path: P) -> Self {
        Self::Open {
            path: path.into(),
            mode: None,
        }
    }

    /// Path plus mode string, as in `(path, "a")`.
    pub fn open_with_mode<P: Into<PathBuf>>(path: P, mode: &str) -> Self {
        Self::Open {
            path: path.into(),
            mode: Some(OpenMode::from_mode_str(mode)),
        }
    }
}

/// Parses `close`, `&REF`, `>PATH`, `>>PATH`, `<PATH` or a bare path.
impl FromStr for ActionSpec {
    type Err = SpawnError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(SpawnError::Argument("empty descriptor action".to_string()));
        }
        if s == "close" || s == "-" {
            return Ok(Self::Close);
        }
        if let Some(source) = s.strip_prefix('&') {
            return Ok(Self::Dup(source.parse()?));
        }

        let (path, mode) = if let Some(rest) = s.strip_prefix(">>") {
            (rest, Some(OpenMode::Append))
        } else if let Some(rest) = s.strip_prefix('>') {
            (rest, Some(OpenMode::Truncate))
        } else if let Some(rest) = s.strip_prefix('<') {
            (rest, Some(OpenMode::Read))
        } else {
            (s, None)
        };

        if path.is_empty() {
            return Err(SpawnError::Argument(format!(
                "unsupported descriptor action: {}",
                s
            )));
        }

        Ok(Self::Open {
            path: PathBuf::from(path),
            mode,
        })
    }
}

/// One low-level operation against the child's descriptor table
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConcreteAction {
    Close(RawFd),
    Dup2 { src: RawFd, dst: RawFd },
    Open { fd: RawFd, path: PathBuf, mode: OpenMode },
}

/// Ordered association list of descriptor options
pub type Options = Vec<(DescriptorRef, ActionSpec)>;

/// Compile options into concrete actions.
///
/// Validation covers the whole list before anything is returned. Whether a
/// descriptor is actually open is left to the launch, since that cannot be
/// known without trying.
pub fn compile(options: &[(DescriptorRef, ActionSpec)]) -> Result<Vec<ConcreteAction>> {
    let mut actions = Vec::with_capacity(options.len());

    for (key, action) in options {
        let targets = key.resolve()?;

        match action {
            ActionSpec::Close => {
                actions.extend(targets.into_iter().map(ConcreteAction::Close));
            }
            ActionSpec::Dup(source) => {
                let src = source.resolve_single()?;
                actions.extend(
                    targets
                        .into_iter()
                        .map(|dst| ConcreteAction::Dup2 { src, dst }),
                );
            }
            ActionSpec::Open { path, mode } => {
                if path.as_os_str().is_empty() {
                    return Err(SpawnError::Argument(format!(
                        "redirect for {:?} needs a file path",
                        key
                    )));
                }
                for fd in targets {
                    actions.push(ConcreteAction::Open {
                        fd,
                        path: path.clone(),
                        mode: mode.unwrap_or_else(|| OpenMode::default_for(fd)),
                    });
                }
            }
        }
    }

    log::debug!("Compiled {} option(s) into {} action(s)", options.len(), actions.len());
    Ok(actions)
}
