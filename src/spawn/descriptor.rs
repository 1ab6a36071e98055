//! Descriptor references and their resolution to concrete descriptor numbers.

use crate::config::types::{Result, SpawnError};
use std::os::unix::io::{AsRawFd, RawFd};
use std::str::FromStr;

/// One of the three standard streams
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StdStream {
    In,
    Out,
    Err,
}

impl StdStream {
    pub fn fd(self) -> RawFd {
        match self {
            Self::In => libc::STDIN_FILENO,
            Self::Out => libc::STDOUT_FILENO,
            Self::Err => libc::STDERR_FILENO,
        }
    }

    /// Match a symbolic stream name (`in`, `out`, `err`).
    pub fn from_symbol(name: &str) -> Option<Self> {
        match name {
            "in" | "stdin" => Some(Self::In),
            "out" | "stdout" => Some(Self::Out),
            "err" | "stderr" => Some(Self::Err),
            _ => None,
        }
    }
}

/// Something that names one or more descriptors in the child
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorRef {
    Stream(StdStream),
    Fd(RawFd),
    /// Descriptor number captured from an open handle
    Handle(RawFd),
    /// Several references sharing one action, expanded in member order
    Set(Vec<DescriptorRef>),
    /// A name that has not been resolved yet; only stream names are valid
    Symbol(String),
}

impl DescriptorRef {
    /// Capture the descriptor number of an open handle.
    pub fn handle<H: AsRawFd + ?Sized>(handle: &H) -> Self {
        Self::Handle(handle.as_raw_fd())
    }

    pub fn set<I, R>(members: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<DescriptorRef>,
    {
        Self::Set(members.into_iter().map(Into::into).collect())
    }

    /// Expand into concrete descriptor numbers, preserving member order.
    pub fn resolve(&self) -> Result<Vec<RawFd>> {
        let mut fds = Vec::new();
        self.resolve_into(&mut fds)?;
        Ok(fds)
    }

    fn resolve_into(&self, out: &mut Vec<RawFd>) -> Result<()> {
        match self {
            Self::Stream(stream) => out.push(stream.fd()),
            Self::Fd(fd) => {
                if *fd < 0 {
                    return Err(SpawnError::Argument(format!(
                        "descriptor number must be non-negative, got {}",
                        fd
                    )));
                }
                out.push(*fd);
            }
            Self::Handle(fd) => {
                if *fd < 0 {
                    return Err(SpawnError::Descriptor(format!(
                        "handle has no open descriptor ({})",
                        fd
                    )));
                }
                out.push(*fd);
            }
            Self::Set(members) => {
                if members.is_empty() {
                    return Err(SpawnError::Argument(
                        "descriptor set must not be empty".to_string(),
                    ));
                }
                for member in members {
                    member.resolve_into(out)?;
                }
            }
            Self::Symbol(name) => match StdStream::from_symbol(name) {
                Some(stream) => out.push(stream.fd()),
                None => {
                    return Err(SpawnError::Argument(format!(
                        "unsupported option: {}",
                        name
                    )))
                }
            },
        }
        Ok(())
    }

    /// Resolve to exactly one descriptor, as a dup source must.
    pub fn resolve_single(&self) -> Result<RawFd> {
        let fds = self.resolve()?;
        match fds.as_slice() {
            [fd] => Ok(*fd),
            _ => Err(SpawnError::Argument(format!(
                "expected a single descriptor, {:?} names {}",
                self,
                fds.len()
            ))),
        }
    }
}

impl From<StdStream> for DescriptorRef {
    fn from(stream: StdStream) -> Self {
        Self::Stream(stream)
    }
}

impl From<RawFd> for DescriptorRef {
    fn from(fd: RawFd) -> Self {
        Self::Fd(fd)
    }
}

impl From<&str> for DescriptorRef {
    fn from(name: &str) -> Self {
        Self::Symbol(name.to_string())
    }
}

impl From<std::io::Stdin> for DescriptorRef {
    fn from(_: std::io::Stdin) -> Self {
        Self::Stream(StdStream::In)
    }
}

impl From<std::io::Stdout> for DescriptorRef {
    fn from(_: std::io::Stdout) -> Self {
        Self::Stream(StdStream::Out)
    }
}

impl From<std::io::Stderr> for DescriptorRef {
    fn from(_: std::io::Stderr) -> Self {
        Self::Stream(StdStream::Err)
    }
}

impl<R: Into<DescriptorRef>> From<Vec<R>> for DescriptorRef {
    fn from(members: Vec<R>) -> Self {
        Self::set(members)
    }
}

/// Parses `in`, `out`, `err`, a decimal number, or a comma separated set.
///
/// Unknown names parse into [`DescriptorRef::Symbol`] and are rejected when
/// the options are compiled, so a bad key fails the whole request.
impl FromStr for DescriptorRef {
    type Err = SpawnError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SpawnError::Argument("empty descriptor reference".to_string()));
        }

        if s.contains(',') {
            let members = s
                .split(',')
                .map(str::parse::<DescriptorRef>)
                .collect::<Result<Vec<_>>>()?;
            return Ok(Self::Set(members));
        }

        if let Some(stream) = StdStream::from_symbol(s) {
            return Ok(Self::Stream(stream));
        }

        if s.bytes().all(|b| b.is_ascii_digit()) {
            return s
                .parse::<RawFd>()
                .map(Self::Fd)
                .map_err(|e| SpawnError::Argument(format!("bad descriptor '{}': {}", s, e)));
        }

        Ok(Self::Symbol(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_resolve_to_standard_numbers() {
        assert_eq!(DescriptorRef::from(StdStream::In).resolve().unwrap(), vec![0]);
        assert_eq!(DescriptorRef::from("out").resolve().unwrap(), vec![1]);
        assert_eq!(DescriptorRef::from(std::io::stderr()).resolve().unwrap(), vec![2]);
    }

    #[test]
    fn handle_captures_raw_fd() {
        let stdout = std::io::stdout();
        assert_eq!(DescriptorRef::handle(&stdout), DescriptorRef::Handle(1));
    }

    #[test]
    fn set_expands_in_member_order() {
        let set = DescriptorRef::set(vec![
            DescriptorRef::Fd(7),
            DescriptorRef::Stream(StdStream::Out),
            DescriptorRef::Handle(4),
        ]);
        assert_eq!(set.resolve().unwrap(), vec![7, 1, 4]);
    }

    #[test]
    fn unknown_symbol_is_argument_error() {
        let err = DescriptorRef::from("oops").resolve().unwrap_err();
        assert!(err.is_argument());
        assert!(err.to_string().contains("oops"));
    }

    #[test]
    fn negative_numbers_are_rejected() {
        assert!(DescriptorRef::Fd(-1).resolve().unwrap_err().is_argument());
        assert!(DescriptorRef::Handle(-1).resolve().unwrap_err().is_descriptor());
    }

    #[test]
    fn dup_source_must_be_single() {
        let set = DescriptorRef::set(vec![1, 2]);
        assert!(set.resolve_single().unwrap_err().is_argument());
        assert_eq!(DescriptorRef::Fd(9).resolve_single().unwrap(), 9);
    }

    #[test]
    fn parses_string_forms() {
        assert_eq!("err".parse::<DescriptorRef>().unwrap(), DescriptorRef::Stream(StdStream::Err));
        assert_eq!("12".parse::<DescriptorRef>().unwrap(), DescriptorRef::Fd(12));
        assert_eq!(
            "in,5".parse::<DescriptorRef>().unwrap(),
            DescriptorRef::Set(vec![DescriptorRef::Stream(StdStream::In), DescriptorRef::Fd(5)])
        );
        assert_eq!(
            "oops".parse::<DescriptorRef>().unwrap(),
            DescriptorRef::Symbol("oops".to_string())
        );
    }
}
