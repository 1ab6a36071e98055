/// Waiting for launched children
use crate::config::types::{Result, SpawnError};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;

/// How a child terminated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildStatus {
    Exited(i32),
    Signaled(i32),
}

impl ChildStatus {
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }

    pub fn signal(&self) -> Option<i32> {
        match self {
            Self::Exited(_) => None,
            Self::Signaled(sig) => Some(*sig),
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

impl std::fmt::Display for ChildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exit status {}", code),
            Self::Signaled(sig) => write!(f, "terminated by signal {}", sig),
        }
    }
}

/// Block until `pid` terminates and reap it.
pub fn wait(pid: Pid) -> Result<ChildStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ChildStatus::Exited(code)),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(ChildStatus::Signaled(sig as i32)),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(SpawnError::Os(format!("waitpid({}): {}", pid, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accessors() {
        assert!(ChildStatus::Exited(0).success());
        assert_eq!(ChildStatus::Exited(127).code(), Some(127));
        assert_eq!(ChildStatus::Signaled(9).code(), None);
        assert_eq!(ChildStatus::Signaled(9).signal(), Some(9));
        assert_eq!(ChildStatus::Exited(3).to_string(), "exit status 3");
    }

    #[test]
    fn waiting_on_unknown_child_fails() {
        assert!(wait(Pid::from_raw(i32::MAX)).is_err());
    }
}
