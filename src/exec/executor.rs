//! Launch orchestration
//!
//! Hands a compiled plan to a process-creation primitive and returns the
//! child's pid without waiting. Two primitives are available:
//!
//! - [`ForkSpawner`]: fork, then the child-side chain in `preexec`.
//!   Invalid descriptors and missing programs show up as exit status 127.
//! - [`PosixSpawner`]: posix_spawn. Depending on the C library, the same
//!   failures may instead come back synchronously as an error.
//!
//! Callers must accept both channels.

use crate::config::types::{Backend, Result, SpawnError};
use crate::exec::preexec::{run_child, PreparedAction, PreparedLaunch};
use crate::spawn::actions::REDIRECT_FILE_MODE;
use crate::spawn::plan::CompiledPlan;
use crate::utils::fd_table::is_open;
use nix::errno::Errno;
use nix::unistd::{fork, ForkResult, Pid};
use std::collections::HashSet;
use std::mem::MaybeUninit;
use std::os::raw::c_char;
use std::os::unix::io::RawFd;

/// A process-creation primitive
pub trait Spawner {
    fn backend(&self) -> Backend;

    /// Start the plan's program and return its pid.
    fn spawn(&self, plan: &CompiledPlan) -> Result<Pid>;
}

/// Select the spawner for a backend
pub fn spawner_for(backend: Backend) -> Box<dyn Spawner> {
    match backend {
        Backend::Fork => Box::new(ForkSpawner),
        Backend::PosixSpawn => Box::new(PosixSpawner),
    }
}

/// fork(2) + execve(2)
#[derive(Clone, Copy, Debug, Default)]
pub struct ForkSpawner;

impl Spawner for ForkSpawner {
    fn backend(&self) -> Backend {
        Backend::Fork
    }

    fn spawn(&self, plan: &CompiledPlan) -> Result<Pid> {
        let launch = PreparedLaunch::prepare(plan)?;

        // Child only runs the prepared chain: no allocation, no locks.
        match unsafe { fork() }.map_err(|e| SpawnError::from_errno("fork", e))? {
            ForkResult::Child => run_child(&launch),
            ForkResult::Parent { child } => {
                log::info!(
                    "Spawned {} as pid {} via fork ({} action(s))",
                    plan.display_name,
                    child,
                    plan.actions.len()
                );
                Ok(child)
            }
        }
    }
}

/// posix_spawn(3) with the program already resolved on the child's PATH
#[derive(Clone, Copy, Debug, Default)]
pub struct PosixSpawner;

fn check(op: &str, rc: libc::c_int) -> Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(SpawnError::from_errno(op, Errno::from_i32(rc)))
    }
}

/// Reject closes of descriptors that will not be open in the child.
///
/// glibc silently ignores EBADF from a close file action, so the check is
/// made here against this process's table, tracking what earlier actions
/// open and close.
fn check_closes(actions: &[PreparedAction]) -> Result<()> {
    let mut opened: HashSet<RawFd> = HashSet::new();
    let mut closed: HashSet<RawFd> = HashSet::new();

    for action in actions {
        match action {
            PreparedAction::Close(fd) => {
                let live = opened.contains(fd) || (!closed.contains(fd) && is_open(*fd));
                if !live {
                    return Err(SpawnError::Descriptor(format!(
                        "close of descriptor {} which is not open",
                        fd
                    )));
                }
                opened.remove(fd);
                closed.insert(*fd);
            }
            PreparedAction::Dup2 { dst: fd, .. } | PreparedAction::Open { fd, .. } => {
                closed.remove(fd);
                opened.insert(*fd);
            }
        }
    }
    Ok(())
}

/// Owned posix_spawn_file_actions_t
struct FileActions(libc::posix_spawn_file_actions_t);

impl FileActions {
    fn new() -> Result<Self> {
        let mut raw = MaybeUninit::<libc::posix_spawn_file_actions_t>::uninit();
        check("posix_spawn_file_actions_init", unsafe {
            libc::posix_spawn_file_actions_init(raw.as_mut_ptr())
        })?;
        Ok(FileActions(unsafe { raw.assume_init() }))
    }

    fn add(&mut self, action: &PreparedAction) -> Result<()> {
        match action {
            PreparedAction::Close(fd) => check("posix_spawn_file_actions_addclose", unsafe {
                libc::posix_spawn_file_actions_addclose(&mut self.0, *fd)
            }),
            PreparedAction::Dup2 { src, dst } => check("posix_spawn_file_actions_adddup2", unsafe {
                libc::posix_spawn_file_actions_adddup2(&mut self.0, *src, *dst)
            }),
            PreparedAction::Open { fd, path, oflag } => {
                check("posix_spawn_file_actions_addopen", unsafe {
                    libc::posix_spawn_file_actions_addopen(
                        &mut self.0,
                        *fd,
                        path.as_ptr(),
                        oflag.bits(),
                        REDIRECT_FILE_MODE,
                    )
                })
            }
        }
    }
}

impl Drop for FileActions {
    fn drop(&mut self) {
        unsafe {
            libc::posix_spawn_file_actions_destroy(&mut self.0);
        }
    }
}

/// Owned posix_spawnattr_t
struct SpawnAttr(libc::posix_spawnattr_t);

impl SpawnAttr {
    fn new() -> Result<Self> {
        let mut raw = MaybeUninit::<libc::posix_spawnattr_t>::uninit();
        check("posix_spawnattr_init", unsafe {
            libc::posix_spawnattr_init(raw.as_mut_ptr())
        })?;
        Ok(SpawnAttr(unsafe { raw.assume_init() }))
    }

    fn set_flags(&mut self, flags: libc::c_short) -> Result<()> {
        check("posix_spawnattr_setflags", unsafe {
            libc::posix_spawnattr_setflags(&mut self.0, flags)
        })
    }
}

/// Attribute flags for every posix_spawn launch
#[cfg(target_env = "gnu")]
const SPAWN_FLAGS: libc::c_short = libc::POSIX_SPAWN_USEVFORK as libc::c_short;

#[cfg(not(target_env = "gnu"))]
const SPAWN_FLAGS: libc::c_short = 0;

impl Drop for SpawnAttr {
    fn drop(&mut self) {
        unsafe {
            libc::posix_spawnattr_destroy(&mut self.0);
        }
    }
}

impl Spawner for PosixSpawner {
    fn backend(&self) -> Backend {
        Backend::PosixSpawn
    }

    fn spawn(&self, plan: &CompiledPlan) -> Result<Pid> {
        if let Some(dir) = &plan.chdir {
            return Err(SpawnError::Argument(format!(
                "chdir ({}) is not supported by the posix_spawn backend",
                dir.display()
            )));
        }

        let launch = PreparedLaunch::prepare(plan)?;
        // posix_spawnp would search the parent's PATH, not the child's.
        if !launch.is_resolved() {
            return Err(SpawnError::from_errno(
                &format!("posix_spawn {}", plan.program),
                Errno::ENOENT,
            ));
        }
        check_closes(&launch.actions)?;

        let mut file_actions = FileActions::new()?;
        for action in &launch.actions {
            file_actions.add(action)?;
        }
        let mut attr = SpawnAttr::new()?;
        if SPAWN_FLAGS != 0 {
            attr.set_flags(SPAWN_FLAGS)?;
        }

        let mut pid: libc::pid_t = 0;
        let exec_path: *const c_char = launch.exec_path().as_ptr();
        check("posix_spawn", unsafe {
            libc::posix_spawn(
                &mut pid,
                exec_path,
                &file_actions.0,
                &attr.0,
                launch.argv_ptrs.as_ptr(),
                launch.envp_ptrs.as_ptr(),
            )
        })?;

        let pid = Pid::from_raw(pid);
        log::info!(
            "Spawned {} as pid {} via posix_spawn ({} action(s))",
            plan.display_name,
            pid,
            plan.actions.len()
        );
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::wait::wait;
    use crate::spawn::request::SpawnRequest;

    fn plan(request: SpawnRequest) -> CompiledPlan {
        CompiledPlan::from_request(&request).unwrap()
    }

    #[test]
    fn spawner_for_matches_backend() {
        assert_eq!(spawner_for(Backend::Fork).backend(), Backend::Fork);
        assert_eq!(spawner_for(Backend::PosixSpawn).backend(), Backend::PosixSpawn);
    }

    #[test]
    fn both_backends_run_true() {
        for spawner in [spawner_for(Backend::Fork), spawner_for(Backend::PosixSpawn)] {
            let pid = spawner.spawn(&plan(SpawnRequest::new("true"))).unwrap();
            assert!(wait(pid).unwrap().success());
        }
    }

    #[test]
    fn fork_missing_program_exits_127() {
        let pid = ForkSpawner
            .spawn(&plan(SpawnRequest::new("no-such-program-pspawn")))
            .unwrap();
        assert_eq!(wait(pid).unwrap().code(), Some(127));
    }

    #[test]
    fn close_check_tracks_earlier_actions() {
        assert!(check_closes(&[PreparedAction::Close(1)]).is_ok());
        assert!(check_closes(&[PreparedAction::Close(900)])
            .unwrap_err()
            .is_descriptor());
        assert!(check_closes(&[
            PreparedAction::Dup2 { src: 1, dst: 900 },
            PreparedAction::Close(900),
        ])
        .is_ok());
        assert!(check_closes(&[PreparedAction::Close(2), PreparedAction::Close(2)])
            .unwrap_err()
            .is_descriptor());
    }

    #[test]
    fn posix_spawn_missing_program_is_synchronous() {
        let err = PosixSpawner
            .spawn(&plan(SpawnRequest::new("no-such-program-pspawn")))
            .unwrap_err();
        assert!(matches!(err, SpawnError::Os(ref msg) if msg.contains("no-such-program-pspawn")));
    }

    #[test]
    fn posix_spawn_uses_child_path() {
        let request = SpawnRequest::new("sh")
            .args(["-c", "exit 4"])
            .env("PATH", "/nonexistent");
        assert!(PosixSpawner.spawn(&plan(request)).is_err());

        let request = SpawnRequest::new("sh")
            .args(["-c", "exit 4"])
            .env_clear();
        let pid = PosixSpawner.spawn(&plan(request)).unwrap();
        assert_eq!(wait(pid).unwrap().code(), Some(4));
    }

    #[test]
    fn spawn_attr_accepts_flags() {
        let mut attr = SpawnAttr::new().unwrap();
        attr.set_flags(SPAWN_FLAGS).unwrap();
        let mut flags: libc::c_short = -1;
        assert_eq!(unsafe { libc::posix_spawnattr_getflags(&attr.0, &mut flags) }, 0);
        assert_eq!(flags, SPAWN_FLAGS);
    }

    #[test]
    fn posix_spawn_rejects_chdir() {
        let err = PosixSpawner
            .spawn(&plan(SpawnRequest::new("true").current_dir("/")))
            .unwrap_err();
        assert!(err.is_argument());
    }
}
