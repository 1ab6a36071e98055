//! Child-side launch sequence
//!
//! The sequence between fork and exec is FIXED:
//! 1. working directory change and environment selection
//! 2. descriptor actions, strictly in compiled order
//! 3. execve of the resolved program
//!
//! It is a type-state chain so a step cannot be skipped or reordered:
//!
//! Fresh -> EnvReady -> DescriptorsReady -> exec
//!
//! Everything the child touches is prepared in the parent by
//! [`PreparedLaunch::prepare`]; the child itself only issues system calls and
//! never allocates.
//!
//! Exec is only reachable once descriptors are applied:
//!
//! ```compile_fail
//! use pspawn::exec::preexec::{ChildSetup, PreparedLaunch};
//! use pspawn::{CompiledPlan, SpawnRequest};
//!
//! let plan = CompiledPlan::from_request(&SpawnRequest::new("true")).unwrap();
//! let prepared = PreparedLaunch::prepare(&plan).unwrap();
//! let child = ChildSetup::new(&prepared);
//! child.exec();
//! ```
//!
//! Each step consumes the previous state:
//!
//! ```compile_fail
//! use pspawn::exec::preexec::{ChildSetup, PreparedLaunch};
//! use pspawn::{CompiledPlan, SpawnRequest};
//!
//! let plan = CompiledPlan::from_request(&SpawnRequest::new("true")).unwrap();
//! let prepared = PreparedLaunch::prepare(&plan).unwrap();
//! let child = ChildSetup::new(&prepared);
//! let _ready = child.apply_environment();
//! let _again = child.apply_environment();
//! ```

use crate::config::types::Result;
use crate::spawn::actions::{ConcreteAction, REDIRECT_FILE_MODE};
use crate::spawn::plan::CompiledPlan;
use crate::utils::environ::{path_to_cstring, to_cstring, ChildEnv};
use crate::utils::fd_table::clear_cloexec;
use nix::errno::Errno;
use nix::fcntl::{open, OFlag};
use nix::sys::stat::Mode;
use nix::unistd::{chdir, close, dup2};
use std::ffi::{CStr, CString};
use std::marker::PhantomData;
use std::os::raw::c_char;
use std::os::unix::io::RawFd;

/// A descriptor action with its path already encoded
#[derive(Debug)]
pub enum PreparedAction {
    Close(RawFd),
    Dup2 { src: RawFd, dst: RawFd },
    Open { fd: RawFd, path: CString, oflag: OFlag },
}

/// C-level launch data, built in the parent before fork
#[derive(Debug)]
pub struct PreparedLaunch {
    /// Resolved executable, or the bare name when lookup failed
    pub(crate) exec_path: CString,
    pub(crate) resolved: bool,
    pub(crate) chdir: Option<CString>,
    pub(crate) actions: Vec<PreparedAction>,
    _argv: Vec<CString>,
    _envp: Vec<CString>,
    pub(crate) argv_ptrs: Vec<*mut c_char>,
    pub(crate) envp_ptrs: Vec<*mut c_char>,
}

fn null_terminated(strings: &[CString]) -> Vec<*mut c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr() as *mut c_char)
        .chain(std::iter::once(std::ptr::null_mut()))
        .collect()
}

impl PreparedLaunch {
    /// Encode a plan for the child.
    ///
    /// Program lookup uses the child's PATH, not the parent's.
    pub fn prepare(plan: &CompiledPlan) -> Result<Self> {
        let env = ChildEnv::with_overrides(plan.clear_env, &plan.env);

        let (exec_path, resolved) = match env.resolve_program(&plan.program) {
            Some(path) => (path_to_cstring(&path)?, true),
            None => {
                log::debug!("{} not found on child PATH", plan.program);
                (to_cstring("program", &plan.program)?, false)
            }
        };

        let argv = plan
            .argv
            .iter()
            .map(|arg| to_cstring("argument", arg))
            .collect::<Result<Vec<_>>>()?;
        let envp = env.to_cstrings()?;

        let chdir = plan.chdir.as_deref().map(path_to_cstring).transpose()?;

        let actions = plan
            .actions
            .iter()
            .map(|action| {
                Ok(match action {
                    ConcreteAction::Close(fd) => PreparedAction::Close(*fd),
                    ConcreteAction::Dup2 { src, dst } => PreparedAction::Dup2 {
                        src: *src,
                        dst: *dst,
                    },
                    ConcreteAction::Open { fd, path, mode } => PreparedAction::Open {
                        fd: *fd,
                        path: path_to_cstring(path)?,
                        oflag: mode.oflag(),
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let argv_ptrs = null_terminated(&argv);
        let envp_ptrs = null_terminated(&envp);

        Ok(PreparedLaunch {
            exec_path,
            resolved,
            chdir,
            actions,
            _argv: argv,
            _envp: envp,
            argv_ptrs,
            envp_ptrs,
        })
    }

    pub fn exec_path(&self) -> &CStr {
        &self.exec_path
    }

    /// Whether the program was found on the child's PATH
    pub fn is_resolved(&self) -> bool {
        self.resolved
    }
}

/// Type-state marker: just forked, nothing applied
pub struct Fresh;

/// Type-state marker: working directory and environment selected
pub struct EnvReady;

/// Type-state marker: all descriptor actions applied
pub struct DescriptorsReady;

/// Child process setup with type-state tracking
pub struct ChildSetup<'a, S> {
    launch: &'a PreparedLaunch,
    _state: PhantomData<S>,
}

impl<'a> ChildSetup<'a, Fresh> {
    pub fn new(launch: &'a PreparedLaunch) -> Self {
        ChildSetup {
            launch,
            _state: PhantomData,
        }
    }

    /// Step 1: change directory. The environment block itself was built
    /// before fork and is handed to execve in the last step.
    pub fn apply_environment(self) -> std::result::Result<ChildSetup<'a, EnvReady>, Errno> {
        if let Some(dir) = &self.launch.chdir {
            chdir(dir.as_c_str())?;
        }

        Ok(ChildSetup {
            launch: self.launch,
            _state: PhantomData,
        })
    }
}

impl<'a> ChildSetup<'a, EnvReady> {
    /// Step 2: apply descriptor actions in compiled order.
    ///
    /// The first failing action aborts the sequence; EBADF on an invalid
    /// descriptor lands here.
    pub fn apply_actions(self) -> std::result::Result<ChildSetup<'a, DescriptorsReady>, Errno> {
        for action in &self.launch.actions {
            match action {
                PreparedAction::Close(fd) => close(*fd)?,
                PreparedAction::Dup2 { src, dst } if src == dst => clear_cloexec(*src)?,
                PreparedAction::Dup2 { src, dst } => {
                    dup2(*src, *dst)?;
                }
                PreparedAction::Open { fd, path, oflag } => {
                    let opened = open(
                        path.as_c_str(),
                        *oflag,
                        Mode::from_bits_truncate(REDIRECT_FILE_MODE),
                    )?;
                    if opened != *fd {
                        dup2(opened, *fd)?;
                        close(opened)?;
                    }
                }
            }
        }

        Ok(ChildSetup {
            launch: self.launch,
            _state: PhantomData,
        })
    }
}

impl<'a> ChildSetup<'a, DescriptorsReady> {
    /// Step 3: replace the process image. Only returns on failure.
    pub fn exec(self) -> Errno {
        unsafe {
            libc::execve(
                self.launch.exec_path.as_ptr(),
                self.launch.argv_ptrs.as_ptr() as *const *const c_char,
                self.launch.envp_ptrs.as_ptr() as *const *const c_char,
            );
        }
        Errno::last()
    }
}

/// Run the whole chain in a freshly forked child. Never returns.
///
/// Any failure exits with status 127, the conventional "could not run"
/// status, so the parent sees it through wait rather than as an error.
pub fn run_child(launch: &PreparedLaunch) -> ! {
    let _ = ChildSetup::new(launch)
        .apply_environment()
        .and_then(|child| child.apply_actions())
        .map(|child| child.exec());

    unsafe { libc::_exit(127) }
}
