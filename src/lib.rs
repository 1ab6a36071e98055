//! pspawn: fast child process launching with explicit descriptor actions
//!
//! A launch is described by a [`SpawnRequest`], normalized, compiled into a
//! [`CompiledPlan`] and handed to a process-creation primitive. The caller
//! gets a pid back immediately and waits on it separately.
//!
//! # Architecture
//!
//! ## Request Compilation ([`spawn`](crate::spawn))
//! - [`spawn::request`]: the request builder (env overrides, command, args, options)
//! - [`spawn::normalize`]: disambiguation and `/bin/sh -c` wrapping
//! - [`spawn::descriptor`]: descriptor references and their resolution
//! - [`spawn::actions`]: compilation of options into close/dup2/open actions
//! - [`spawn::plan`]: the complete launch plan
//!
//! ## Execution Control ([`exec`])
//! - [`exec::executor`]: fork and posix_spawn backends
//! - [`exec::preexec`]: type-state enforced child-side ordering
//! - [`exec::wait`]: reaping children
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: errors, backends, launcher config
//! - [`config::request_file`]: JSON launch requests
//! - [`config::validator`]: pre-flight request checks
//!
//! ## Utilities ([`utils`])
//! - [`utils::environ`]: child environment construction and program lookup
//! - [`utils::fd_table`]: descriptor table helpers
//!
//! # Failure channels
//!
//! Malformed requests fail synchronously with [`SpawnError::Argument`]
//! before any process exists. Failures inside the child (a bad descriptor,
//! a missing program) usually surface as exit status 127, but a backend may
//! report them synchronously instead. Callers must handle both.
//!
//! ```no_run
//! use pspawn::{spawn, wait, SpawnRequest, StdStream};
//!
//! let request = SpawnRequest::new("echo")
//!     .arg("hello world")
//!     .redirect_to_file(StdStream::Out, "/tmp/greeting");
//! let pid = spawn(&request)?;
//! assert!(wait(pid)?.success());
//! # Ok::<(), pspawn::SpawnError>(())
//! ```

// Request Compilation
pub mod spawn;

// Execution Control
pub mod exec;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the pspawn binary.
pub mod cli;

pub use config::types::{Backend, Result, SpawnConfig, SpawnError};
pub use exec::executor::{spawner_for, ForkSpawner, PosixSpawner, Spawner};
pub use exec::wait::{wait, ChildStatus};
pub use nix::unistd::Pid;
pub use spawn::actions::{ActionSpec, ConcreteAction, OpenMode};
pub use spawn::descriptor::{DescriptorRef, StdStream};
pub use spawn::normalize::{normalize, Argv0Pair, NormalizedCall};
pub use spawn::plan::{compile_plan, CompiledPlan};
pub use spawn::request::{CommandSpec, SpawnRequest};

/// Normalize, compile and launch `request` with a specific spawner.
pub fn spawn_with(spawner: &dyn Spawner, request: &SpawnRequest) -> Result<Pid> {
    let plan = CompiledPlan::from_request(request)?;
    log::debug!("Launch plan ({}): {:?}", spawner.backend(), plan);
    spawner.spawn(&plan)
}

/// Launch with the backend named by `PSPAWN_BACKEND` (posix_spawn by default).
pub fn spawn(request: &SpawnRequest) -> Result<Pid> {
    let config = SpawnConfig::from_env();
    spawn_with(spawner_for(config.backend).as_ref(), request)
}

/// Launch through fork + exec.
pub fn fspawn(request: &SpawnRequest) -> Result<Pid> {
    spawn_with(&ForkSpawner, request)
}

/// Launch through posix_spawn.
pub fn pspawn(request: &SpawnRequest) -> Result<Pid> {
    spawn_with(&PosixSpawner, request)
}
