//! Execution control
//!
//! Turns a compiled plan into a running child process.

pub mod executor;
pub mod preexec;
pub mod wait;
