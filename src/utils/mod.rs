//! Utilities
//!
//! Child environment construction and descriptor table helpers.

pub mod environ;
pub mod fd_table;
