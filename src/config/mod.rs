//! Configuration
//!
//! Error taxonomy, backend selection, request files and request validation.

pub mod request_file;
pub mod types;
pub mod validator;
