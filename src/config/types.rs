/// Core types shared across the pspawn crate
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Environment variable consulted by [`SpawnConfig::from_env`].
pub const BACKEND_ENV_VAR: &str = "PSPAWN_BACKEND";

/// Process-creation primitive used by the launch orchestrator
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// fork(2) followed by execve(2); descriptor actions run in the child
    #[serde(rename = "fork")]
    Fork,
    /// posix_spawn(3) with a file-actions object
    #[default]
    #[serde(rename = "posix_spawn")]
    PosixSpawn,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fork => "fork",
            Self::PosixSpawn => "posix_spawn",
        }
    }
}

impl FromStr for Backend {
    type Err = SpawnError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fork" | "fspawn" => Ok(Self::Fork),
            "posix_spawn" | "posix-spawn" | "pspawn" => Ok(Self::PosixSpawn),
            other => Err(SpawnError::Config(format!(
                "Unknown backend '{}' (expected fork or posix_spawn)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Launcher-wide settings
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnConfig {
    /// Backend used by [`crate::spawn`]
    #[serde(default)]
    pub backend: Backend,
}

impl SpawnConfig {
    /// Build the configuration from `PSPAWN_BACKEND`, falling back to defaults.
    ///
    /// An unparsable value is logged and ignored rather than failing the launch.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(BACKEND_ENV_VAR) {
            match raw.parse::<Backend>() {
                Ok(backend) => config.backend = backend,
                Err(e) => log::warn!("Ignoring {}: {}", BACKEND_ENV_VAR, e),
            }
        }
        config
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| SpawnError::Config(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| SpawnError::Config(format!("Failed to parse config JSON: {}", e)))
    }
}

/// Custom error types for pspawn
#[derive(Error, Debug)]
pub enum SpawnError {
    /// Malformed request shape, unsupported option key or value.
    /// Always raised before any process exists.
    #[error("Argument error: {0}")]
    Argument(String),

    /// EBADF-class failure reported synchronously by the platform
    #[error("Bad file descriptor: {0}")]
    Descriptor(String),

    #[error("OS error: {0}")]
    Os(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Map an errno returned by a process-creation primitive.
    pub fn from_errno(op: &str, errno: nix::errno::Errno) -> Self {
        match errno {
            nix::errno::Errno::EBADF => Self::Descriptor(format!("{}: {}", op, errno)),
            other => Self::Os(format!("{}: {}", op, other)),
        }
    }

    pub fn is_argument(&self) -> bool {
        matches!(self, Self::Argument(_))
    }

    pub fn is_descriptor(&self) -> bool {
        matches!(self, Self::Descriptor(_))
    }
}

pub type Result<T> = std::result::Result<T, SpawnError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_parses_aliases() {
        assert_eq!("fork".parse::<Backend>().unwrap(), Backend::Fork);
        assert_eq!("FSPAWN".parse::<Backend>().unwrap(), Backend::Fork);
        assert_eq!("posix-spawn".parse::<Backend>().unwrap(), Backend::PosixSpawn);
        assert!("vfork".parse::<Backend>().is_err());
    }

    #[test]
    fn config_json_defaults_backend() {
        let config: SpawnConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.backend, Backend::PosixSpawn);

        let config: SpawnConfig = serde_json::from_str(r#"{"backend":"fork"}"#).unwrap();
        assert_eq!(config.backend, Backend::Fork);
    }

    #[test]
    fn ebadf_maps_to_descriptor_error() {
        let err = SpawnError::from_errno("posix_spawn", nix::errno::Errno::EBADF);
        assert!(err.is_descriptor());

        let err = SpawnError::from_errno("posix_spawn", nix::errno::Errno::ENOMEM);
        assert!(matches!(err, SpawnError::Os(_)));
    }
}
