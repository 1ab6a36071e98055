/// Child environment construction
///
/// The child's environment is built in the parent: start from the current
/// process environment (or nothing), apply overrides in order, then encode
/// everything as `NAME=value` C strings ready for exec.
use crate::config::types::{Result, SpawnError};
use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// PATH used for lookup when the child environment has none
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// Ordered environment of the child process
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChildEnv {
    vars: Vec<(OsString, OsString)>,
}

impl ChildEnv {
    /// Snapshot of the calling process environment
    pub fn inherit() -> Self {
        ChildEnv {
            vars: std::env::vars_os().collect(),
        }
    }

    pub fn empty() -> Self {
        ChildEnv::default()
    }

    /// Build the child environment for a set of ordered overrides.
    pub fn with_overrides(clear: bool, overrides: &[(String, Option<String>)]) -> Self {
        let mut env = if clear { Self::empty() } else { Self::inherit() };
        for (key, value) in overrides {
            match value {
                Some(value) => env.set(key, value),
                None => env.remove(key),
            }
        }
        env
    }

    pub fn set<K: AsRef<OsStr>, V: AsRef<OsStr>>(&mut self, key: K, value: V) {
        let key = key.as_ref();
        match self.vars.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.as_ref().to_os_string(),
            None => self
                .vars
                .push((key.to_os_string(), value.as_ref().to_os_string())),
        }
    }

    pub fn remove<K: AsRef<OsStr>>(&mut self, key: K) {
        let key = key.as_ref();
        let before = self.vars.len();
        self.vars.retain(|(k, _)| k != key);
        if self.vars.len() != before {
            log::debug!("Removed {:?} from child environment", key);
        }
    }

    pub fn get<K: AsRef<OsStr>>(&self, key: K) -> Option<&OsStr> {
        let key = key.as_ref();
        self.vars
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_os_str())
    }

    /// Encode as `NAME=value` entries.
    pub fn to_cstrings(&self) -> Result<Vec<CString>> {
        self.vars
            .iter()
            .map(|(k, v)| {
                let mut entry = Vec::with_capacity(k.len() + v.len() + 1);
                entry.extend_from_slice(k.as_bytes());
                entry.push(b'=');
                entry.extend_from_slice(v.as_bytes());
                CString::new(entry).map_err(|_| {
                    SpawnError::Argument(format!("environment entry {:?} contains NUL byte", k))
                })
            })
            .collect()
    }

    /// Locate `program` the way execvp does, using this environment's PATH.
    ///
    /// Names containing a slash are returned untouched. `None` means nothing
    /// executable was found; the launch still proceeds and the child reports
    /// the failure through its exit status.
    pub fn resolve_program(&self, program: &str) -> Option<PathBuf> {
        if program.contains('/') {
            return Some(PathBuf::from(program));
        }

        let search = self
            .get("PATH")
            .map(|p| p.to_os_string())
            .unwrap_or_else(|| OsString::from(DEFAULT_PATH));

        std::env::split_paths(&search)
            .map(|dir| {
                if dir.as_os_str().is_empty() {
                    PathBuf::from(".").join(program)
                } else {
                    dir.join(program)
                }
            })
            .find(|candidate| is_executable(candidate))
    }
}

fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

/// Encode a string for exec, rejecting interior NUL bytes.
pub fn to_cstring(what: &str, value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| SpawnError::Argument(format!("{} contains NUL byte: {:?}", what, value)))
}

/// Encode a path for exec, rejecting interior NUL bytes.
pub fn path_to_cstring(path: &Path) -> Result<CString> {
    CString::new(path.as_os_str().to_os_string().into_vec()).map_err(|_| {
        SpawnError::Argument(format!("path contains NUL byte: {}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_apply_in_order() {
        let env = ChildEnv::with_overrides(
            true,
            &[
                ("A".to_string(), Some("1".to_string())),
                ("B".to_string(), Some("2".to_string())),
                ("A".to_string(), None),
                ("B".to_string(), Some("3".to_string())),
            ],
        );
        assert_eq!(env.get("A"), None);
        assert_eq!(env.get("B"), Some(OsStr::new("3")));
        assert_eq!(env.to_cstrings().unwrap().len(), 1);
    }

    #[test]
    fn inherit_sees_parent_path() {
        let env = ChildEnv::with_overrides(false, &[]);
        assert_eq!(env.get("PATH").map(|p| p.to_os_string()), std::env::var_os("PATH"));
    }

    #[test]
    fn encodes_name_value_pairs() {
        let mut env = ChildEnv::empty();
        env.set("KEY", "value=with=equals");
        let entries = env.to_cstrings().unwrap();
        assert_eq!(entries[0].as_bytes(), b"KEY=value=with=equals");
    }

    #[test]
    fn nul_in_value_is_rejected() {
        let mut env = ChildEnv::empty();
        env.set("KEY", "bad\0value");
        assert!(env.to_cstrings().unwrap_err().is_argument());
    }

    #[test]
    fn resolves_sh_on_default_path() {
        let env = ChildEnv::empty();
        let sh = env.resolve_program("sh").expect("sh should be on the default PATH");
        assert!(sh.ends_with("sh"));
        assert_eq!(env.resolve_program("/bin/sh"), Some(PathBuf::from("/bin/sh")));
        assert_eq!(env.resolve_program("definitely-not-a-command-pspawn"), None);
    }
}
