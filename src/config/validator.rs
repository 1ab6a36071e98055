// Request Validation
// Pre-flight checks run before a request is compiled. Errors describe
// requests that cannot launch at all; warnings describe requests that will
// launch but probably not the way the caller meant.

use crate::config::types::{Result, SpawnError};
use crate::spawn::actions::ActionSpec;
use crate::spawn::request::{CommandSpec, SpawnRequest};
use std::collections::HashSet;

/// Validation result with detailed errors
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a request before launch.
///
/// With `strict` set, any error fails the call; otherwise the caller decides
/// what to do with the collected result.
pub fn validate_request(request: &SpawnRequest, strict: bool) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_command(request, &mut result);
    validate_environment(request, &mut result);
    validate_options(request, &mut result);
    validate_chdir(request, &mut result);

    if strict && !result.is_valid() {
        return Err(SpawnError::Argument(format!(
            "Request validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_command(request: &SpawnRequest, result: &mut ValidationResult) {
    if request.command.is_empty() {
        result.add_error("command is empty".to_string());
        return;
    }

    let program = match &request.command {
        CommandSpec::Line(line) => line,
        CommandSpec::Program { program, argv0 } => {
            if argv0.is_empty() {
                result.add_warning(format!("{} will run with an empty argv[0]", program));
            }
            program
        }
    };

    if program.contains('\0') || request.args.iter().any(|a| a.contains('\0')) {
        result.add_error("command or argument contains NUL byte".to_string());
    }

    let has_path_override = request.env.iter().any(|(k, v)| k == "PATH" && v.is_some());
    if request.unsetenv_others && !has_path_override && !program.contains('/') {
        result.add_warning(format!(
            "environment is cleared without PATH; {} will be looked up on the default PATH",
            program
        ));
    }
}

fn validate_environment(request: &SpawnRequest, result: &mut ValidationResult) {
    let mut seen = HashSet::new();
    for (name, value) in &request.env {
        if name.is_empty() || name.contains('=') || name.contains('\0') {
            result.add_error(format!("invalid environment variable name: {:?}", name));
        }
        if value.as_deref().is_some_and(|v| v.contains('\0')) {
            result.add_error(format!("value of {} contains NUL byte", name));
        }
        if !seen.insert(name.as_str()) {
            result.add_warning(format!("{} is overridden more than once; last wins", name));
        }
    }
}

fn validate_options(request: &SpawnRequest, result: &mut ValidationResult) {
    let mut targeted = HashSet::new();

    for (key, action) in &request.options {
        let fds = match key.resolve() {
            Ok(fds) => fds,
            Err(e) => {
                result.add_error(e.to_string());
                continue;
            }
        };

        match action {
            ActionSpec::Dup(source) => {
                if let Err(e) = source.resolve_single() {
                    result.add_error(e.to_string());
                }
            }
            ActionSpec::Open { path, .. } => {
                if path.as_os_str().is_empty() {
                    result.add_error(format!("redirect for {:?} has an empty path", key));
                } else if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        result.add_warning(format!(
                            "redirect target directory {} does not exist",
                            parent.display()
                        ));
                    }
                }
            }
            ActionSpec::Close => {}
        }

        for fd in fds {
            if !targeted.insert(fd) {
                result.add_warning(format!(
                    "descriptor {} is targeted by more than one option; they apply in order",
                    fd
                ));
            }
        }
    }
}

fn validate_chdir(request: &SpawnRequest, result: &mut ValidationResult) {
    if let Some(dir) = &request.chdir {
        if !dir.is_dir() {
            result.add_warning(format!(
                "working directory {} does not exist; the child will fail with status 127",
                dir.display()
            ));
        }
    }
}
