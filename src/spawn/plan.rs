use crate::config::types::{Result, SpawnError};
use crate::spawn::actions::{compile, ConcreteAction};
use crate::spawn::normalize::{normalize, NormalizedCall};
use crate::spawn::request::SpawnRequest;
use std::path::PathBuf;

/// Everything a backend needs for one launch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledPlan {
    /// Overrides applied on top of the base environment, in order
    pub env: Vec<(String, Option<String>)>,
    /// Base environment is empty instead of the parent's
    pub clear_env: bool,
    pub chdir: Option<PathBuf>,
    /// Name looked up on PATH (or used directly when it contains a slash)
    pub program: String,
    /// argv[0] is the advertised process name
    pub argv: Vec<String>,
    pub display_name: String,
    pub actions: Vec<ConcreteAction>,
}

/// Compile a normalized call into a launch plan.
pub fn compile_plan(call: NormalizedCall) -> Result<CompiledPlan> {
    for (name, _) in &call.env {
        if name.is_empty() || name.contains('=') || name.contains('\0') {
            return Err(SpawnError::Argument(format!(
                "invalid environment variable name: {:?}",
                name
            )));
        }
    }

    let actions = compile(&call.options)?;
    let argv = call.argv();

    Ok(CompiledPlan {
        env: call.env,
        clear_env: call.unsetenv_others,
        chdir: call.chdir,
        program: call.argv0_pair.program,
        display_name: call.argv0_pair.argv0,
        argv,
        actions,
    })
}

impl CompiledPlan {
    /// Normalize and compile a request in one step.
    pub fn from_request(request: &SpawnRequest) -> Result<Self> {
        compile_plan(normalize(request)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn::actions::OpenMode;
    use crate::spawn::descriptor::StdStream;

    #[test]
    fn plan_carries_argv_and_actions() {
        let request = SpawnRequest::new(("echo", "shout"))
            .arg("hi")
            .redirect_to_file(StdStream::Out, "/tmp/pspawn-plan")
            .env_remove("TERM");
        let plan = CompiledPlan::from_request(&request).unwrap();

        assert_eq!(plan.program, "echo");
        assert_eq!(plan.display_name, "shout");
        assert_eq!(plan.argv, vec!["shout", "hi"]);
        assert_eq!(plan.env, vec![("TERM".to_string(), None)]);
        assert_eq!(
            plan.actions,
            vec![ConcreteAction::Open {
                fd: 1,
                path: PathBuf::from("/tmp/pspawn-plan"),
                mode: OpenMode::Truncate,
            }]
        );
    }

    #[test]
    fn bad_env_name_is_rejected() {
        let request = SpawnRequest::new("true").env("A=B", "c");
        assert!(CompiledPlan::from_request(&request).unwrap_err().is_argument());
    }

    #[test]
    fn bad_option_fails_before_any_plan() {
        let request = SpawnRequest::new("echo howdy")
            .redirect_to_file(StdStream::Out, "/dev/null")
            .redirect_to_file("oops", "blaahh");
        assert!(CompiledPlan::from_request(&request).unwrap_err().is_argument());
    }
}
