use super::{Executor, system};
use crate::command::{Command, CommandContext, ExitCode};
use crate::error::ExecError;
use crate::extras::{apply_assignments, ensure_resolved, split_extras};
use crate::platform::PlatformFacts;
use crate::renderer::render_joined;
use crate::script::{Outcome, ScriptGlobals, run_script};
use tracing::{debug, info};

const BANNER: &str = "Script engine";

pub(super) fn execute(
    executor: &Executor,
    mut command: Command,
    context: &CommandContext,
) -> Result<ExitCode, ExecError> {
    let extras = split_extras(&context.extras);
    apply_assignments(&mut command, &extras.kv);
    ensure_resolved(&command)?;

    let source = render_joined(&command)?;

    if !executor.confirmed(&command, BANNER, &source) {
        return Ok(0);
    }

    if context.dry_run {
        info!("Script to be executed: {}", source);
        return Ok(0);
    }

    debug!("Executing script: {}", source);
    let globals = ScriptGlobals {
        command_name: command.name.clone(),
        template_vars: command.template_vars.clone(),
        envs: command.envs.clone(),
        positional: extras.positional,
    };

    match run_script(&command.name, &source, &globals, PlatformFacts::current())? {
        Outcome::NoOp => Ok(0),
        Outcome::ExitCode(code) => Ok(code),
        Outcome::Delegate(text) => system::delegate(executor, &command, vec![text]),
    }
}
