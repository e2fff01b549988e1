use super::Executor;
use crate::command::{Command, CommandContext, ExitCode};
use crate::error::ExecError;
use crate::extras::{ensure_resolved, merge_for_shell};
use crate::process::{Invocation, ScratchFile, ShellFlavor};
use crate::renderer::render_joined;
use tracing::{debug, info};

const BANNER: &str = "System engine";

pub(super) fn execute(
    executor: &Executor,
    mut command: Command,
    context: &CommandContext,
) -> Result<ExitCode, ExecError> {
    merge_for_shell(&mut command, &context.extras);
    ensure_resolved(&command)?;

    let text = format!(
        "{}{}",
        executor.flavor.env_prefix(&command.envs),
        render_joined(&command)?
    );

    if !executor.confirmed(&command, BANNER, &text) {
        return Ok(0);
    }

    if context.dry_run {
        info!("Command to be executed: {}", text);
        return Ok(0);
    }

    debug!("Executing system command: {}", text);
    run_shell(executor, &text)
}

/// Hands fully rendered shell text to the native shell.
fn run_shell(executor: &Executor, text: &str) -> Result<ExitCode, ExecError> {
    match executor.flavor {
        ShellFlavor::Posix => {
            let invocation = Invocation::new("sh", vec!["-c".to_string(), text.to_string()]);
            executor.runner.run(&invocation).map_err(ExecError::Spawn)
        }
        ShellFlavor::PowerShell => {
            let script = ScratchFile::create("ps1", text).map_err(ExecError::ScratchFile)?;
            let invocation = Invocation::new(
                "powershell",
                vec![
                    "-NoProfile".to_string(),
                    "-ExecutionPolicy".to_string(),
                    "Bypass".to_string(),
                    "-File".to_string(),
                    script.path_string(),
                ],
            );
            executor.runner.run(&invocation).map_err(ExecError::Spawn)
        }
    }
}

/// A plain shell command that re-enters the system engine with no extras,
/// no confirmation and no rendering.
pub(super) fn delegate(executor: &Executor, origin: &Command, cmd: Vec<String>) -> Result<ExitCode, ExecError> {
    let command = Command {
        name: origin.name.clone(),
        cmd,
        envs: origin.envs.clone(),
        user_scope: origin.user_scope,
        ..Command::default()
    };
    debug!("Delegating {} to the system engine: {:?}", command.name, command.cmd);
    execute(executor, command, &CommandContext::default())
}
