use super::{Executor, system};
use crate::command::{Command, CommandContext, ExitCode};
use crate::error::ExecError;
use crate::extras::{apply_assignments, ensure_resolved, split_extras};
use crate::process::ScratchFile;
use crate::renderer::render_joined;
use tracing::{debug, info};

const BANNER: &str = "Compile-and-run engine";

/// Toolchain invocation, followed by the source file path.
const TOOLCHAIN: &str = "dotnet run --file";
const SOURCE_EXTENSION: &str = "cs";

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
        info!("Source to be compiled and run: {}", source);
        return Ok(0);
    }

    let file = ScratchFile::create_in(executor.scratch_dir(), SOURCE_EXTENSION, &source)
        .map_err(ExecError::ScratchFile)?;
    debug!("Wrote source for {} to {}", command.name, file.path().display());

    let mut cmd = vec![
        TOOLCHAIN.to_string(),
        executor.flavor.quote(&file.path_string()),
    ];
    if !extras.positional.is_empty() {
        cmd.push("--".to_string());
        cmd.extend(extras.positional.iter().map(|arg| executor.flavor.quote(arg)));
    }

    system::delegate(executor, &command, cmd)
}
