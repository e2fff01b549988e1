//! Routing of a planned [`Command`] to its execution engine.

mod compile_run;
mod script;
mod system;

use crate::command::{Command, CommandContext, ExecutionEngine, ExitCode};
use crate::error::ExecError;
use crate::process::{ProcessRunner, ShellFlavor, ShellRunner};
use crate::prompt::{Confirm, TerminalPrompt};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Runs commands through the engine named by their `execution_engine`.
///
/// The process runner, the confirmation prompt and the target shell are
/// values on the executor, see [`Default`] for the native ones.
///
/// Example
/// ```no_run
/// use xx::{Command, CommandContext, Executor};
/// let command = Command {
///     name: "hello".to_string(),
///     cmd: vec!["echo".to_string(), "hello".to_string()],
///     ..Command::default()
/// };
/// let code = Executor::default().execute(command, &CommandContext::default()).unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Executor {
    runner: Box<dyn ProcessRunner>,
    prompt: Box<dyn Confirm>,
    flavor: ShellFlavor,
    scratch_dir: Option<PathBuf>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(
            Box::new(ShellRunner),
            Box::new(TerminalPrompt),
            ShellFlavor::current(),
        )
    }
}

impl Executor {
    pub fn new(
        runner: Box<dyn ProcessRunner>,
        prompt: Box<dyn Confirm>,
        flavor: ShellFlavor,
    ) -> Self {
        Self {
            runner,
            prompt,
            flavor,
            scratch_dir: None,
        }
    }

    /// Directory for compile-and-run source files; the working directory
    /// when unset.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Executes one command and returns its exit code.
    pub fn execute(&self, command: Command, context: &CommandContext) -> Result<ExitCode, ExecError> {
        debug!(
            "Executing {} with the {} engine",
            command.name, command.execution_engine
        );
        match command.execution_engine {
            ExecutionEngine::System => system::execute(self, command, context),
            ExecutionEngine::Script => script::execute(self, command, context),
            ExecutionEngine::CompileRun => compile_run::execute(self, command, context),
        }
    }

    /// False when the command needs confirmation and the user declined.
    fn confirmed(&self, command: &Command, banner: &str, text: &str) -> bool {
        if !command.requires_confirmation {
            return true;
        }
        let confirmed = self.prompt.confirm(banner, text);
        if confirmed {
            debug!("User confirmed execution.");
        } else {
            debug!("User denied execution.");
        }
        confirmed
    }

    fn scratch_dir(&self) -> &Path {
        self.scratch_dir.as_deref().unwrap_or(Path::new("."))
    }
}

/// Executes `command` with the native runner, terminal prompt and shell.
pub fn execute_command(command: Command, context: &CommandContext) -> Result<ExitCode, ExecError> {
    Executor::default().execute(command, context)
}
