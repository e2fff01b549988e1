use crate::command::ExitCode;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use std::process::ExitStatus;
use tempfile::TempPath;
use tracing::{debug, warn};

/// A fully built child process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Runs child processes and reports their exit code.
///
/// The native implementation is [`ShellRunner`]; tests substitute a runner
/// that records the invocation instead of spawning anything.
pub trait ProcessRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<ExitCode>;
}

/// Spawns the child with inherited stdio and waits for it.
#[derive(Debug, Default)]
pub struct ShellRunner;

impl ProcessRunner for ShellRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<ExitCode> {
        std::io::stdout().flush()?;
        let mut child = std::process::Command::new(&invocation.program)
            .args(&invocation.args)
            .spawn()?;
        let exit_status = child.wait()?;
        let code = exit_code(exit_status);
        debug!("Command exited with code {}", code);
        Ok(code)
    }
}

/// Maps a native exit status to a portable integer.
pub fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Which native shell the system engine targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFlavor {
    /// `sh -c <text>` with `export` prefixes.
    Posix,
    /// A `.ps1` scratch file run by PowerShell with `$env:` prefixes.
    PowerShell,
}

impl ShellFlavor {
    pub fn current() -> Self {
        if cfg!(windows) {
            ShellFlavor::PowerShell
        } else {
            ShellFlavor::Posix
        }
    }

    /// Renders environment assignments to prepend to the command text.
    pub fn env_prefix(self, envs: &BTreeMap<String, String>) -> String {
        envs.iter()
            .map(|(key, value)| match self {
                ShellFlavor::Posix => format!("export {}={}; ", key, posix_quote(value)),
                ShellFlavor::PowerShell => {
                    format!("$env:{}={}; ", key, powershell_quote(value))
                }
            })
            .collect()
    }

    /// Quotes a single argument for this shell.
    pub fn quote(self, value: &str) -> String {
        match self {
            ShellFlavor::Posix => posix_quote(value),
            ShellFlavor::PowerShell => powershell_quote(value),
        }
    }
}

/// Wraps `value` in single quotes for `sh`.
pub fn posix_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Wraps `value` in double quotes for PowerShell.
pub fn powershell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if matches!(c, '`' | '"' | '$') {
            quoted.push('`');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

/// A file that exists only while it is in scope.
///
/// Removal happens on drop, on every exit path; a failed removal is logged
/// and otherwise ignored.
#[derive(Debug)]
pub struct ScratchFile {
    path: Option<TempPath>,
}

impl ScratchFile {
    /// Creates a uniquely named file with `extension` inside `dir` and writes
    /// `contents` to it.
    pub fn create_in(dir: &Path, extension: &str, contents: &str) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("xx-")
            .suffix(&format!(".{}", extension))
            .tempfile_in(dir)?;
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        let path = file.into_temp_path();
        debug!("Created scratch file {}", path.display());
        Ok(Self { path: Some(path) })
    }

    /// Same as [`ScratchFile::create_in`] using the system temp directory.
    pub fn create(extension: &str, contents: &str) -> std::io::Result<Self> {
        Self::create_in(&std::env::temp_dir(), extension, contents)
    }

    pub fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    pub fn path_string(&self) -> String {
        self.path().display().to_string()
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let removed = path.to_path_buf();
            if let Err(err) = path.close() {
                warn!("Failed to remove scratch file {}: {}", removed.display(), err);
            }
        }
    }
}
