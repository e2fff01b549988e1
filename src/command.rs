use crate::error::ConfigError;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// How the text segments of a [`Command`] are rendered before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderEngine {
    /// Raw passthrough, the text is used as written.
    #[default]
    None,
    /// `{{ name }}` substitution of the command's template variables.
    Inja,
}

impl RenderEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderEngine::None => "none",
            RenderEngine::Inja => "inja",
        }
    }
}

impl FromStr for RenderEngine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RenderEngine::None),
            "inja" => Ok(RenderEngine::Inja),
            other => Err(ConfigError::UnknownRenderEngine(other.to_string())),
        }
    }
}

impl fmt::Display for RenderEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy used to run the rendered text of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionEngine {
    /// Native shell: `sh -c` on POSIX, a PowerShell script on Windows.
    #[default]
    System,
    /// Embedded Lua runtime.
    Script,
    /// Source written to a scratch file and handed to an external toolchain.
    CompileRun,
}

impl ExecutionEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionEngine::System => "system",
            ExecutionEngine::Script => "script",
            ExecutionEngine::CompileRun => "compile_run",
        }
    }
}

impl FromStr for ExecutionEngine {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(ExecutionEngine::System),
            "script" => Ok(ExecutionEngine::Script),
            "compile_run" => Ok(ExecutionEngine::CompileRun),
            other => Err(ConfigError::UnknownExecutionEngine(other.to_string())),
        }
    }
}

impl fmt::Display for ExecutionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One variant of an alias, as read from a config file.
///
/// Several commands may share a `name`; the planner picks the single one whose
/// `constraints` hold on the current machine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    pub name: String,
    /// Text segments, rendered one by one and joined with a space.
    pub cmd: Vec<String>,
    /// Template variables. An empty value means "not set yet" and must be
    /// provided through extras before the command can run.
    pub template_vars: BTreeMap<String, String>,
    pub envs: BTreeMap<String, String>,
    /// `(key, value)` pairs that must all match the platform facts.
    pub constraints: Vec<(String, String)>,
    pub render_engine: RenderEngine,
    pub execution_engine: ExecutionEngine,
    pub requires_confirmation: bool,
    /// Loaded from the user-level config rather than the project config.
    pub user_scope: bool,
}

/// Per-invocation switches supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandContext {
    pub dry_run: bool,
    /// Raw trailing tokens from the command line.
    pub extras: Vec<String>,
}

/// Joins the command segments with single spaces, without rendering them.
pub fn join_cmd(command: &Command) -> String {
    command.cmd.join(" ")
}

/// Formats constraints as `k=v` pairs separated by `, `.
pub fn join_constraints(command: &Command) -> String {
    command
        .constraints
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_cmd(cmd: &[&str]) -> Command {
        Command {
            cmd: cmd.iter().map(|s| s.to_string()).collect(),
            ..Command::default()
        }
    }

    fn with_constraints(pairs: &[(&str, &str)]) -> Command {
        Command {
            constraints: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Command::default()
        }
    }

    #[test]
    fn test_join_cmd_single_segment() {
        assert_eq!(join_cmd(&with_cmd(&["echo hello"])), "echo hello");
    }

    #[test]
    fn test_join_cmd_multiple_segments() {
        assert_eq!(
            join_cmd(&with_cmd(&["echo", "hello", "world"])),
            "echo hello world"
        );
    }

    #[test]
    fn test_join_constraints() {
        assert_eq!(join_constraints(&with_constraints(&[])), "");
        assert_eq!(
            join_constraints(&with_constraints(&[("os", "linux")])),
            "os=linux"
        );
        assert_eq!(
            join_constraints(&with_constraints(&[("os", "linux"), ("arch", "x86_64")])),
            "os=linux, arch=x86_64"
        );
    }

    #[test]
    fn test_engine_literals() {
        assert_eq!("inja".parse::<RenderEngine>().unwrap(), RenderEngine::Inja);
        assert_eq!("none".parse::<RenderEngine>().unwrap(), RenderEngine::None);
        assert_eq!(
            "system".parse::<ExecutionEngine>().unwrap(),
            ExecutionEngine::System
        );
        assert_eq!(
            "script".parse::<ExecutionEngine>().unwrap(),
            ExecutionEngine::Script
        );
        assert_eq!(
            "compile_run".parse::<ExecutionEngine>().unwrap(),
            ExecutionEngine::CompileRun
        );
    }

    #[test]
    fn test_unknown_engine_literals_are_errors() {
        let err = "jinja".parse::<RenderEngine>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown render engine: jinja");

        let err = "lua".parse::<ExecutionEngine>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown execution engine: lua");
    }

    #[test]
    fn test_defaults() {
        let command = Command::default();
        assert_eq!(command.render_engine, RenderEngine::None);
        assert_eq!(command.execution_engine, ExecutionEngine::System);
        assert!(!command.requires_confirmation);
        assert!(!command.user_scope);
    }
}
