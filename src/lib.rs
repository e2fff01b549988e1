//! Per-project command aliases.
//!
//! A project keeps its everyday commands in a small YAML or TOML file. Each
//! alias may exist in several variants guarded by platform constraints, may be
//! templated with variables supplied on the command line, and runs through one
//! of three engines: the native shell, an embedded Lua runtime, or a
//! compile-and-run toolchain.
//!
//! The pipeline is [`config`] → [`planner`] → [`renderer`] → [`Executor`]. The
//! public modules [`command`] and [`error`] expose the data model and the
//! error types shared by every stage.

pub mod command;
pub mod config;
pub mod error;
mod executor;
pub mod extras;
pub mod planner;
pub mod platform;
pub mod process;
pub mod prompt;
pub mod renderer;
pub mod script;

pub use command::{Command, CommandContext, ExecutionEngine, ExitCode, RenderEngine};
pub use config::{ConfigFormat, load_file, parse_buffer, read_file};
pub use error::{BridgeError, ConfigError, ExecError, PlanError, RenderError};
/// The engine dispatcher and its one-shot convenience wrapper.
///
/// See [`Executor`] for the configurable API.
pub use executor::{Executor, execute_command};
pub use extras::split_extras;
pub use planner::{matches_constraints, plan_single};
pub use platform::PlatformFacts;
pub use renderer::render;
