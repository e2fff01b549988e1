//! Config reading and validation.
//!
//! The text of a config file is handed to `serde_yaml` or `toml`, and the
//! resulting [`serde_json::Value`] tree is validated into [`Command`] records.
//! Two layouts are accepted:
//!
//! ```yaml
//! alias:
//!   hello: { cmd: "echo hello" }
//!   build:
//!     - { cmd: "make", constraints: [{ os: linux }] }
//!     - { cmd: "nmake", constraints: [{ os: windows }] }
//! ```
//!
//! ```yaml
//! aliases:
//!   - { name: hello, cmd: "echo hello" }
//! ```

use crate::command::{Command, ExecutionEngine, RenderEngine};
use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Largest config file that will be read.
pub const MAX_CONFIG_SIZE: u64 = 1024 * 1024;

/// Syntax of a config buffer, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML, everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Reads a whole config file, refusing anything above [`MAX_CONFIG_SIZE`].
pub fn read_file(path: &Path) -> Result<String, ConfigError> {
    let display = path.display().to_string();
    let io_error = |source: std::io::Error| ConfigError::Io {
        path: display.clone(),
        source,
    };

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConfigError::NotFound(display.clone()));
        }
        Err(err) => return Err(io_error(err)),
    };
    if metadata.len() > MAX_CONFIG_SIZE {
        return Err(ConfigError::TooLarge(display.clone()));
    }

    std::fs::read_to_string(path).map_err(io_error)
}

/// Reads and parses the file at `path`, tagging every command with `user_scope`.
pub fn load_file(path: &Path, user_scope: bool) -> Result<Vec<Command>, ConfigError> {
    let text = read_file(path)?;
    let mut commands = parse_buffer(&text, ConfigFormat::from_path(path))?;
    for command in &mut commands {
        command.user_scope = user_scope;
    }
    debug!("Loaded {} commands from {}", commands.len(), path.display());
    Ok(commands)
}

/// Parses config text into commands, in source order.
pub fn parse_buffer(text: &str, format: ConfigFormat) -> Result<Vec<Command>, ConfigError> {
    let root: Value = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(text)?,
        ConfigFormat::Toml => toml::from_str(text)?,
    };
    parse_document(&root)
}

/// Validates an already parsed document.
///
/// The first violation aborts the whole document.
pub fn parse_document(root: &Value) -> Result<Vec<Command>, ConfigError> {
    let root = root.as_object().ok_or(ConfigError::InvalidRoot)?;

    match root.get("alias") {
        Some(aliases) => parse_alias_map(aliases),
        None => match root.get("aliases") {
            Some(Value::Array(entries)) => parse_alias_list(entries),
            _ => Err(ConfigError::MissingAliasSection),
        },
    }
}

fn parse_alias_map(aliases: &Value) -> Result<Vec<Command>, ConfigError> {
    if aliases.is_null() {
        return Ok(Vec::new());
    }
    let aliases = aliases
        .as_object()
        .ok_or(ConfigError::InvalidAliasSection)?;

    let mut commands = Vec::new();
    for (name, definition) in aliases {
        match definition {
            Value::Object(fields) => commands.push(parse_command(name, fields)?),
            Value::Array(items) => {
                for item in items {
                    let fields = item
                        .as_object()
                        .ok_or_else(|| ConfigError::InvalidAliasElement(name.clone()))?;
                    commands.push(parse_command(name, fields)?);
                }
            }
            _ => return Err(ConfigError::InvalidAlias(name.clone())),
        }
    }
    Ok(commands)
}

fn parse_alias_list(entries: &[Value]) -> Result<Vec<Command>, ConfigError> {
    entries
        .iter()
        .map(|entry| {
            let fields = entry
                .as_object()
                .ok_or(ConfigError::InvalidAliasesElement)?;
            let name = fields
                .get("name")
                .and_then(scalar_to_string)
                .ok_or(ConfigError::MissingName)?;
            parse_command(&name, fields)
        })
        .collect()
}

/// Builds one [`Command`] from a command map.
///
/// Fields are checked in a fixed order, so a map with several problems always
/// reports the same one.
pub fn parse_command(name: &str, fields: &Map<String, Value>) -> Result<Command, ConfigError> {
    let mut command = Command {
        name: name.to_string(),
        ..Command::default()
    };

    command.cmd = match fields.get("cmd") {
        None => return Err(ConfigError::MissingCmd),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| scalar_to_string(item).ok_or(ConfigError::InvalidCmdElement))
            .collect::<Result<_, _>>()?,
        Some(value) => vec![scalar_to_string(value).ok_or(ConfigError::InvalidCmdType)?],
    };

    if let Some(value) = fields.get("render_engine") {
        let literal = value.as_str().ok_or(ConfigError::InvalidRenderEngineType)?;
        command.render_engine = literal.parse::<RenderEngine>()?;
    }

    if let Some(value) = fields.get("execution_engine") {
        let literal = value
            .as_str()
            .ok_or(ConfigError::InvalidExecutionEngineType)?;
        command.execution_engine = literal.parse::<ExecutionEngine>()?;
    }

    if let Some(value) = fields.get("template_vars") {
        command.template_vars = parse_string_map(
            value,
            true,
            ConfigError::InvalidTemplateVarsType,
            ConfigError::InvalidTemplateVarValue,
        )?;
    }

    if let Some(value) = fields.get("env") {
        command.envs = parse_string_map(
            value,
            false,
            ConfigError::InvalidEnvType,
            ConfigError::InvalidEnvValue,
        )?;
    }

    if let Some(value) = fields.get("constraints") {
        command.constraints = parse_constraints(value)?;
    }

    if let Some(value) = fields.get("requires_confirmation") {
        command.requires_confirmation = match value {
            Value::Bool(flag) => *flag,
            Value::String(raw) if raw == "true" => true,
            Value::String(raw) if raw == "false" => false,
            _ => return Err(ConfigError::InvalidRequiresConfirmation),
        };
    }

    if command.cmd.is_empty() {
        return Err(ConfigError::EmptyCmd);
    }

    Ok(command)
}

fn parse_string_map(
    value: &Value,
    allow_null: bool,
    type_error: ConfigError,
    value_error: fn(String) -> ConfigError,
) -> Result<BTreeMap<String, String>, ConfigError> {
    let Value::Object(entries) = value else {
        return Err(type_error);
    };

    entries
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::Null if allow_null => Some(String::new()),
                other => scalar_to_string(other),
            };
            text.map(|text| (key.clone(), text))
                .ok_or_else(|| value_error(key.clone()))
        })
        .collect()
}

fn parse_constraints(value: &Value) -> Result<Vec<(String, String)>, ConfigError> {
    let Value::Array(items) = value else {
        return Err(ConfigError::InvalidConstraintsType);
    };

    items
        .iter()
        .map(|item| match item {
            Value::Object(pair) if pair.len() == 1 => {
                let (key, value) = pair.iter().next().ok_or(ConfigError::InvalidConstraintShape)?;
                let value = scalar_to_string(value)
                    .ok_or_else(|| ConfigError::InvalidConstraintValue(key.clone()))?;
                Ok((key.clone(), value))
            }
            _ => Err(ConfigError::InvalidConstraintShape),
        })
        .collect()
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}
