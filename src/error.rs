use thiserror::Error;

/// Errors raised while reading or validating a config buffer.
///
/// Parsing is fail-fast: the first violation aborts the whole buffer.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(String),

    #[error("File size exceeds 1 MB limit: {0}")]
    TooLarge(String),

    #[error("Error reading file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Root of the config must be a map")]
    InvalidRoot,

    #[error("No 'alias' (or 'aliases') section found in config")]
    MissingAliasSection,

    #[error("'alias' must be a map of alias names to commands")]
    InvalidAliasSection,

    #[error("Alias '{0}' must be a table or an array of tables")]
    InvalidAlias(String),

    #[error("Each element of alias.{0} must be a table")]
    InvalidAliasElement(String),

    #[error("Each element of 'aliases' must be a map")]
    InvalidAliasesElement,

    #[error("Alias entry is missing a string 'name' field")]
    MissingName,

    #[error("Missing 'cmd' field")]
    MissingCmd,

    #[error("'cmd' must be either a scalar or an array of scalars")]
    InvalidCmdType,

    #[error("Invalid element inside 'cmd' array, must be a string")]
    InvalidCmdElement,

    #[error("Command 'cmd' cannot be empty")]
    EmptyCmd,

    #[error("'render_engine' must be a string")]
    InvalidRenderEngineType,

    #[error("Unknown render engine: {0}")]
    UnknownRenderEngine(String),

    #[error("'execution_engine' must be a string")]
    InvalidExecutionEngineType,

    #[error("Unknown execution engine: {0}")]
    UnknownExecutionEngine(String),

    #[error("'template_vars' must be a map")]
    InvalidTemplateVarsType,

    #[error("All values in 'template_vars' must be strings or null (offending key: {0})")]
    InvalidTemplateVarValue(String),

    #[error("'env' must be a map")]
    InvalidEnvType,

    #[error("All values in 'env' must be strings (offending key: {0})")]
    InvalidEnvValue(String),

    #[error("'constraints' must be a sequence")]
    InvalidConstraintsType,

    #[error("Each constraint must be a map with a single key/value pair")]
    InvalidConstraintShape,

    #[error("Constraint values must be strings (offending key: {0})")]
    InvalidConstraintValue(String),

    #[error("'requires_confirmation' must be a boolean (true/false)")]
    InvalidRequiresConfirmation,
}

/// Errors returned by the planner when an alias cannot be resolved to exactly
/// one command for the current platform.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("No matching command found for name: {0}")]
    NotFound(String),

    #[error("Multiple matching commands found for name: {0}")]
    Ambiguous(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Conversion failures between JSON-like values and Lua values.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Unsupported Lua type for JSON conversion: {0}")]
    UnsupportedType(&'static str),

    #[error("Unsupported table key type for JSON conversion: {0}")]
    UnsupportedKey(&'static str),

    #[error("Cannot represent non-finite number {0} in JSON")]
    NonFiniteNumber(f64),

    #[error("Table nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("Invalid UTF-8 in Lua string")]
    InvalidString,

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

/// Errors raised while executing a planned command.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("The following template variables are not set: {}", .0.join(", "))]
    UnresolvedVariables(Vec<String>),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to execute command: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to prepare scratch file: {0}")]
    ScratchFile(#[source] std::io::Error),

    #[error("Error loading script: {0}")]
    ScriptLoad(String),

    #[error("Error executing script: {0}")]
    ScriptRuntime(String),

    #[error("Script returned unsupported type: {0}")]
    UnsupportedReturnType(&'static str),

    #[error("Script returned exit code out of range: {0}")]
    ExitCodeOutOfRange(i64),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl From<mlua::Error> for ExecError {
    fn from(err: mlua::Error) -> Self {
        match err {
            mlua::Error::SyntaxError { message, .. } => ExecError::ScriptLoad(message),
            other => ExecError::ScriptRuntime(other.to_string()),
        }
    }
}
