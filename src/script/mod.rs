//! Embedded Lua runtime used by the script engine.
//!
//! Every script gets a fresh [`Lua`] with two capability tables installed:
//! `json` (`parse`, `dump`) and `http` (`get`, `post`, also reachable as
//! `cpr`). Before the chunk runs, four read-only globals describe the
//! invocation:
//!
//! * `TEMPLATE_VARS`, `ENVS`: string maps from the command,
//! * `POSITIONAL_EXTRAS`: positional extras as a sequence,
//! * `CTX`: `command_name`, `os`, `arch`, `osfamily`, `is_dry_run`.
//!
//! Dry runs stop before a script is evaluated, so a running script always
//! sees `CTX.is_dry_run == false`.
//!
//! The chunk's single return value is decoded into an [`Outcome`].

pub mod http;
pub mod json;
pub mod value;

pub use value::ScriptValue;

use crate::command::ExitCode;
use crate::error::ExecError;
use crate::platform::PlatformFacts;
use mlua::{Function, Lua, Table, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Wraps a data table so scripts can read but not assign.
const READ_ONLY: &str = r#"
local data, name = ...
return setmetatable({}, {
    __index = data,
    __newindex = function(_, key)
        error("attempt to modify read-only table " .. name .. " (key '" .. tostring(key) .. "')", 2)
    end,
    __pairs = function() return next, data, nil end,
    __len = function() return #data end,
    __metatable = false,
})
"#;

/// What a script asked for by returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// `nil` or no return value.
    NoOp,
    /// An integer, or a boolean mapped to `0`/`1`.
    ExitCode(ExitCode),
    /// A string, run as a shell command.
    Delegate(String),
}

impl Outcome {
    pub fn decode(value: Value) -> Result<Self, ExecError> {
        match value {
            Value::Nil => Ok(Outcome::NoOp),
            Value::Integer(code) => i32::try_from(code)
                .map(Outcome::ExitCode)
                .map_err(|_| ExecError::ExitCodeOutOfRange(code)),
            Value::Boolean(ok) => Ok(Outcome::ExitCode(if ok { 0 } else { 1 })),
            Value::String(text) => Ok(Outcome::Delegate(value::lua_string(&text)?)),
            other => Err(ExecError::UnsupportedReturnType(other.type_name())),
        }
    }
}

/// Values published to the script as read-only globals.
#[derive(Debug, Clone, Default)]
pub struct ScriptGlobals {
    pub command_name: String,
    pub template_vars: BTreeMap<String, String>,
    pub envs: BTreeMap<String, String>,
    pub positional: Vec<String>,
}

/// A fresh runtime with `json` and `http` installed.
pub fn create_runtime() -> mlua::Result<Lua> {
    let lua = Lua::new();
    let globals = lua.globals();

    lua.set_named_registry_value(value::PAIRS_KEY, globals.get::<Function>("pairs")?)?;

    globals.set("json", json::module(&lua)?)?;
    let http = http::module(&lua)?;
    globals.set("http", http.clone())?;
    globals.set("cpr", http)?;

    Ok(lua)
}

/// Publishes `TEMPLATE_VARS`, `ENVS`, `POSITIONAL_EXTRAS` and `CTX`.
pub fn install_globals(
    lua: &Lua,
    values: &ScriptGlobals,
    facts: &PlatformFacts,
) -> mlua::Result<()> {
    let globals = lua.globals();

    let template_vars = lua.create_table_from(
        values
            .template_vars
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    )?;
    globals.set("TEMPLATE_VARS", read_only(lua, template_vars, "TEMPLATE_VARS")?)?;

    let envs = lua.create_table_from(values.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;
    globals.set("ENVS", read_only(lua, envs, "ENVS")?)?;

    let positional = lua.create_sequence_from(values.positional.iter().map(String::as_str))?;
    globals.set("POSITIONAL_EXTRAS", read_only(lua, positional, "POSITIONAL_EXTRAS")?)?;

    let ctx = lua.create_table()?;
    ctx.set("command_name", values.command_name.as_str())?;
    ctx.set("os", facts.os.as_str())?;
    ctx.set("arch", facts.arch.as_str())?;
    ctx.set("osfamily", facts.os_family.as_str())?;
    ctx.set("is_dry_run", false)?;
    globals.set("CTX", read_only(lua, ctx, "CTX")?)?;

    Ok(())
}

fn read_only(lua: &Lua, data: Table, name: &str) -> mlua::Result<Table> {
    lua.load(READ_ONLY)
        .set_name("=read_only")
        .call::<Table>((data, name))
}

/// Loads `source` as one chunk named `name`, runs it and decodes the result.
pub fn evaluate(lua: &Lua, name: &str, source: &str) -> Result<Outcome, ExecError> {
    let chunk = lua
        .load(source)
        .set_name(format!("={}", name))
        .into_function()?;
    let returned = chunk.call::<Value>(())?;
    let outcome = Outcome::decode(returned)?;
    debug!("Script {} returned {:?}", name, outcome);
    Ok(outcome)
}

/// Runs a script in a fresh runtime with the given globals.
pub fn run_script(
    name: &str,
    source: &str,
    values: &ScriptGlobals,
    facts: &PlatformFacts,
) -> Result<Outcome, ExecError> {
    let lua = create_runtime()?;
    install_globals(&lua, values, facts)?;
    evaluate(&lua, name, source)
}

/// Release string of the embedded interpreter, e.g. `Lua 5.4`.
pub fn lua_version() -> String {
    Lua::new()
        .globals()
        .get::<String>("_VERSION")
        .unwrap_or_else(|_| "Lua".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<Outcome, ExecError> {
        let globals = ScriptGlobals {
            command_name: "demo".to_string(),
            template_vars: BTreeMap::from([("who".to_string(), "world".to_string())]),
            envs: BTreeMap::from([("TOKEN".to_string(), "abc".to_string())]),
            positional: vec!["first".to_string(), "second".to_string()],
        };
        run_script("demo", source, &globals, PlatformFacts::current())
    }

    #[test]
    fn test_return_values() {
        assert_eq!(run("return nil").unwrap(), Outcome::NoOp);
        assert_eq!(run("local x = 1").unwrap(), Outcome::NoOp);
        assert_eq!(run("return 0").unwrap(), Outcome::ExitCode(0));
        assert_eq!(run("return 42").unwrap(), Outcome::ExitCode(42));
        assert_eq!(run("return true").unwrap(), Outcome::ExitCode(0));
        assert_eq!(run("return false").unwrap(), Outcome::ExitCode(1));
        assert_eq!(
            run("return 'echo 42'").unwrap(),
            Outcome::Delegate("echo 42".to_string())
        );
    }

    #[test]
    fn test_unsupported_return_types() {
        let err = run("return {}").unwrap_err();
        assert_eq!(err.to_string(), "Script returned unsupported type: table");

        let err = run("return 1.5").unwrap_err();
        assert!(matches!(err, ExecError::UnsupportedReturnType("number")));

        let err = run("return 1 << 40").unwrap_err();
        assert!(matches!(err, ExecError::ExitCodeOutOfRange(_)));
    }

    #[test]
    fn test_load_and_runtime_errors() {
        assert!(matches!(run("return }").unwrap_err(), ExecError::ScriptLoad(_)));

        let err = run("error('boom')").unwrap_err();
        assert!(matches!(err, ExecError::ScriptRuntime(ref msg) if msg.contains("boom")));
    }

    #[test]
    fn test_globals_are_visible() {
        let facts = PlatformFacts::current();
        let source = format!(
            r#"
            assert(TEMPLATE_VARS.who == "world")
            assert(ENVS.TOKEN == "abc")
            assert(#POSITIONAL_EXTRAS == 2 and POSITIONAL_EXTRAS[2] == "second")
            assert(CTX.command_name == "demo")
            assert(CTX.os == "{}" and CTX.arch == "{}" and CTX.osfamily == "{}")
            assert(CTX.is_dry_run == false)
            local n = 0
            for _, v in ipairs(POSITIONAL_EXTRAS) do n = n + 1 end
            for _ in pairs(TEMPLATE_VARS) do n = n + 1 end
            return n
            "#,
            facts.os.as_str(),
            facts.arch.as_str(),
            facts.os_family.as_str()
        );
        assert_eq!(run(&source).unwrap(), Outcome::ExitCode(3));
    }

    #[test]
    fn test_globals_are_read_only() {
        let err = run("TEMPLATE_VARS.who = 'me'").unwrap_err();
        assert!(matches!(err, ExecError::ScriptRuntime(ref msg) if msg.contains("read-only")));

        let err = run("CTX.os = 'plan9'").unwrap_err();
        assert!(matches!(err, ExecError::ScriptRuntime(_)));
    }

    #[test]
    fn test_capabilities_are_installed() {
        assert_eq!(
            run(r#"return json.dump(json.parse('{"b":1,"a":[true]}'), true)"#).unwrap(),
            Outcome::Delegate(r#"{"a":[true],"b":1}"#.to_string())
        );
        assert_eq!(
            run("return type(http.get) == 'function' and cpr.post == http.post").unwrap(),
            Outcome::ExitCode(0)
        );
    }

    #[test]
    fn test_read_only_globals_dump_their_data() {
        assert_eq!(
            run("return json.dump(TEMPLATE_VARS, true)").unwrap(),
            Outcome::Delegate(r#"{"who":"world"}"#.to_string())
        );
        assert_eq!(
            run("return json.dump(POSITIONAL_EXTRAS, true)").unwrap(),
            Outcome::Delegate(r#"["first","second"]"#.to_string())
        );
    }

    #[test]
    fn test_runtimes_are_not_shared() {
        run("leaked = 1").unwrap();
        assert_eq!(run("return leaked").unwrap(), Outcome::NoOp);
    }

    #[test]
    fn test_lua_version() {
        assert!(lua_version().starts_with("Lua 5.4"));
    }
}
