use super::value::ScriptValue;
use mlua::{Lua, Table, Value};

/// Builds the `json` table: `json.parse(text)` and `json.dump(value, minify)`.
pub fn module(lua: &Lua) -> mlua::Result<Table> {
    let json = lua.create_table()?;

    json.set(
        "parse",
        lua.create_function(|lua, text: Value| {
            let text = match text {
                Value::String(text) => text,
                other => {
                    return Err(mlua::Error::runtime(format!(
                        "bad argument #1 to 'parse' (string expected, got {})",
                        other.type_name()
                    )));
                }
            };
            let parsed = super::value::lua_string(&text)
                .and_then(|text| ScriptValue::parse(&text))
                .map_err(|err| {
                    mlua::Error::runtime(format!(
                        "bad argument #1 to 'parse' (Failed to parse JSON from `json_data`: {})",
                        err
                    ))
                })?;
            parsed.to_lua(lua)
        })?,
    )?;

    json.set(
        "dump",
        lua.create_function(|lua, (value, minify): (Value, Value)| {
            let minify = !matches!(minify, Value::Nil | Value::Boolean(false));
            ScriptValue::from_lua(lua, value)
                .and_then(|value| value.dump(minify))
                .map_err(|err| mlua::Error::runtime(format!("Failed to dump JSON: {}", err)))
        })?,
    )?;

    Ok(json)
}
