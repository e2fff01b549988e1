//! JSON-like values exchanged with the Lua runtime.

use crate::error::BridgeError;
use mlua::{Function, Lua, Table, Value};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;

/// Deepest table nesting converted before giving up.
pub const MAX_DEPTH: usize = 128;

/// Registry slot holding the stock `pairs`, so conversions honour `__pairs`.
pub(crate) const PAIRS_KEY: &str = "xx.pairs";

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ScriptValue>),
    Object(BTreeMap<String, ScriptValue>),
}

impl ScriptValue {
    pub fn parse(text: &str) -> Result<Self, BridgeError> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(Self::from(json))
    }

    /// Serializes to JSON text: dense when `minify`, otherwise one member
    /// per line indented by four spaces.
    pub fn dump(&self, minify: bool) -> Result<String, BridgeError> {
        let json = self.to_json()?;
        if minify {
            return Ok(serde_json::to_string(&json)?);
        }

        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        json.serialize(&mut serializer)?;
        String::from_utf8(out).map_err(|_| BridgeError::InvalidString)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, BridgeError> {
        use serde_json::Value as Json;
        Ok(match self {
            ScriptValue::Null => Json::Null,
            ScriptValue::Bool(b) => Json::Bool(*b),
            ScriptValue::Int(i) => Json::from(*i),
            ScriptValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Json::Number)
                .ok_or(BridgeError::NonFiniteNumber(*f))?,
            ScriptValue::String(s) => Json::String(s.clone()),
            ScriptValue::Array(items) => Json::Array(
                items
                    .iter()
                    .map(ScriptValue::to_json)
                    .collect::<Result<_, _>>()?,
            ),
            ScriptValue::Object(members) => Json::Object(
                members
                    .iter()
                    .map(|(key, value)| Ok((key.clone(), value.to_json()?)))
                    .collect::<Result<_, BridgeError>>()?,
            ),
        })
    }

    /// Builds the Lua counterpart: arrays become 1-indexed sequences, objects
    /// become string-keyed tables. Null members vanish, since a Lua table
    /// cannot hold `nil`.
    pub fn to_lua(&self, lua: &Lua) -> mlua::Result<Value> {
        Ok(match self {
            ScriptValue::Null => Value::Nil,
            ScriptValue::Bool(b) => Value::Boolean(*b),
            ScriptValue::Int(i) => Value::Integer(*i),
            ScriptValue::Float(f) => Value::Number(*f),
            ScriptValue::String(s) => Value::String(lua.create_string(s)?),
            ScriptValue::Array(items) => {
                let table = lua.create_table()?;
                for (index, item) in items.iter().enumerate() {
                    table.raw_set(index + 1, item.to_lua(lua)?)?;
                }
                Value::Table(table)
            }
            ScriptValue::Object(members) => {
                let table = lua.create_table()?;
                for (key, value) in members {
                    table.raw_set(key.as_str(), value.to_lua(lua)?)?;
                }
                Value::Table(table)
            }
        })
    }

    /// Converts a Lua value.
    ///
    /// A table is an array while its keys arrive as the integers `1, 2, ...`
    /// with no gap; the first key breaking that sequence turns the whole table
    /// into an object, with the indices seen so far becoming string keys. An
    /// empty table is an object.
    pub fn from_lua(lua: &Lua, value: Value) -> Result<Self, BridgeError> {
        Self::from_lua_at(lua, value, 0)
    }

    fn from_lua_at(lua: &Lua, value: Value, depth: usize) -> Result<Self, BridgeError> {
        match value {
            Value::Nil => Ok(ScriptValue::Null),
            Value::Boolean(b) => Ok(ScriptValue::Bool(b)),
            Value::Integer(i) => Ok(ScriptValue::Int(i)),
            Value::Number(f) => Ok(ScriptValue::Float(f)),
            Value::String(s) => Ok(ScriptValue::String(lua_string(&s)?)),
            Value::Table(table) => {
                if depth >= MAX_DEPTH {
                    return Err(BridgeError::TooDeep(MAX_DEPTH));
                }
                Self::from_table(lua, &table, depth + 1)
            }
            other => Err(BridgeError::UnsupportedType(other.type_name())),
        }
    }

    fn from_table(lua: &Lua, table: &Table, depth: usize) -> Result<Self, BridgeError> {
        let mut items: Vec<ScriptValue> = Vec::new();
        let mut members: Option<BTreeMap<String, ScriptValue>> = None;

        for (key, value) in entries(lua, table)? {
            let value = Self::from_lua_at(lua, value, depth)?;

            if members.is_none() {
                match key {
                    Value::Integer(index) if index == items.len() as i64 + 1 => {
                        items.push(value);
                        continue;
                    }
                    _ => {
                        members = Some(
                            items
                                .drain(..)
                                .enumerate()
                                .map(|(i, item)| ((i + 1).to_string(), item))
                                .collect(),
                        );
                    }
                }
            }

            if let Some(members) = members.as_mut() {
                members.insert(key_to_string(&key)?, value);
            }
        }

        match members {
            Some(members) => Ok(ScriptValue::Object(members)),
            None if items.is_empty() => Ok(ScriptValue::Object(BTreeMap::new())),
            None => Ok(ScriptValue::Array(items)),
        }
    }
}

impl From<serde_json::Value> for ScriptValue {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;
        match json {
            Json::Null => ScriptValue::Null,
            Json::Bool(b) => ScriptValue::Bool(b),
            Json::Number(n) => match (n.as_i64(), n.as_u64()) {
                (Some(i), _) => ScriptValue::Int(i),
                (None, Some(u)) => ScriptValue::Float(u as f64),
                (None, None) => ScriptValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Json::String(s) => ScriptValue::String(s),
            Json::Array(items) => {
                ScriptValue::Array(items.into_iter().map(ScriptValue::from).collect())
            }
            Json::Object(members) => ScriptValue::Object(
                members
                    .into_iter()
                    .map(|(key, value)| (key, ScriptValue::from(value)))
                    .collect(),
            ),
        }
    }
}

/// Key/value pairs of `table` in native iteration order.
fn entries(lua: &Lua, table: &Table) -> Result<Vec<(Value, Value)>, BridgeError> {
    let Some(pairs) = lua.named_registry_value::<Option<Function>>(PAIRS_KEY)? else {
        return Ok(table
            .clone()
            .pairs::<Value, Value>()
            .collect::<mlua::Result<_>>()?);
    };

    let (next, state, mut control): (Function, Value, Value) = pairs.call(table.clone())?;
    let mut out = Vec::new();
    loop {
        let (key, value): (Value, Value) = next.call((state.clone(), control))?;
        if key.is_nil() {
            return Ok(out);
        }
        control = key.clone();
        out.push((key, value));
    }
}

pub(crate) fn lua_string(s: &mlua::String) -> Result<String, BridgeError> {
    let text = s.to_str().map_err(|_| BridgeError::InvalidString)?;
    Ok(String::from(&*text))
}

fn key_to_string(key: &Value) -> Result<String, BridgeError> {
    match key {
        Value::String(s) => lua_string(s),
        Value::Integer(i) => Ok(i.to_string()),
        Value::Number(f) => Ok(f.to_string()),
        other => Err(BridgeError::UnsupportedKey(other.type_name())),
    }
}
