use mlua::{Lua, Table, Value, Variadic};
use reqwest::blocking::{Client, RequestBuilder};
use std::cell::OnceCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the `http` table with `get(url [, params [, headers]])` and
/// `post(url [, body [, params [, headers]]])`.
///
/// Both return `{ status_code, body, headers, url, error }`; a transport
/// failure yields `status_code = 0` and a message in `error` instead of
/// raising.
pub fn module(lua: &Lua) -> mlua::Result<Table> {
    let http = lua.create_table()?;
    let client: Rc<OnceCell<Client>> = Rc::new(OnceCell::new());

    let get_client = Rc::clone(&client);
    http.set(
        "get",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let url = url_arg(args.first(), "get")?;
            let params = string_pairs(args.get(1))?;
            let headers = string_pairs(args.get(2))?;
            debug!("http.get {}", url);
            let response = shared_client(&get_client)
                .map(|client| apply(client.get(&url), &params, &headers));
            send(lua, &url, response)
        })?,
    )?;

    let post_client = Rc::clone(&client);
    http.set(
        "post",
        lua.create_function(move |lua, args: Variadic<Value>| {
            let url = url_arg(args.first(), "post")?;
            let body = match args.get(1) {
                Some(Value::String(body)) => body.as_bytes().to_vec(),
                Some(Value::Integer(i)) => i.to_string().into_bytes(),
                Some(Value::Number(f)) => f.to_string().into_bytes(),
                _ => Vec::new(),
            };
            let params = string_pairs(args.get(2))?;
            let headers = string_pairs(args.get(3))?;
            debug!("http.post {} ({} bytes)", url, body.len());
            let response = shared_client(&post_client)
                .map(|client| apply(client.post(&url), &params, &headers).body(body));
            send(lua, &url, response)
        })?,
    )?;

    Ok(http)
}

fn shared_client(cell: &OnceCell<Client>) -> reqwest::Result<&Client> {
    if let Some(client) = cell.get() {
        return Ok(client);
    }
    let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;
    Ok(cell.get_or_init(|| client))
}

fn apply(
    mut request: RequestBuilder,
    params: &[(String, String)],
    headers: &[(String, String)],
) -> RequestBuilder {
    if !params.is_empty() {
        request = request.query(params);
    }
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    request
}

fn send(lua: &Lua, url: &str, request: reqwest::Result<RequestBuilder>) -> mlua::Result<Table> {
    let response = request.and_then(|request| request.send());
    let response = match response {
        Ok(response) => response,
        Err(err) => return failure(lua, url, &err.to_string()),
    };

    let status = response.status().as_u16();
    let final_url = response.url().to_string();
    let headers = lua.create_table()?;
    for (name, value) in response.headers() {
        headers.set(name.as_str(), String::from_utf8_lossy(value.as_bytes()).into_owned())?;
    }
    let body = match response.bytes() {
        Ok(body) => body,
        Err(err) => return failure(lua, url, &err.to_string()),
    };

    let table = lua.create_table()?;
    table.set("status_code", status)?;
    table.set("body", lua.create_string(&body)?)?;
    table.set("headers", headers)?;
    table.set("url", final_url)?;
    table.set("error", Value::Nil)?;
    Ok(table)
}

fn failure(lua: &Lua, url: &str, message: &str) -> mlua::Result<Table> {
    debug!("http request to {} failed: {}", url, message);
    let table = lua.create_table()?;
    table.set("status_code", 0)?;
    table.set("body", "")?;
    table.set("headers", lua.create_table()?)?;
    table.set("url", url)?;
    table.set("error", message)?;
    Ok(table)
}

fn url_arg(value: Option<&Value>, function: &str) -> mlua::Result<String> {
    match value {
        Some(Value::String(url)) => Ok(String::from(&*url.to_str()?)),
        other => Err(mlua::Error::runtime(format!(
            "bad argument #1 to '{}' (string expected, got {})",
            function,
            other.map_or("no value", |value| value.type_name())
        ))),
    }
}

/// String-convertible key/value pairs of an optional table; anything that is
/// not a table, and entries that are not strings or numbers, are ignored.
fn string_pairs(value: Option<&Value>) -> mlua::Result<Vec<(String, String)>> {
    let Some(Value::Table(table)) = value else {
        return Ok(Vec::new());
    };

    let mut pairs = Vec::new();
    for entry in table.clone().pairs::<Value, Value>() {
        let (key, value) = entry?;
        if let (Some(key), Some(value)) = (scalar_text(&key), scalar_text(&value)) {
            pairs.push((key, value));
        }
    }
    Ok(pairs)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => s.to_str().ok().map(|s| String::from(&*s)),
        Value::Integer(i) => Some(i.to_string()),
        Value::Number(f) => Some(f.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> Lua {
        let lua = Lua::new();
        lua.globals().set("http", module(&lua).unwrap()).unwrap();
        lua
    }

    #[test]
    fn test_connection_failure_is_reported_in_table() {
        let lua = runtime();
        let (status, body, error, url): (i64, String, Option<String>, String) = lua
            .load(
                r#"
                local r = http.get("http://127.0.0.1:1/", { q = "1" }, { Accept = "text/plain" })
                return r.status_code, r.body, r.error, r.url
                "#,
            )
            .eval()
            .unwrap();
        assert_eq!(status, 0);
        assert_eq!(body, "");
        assert!(error.is_some());
        assert_eq!(url, "http://127.0.0.1:1/");
    }

    #[test]
    fn test_invalid_url_is_reported_in_table() {
        let lua = runtime();
        let (status, has_error): (i64, bool) = lua
            .load(r#"local r = http.post("not a url", "{}") return r.status_code, r.error ~= nil"#)
            .eval()
            .unwrap();
        assert_eq!(status, 0);
        assert!(has_error);
    }

    #[test]
    fn test_url_must_be_a_string() {
        let lua = runtime();
        let err = lua.load("return http.get()").exec().unwrap_err();
        assert!(err.to_string().contains("bad argument #1 to 'get'"));
    }

    #[test]
    fn test_string_pairs_skips_unsupported_entries() {
        let lua = Lua::new();
        let table: Value = lua
            .load("return { a = 'x', n = 2, skip = true, [true] = 'y' }")
            .eval()
            .unwrap();
        let mut pairs = string_pairs(Some(&table)).unwrap();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), "x".to_string()),
                ("n".to_string(), "2".to_string())
            ]
        );
        assert!(string_pairs(Some(&Value::Nil)).unwrap().is_empty());
        assert!(string_pairs(None).unwrap().is_empty());
    }
}
