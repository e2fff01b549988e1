use crate::command::{Command, RenderEngine};
use crate::error::RenderError;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use std::collections::BTreeMap;

/// Renders `text` with `vars` using the given engine.
///
/// [`RenderEngine::None`] returns the text unchanged. [`RenderEngine::Inja`]
/// renders Jinja syntax (`{{ name }}`, `{% if %}`, `{# #}`) with `vars` as
/// the context; a reference to a missing variable is an error, never an
/// empty string.
pub fn render(
    text: &str,
    vars: &BTreeMap<String, String>,
    engine: RenderEngine,
) -> Result<String, RenderError> {
    match engine {
        RenderEngine::None => Ok(text.to_string()),
        RenderEngine::Inja => render_template(text, vars),
    }
}

fn render_template(text: &str, vars: &BTreeMap<String, String>) -> Result<String, RenderError> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);

    Ok(env.render_str(text, vars)?)
}

/// Renders every segment of `command` separately and joins them with a space.
pub fn render_joined(command: &Command) -> Result<String, RenderError> {
    let parts = command
        .cmd
        .iter()
        .map(|part| render(part, &command.template_vars, command.render_engine))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(parts.join(" "))
}
