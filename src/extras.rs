//! Trailing invocation tokens ("extras") and how they feed into a command.

use crate::command::{Command, RenderEngine};
use crate::error::ExecError;
use std::collections::BTreeMap;
use tracing::debug;

/// Extras split into `key=value` assignments and positional tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtrasResult {
    pub kv: BTreeMap<String, String>,
    pub positional: Vec<String>,
}

/// Splits extras on the first `=`.
///
/// Tokens without `=`, or with an empty key (`=value`), are positional and keep
/// their original order. A repeated key keeps the last value.
pub fn split_extras(extras: &[String]) -> ExtrasResult {
    let mut result = ExtrasResult::default();
    for extra in extras {
        match extra.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                result.kv.insert(key.to_string(), value.to_string());
            }
            _ => result.positional.push(extra.clone()),
        }
    }
    result
}

/// Overwrites template variables that already exist on the command with the
/// matching `key=value` extras. Unknown keys are ignored.
pub(crate) fn apply_assignments(command: &mut Command, kv: &BTreeMap<String, String>) {
    for (key, value) in kv {
        if let Some(slot) = command.template_vars.get_mut(key) {
            debug!("Setting template variable: {}={}", key, value);
            *slot = value.clone();
        }
    }
}

/// Merges extras the way the system engine does.
///
/// With no render engine the extras are appended verbatim as trailing
/// arguments; otherwise assignments fill template variables and only the
/// positional leftovers are appended.
pub(crate) fn merge_for_shell(command: &mut Command, extras: &[String]) {
    if command.render_engine == RenderEngine::None {
        debug!("Using simple append for extra arguments (no rendering).");
        command.cmd.extend(extras.iter().cloned());
        return;
    }

    debug!("Using template variable rendering for extra arguments.");
    let split = split_extras(extras);
    apply_assignments(command, &split.kv);
    for positional in split.positional {
        debug!("Adding positional extra argument: {}", positional);
        command.cmd.push(positional);
    }
}

/// Names of template variables still holding the empty "unset" sentinel.
pub fn unresolved_vars(command: &Command) -> Vec<String> {
    command
        .template_vars
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(key, _)| key.clone())
        .collect()
}

/// Fails with a single error naming every unset template variable.
pub(crate) fn ensure_resolved(command: &Command) -> Result<(), ExecError> {
    let unset = unresolved_vars(command);
    if unset.is_empty() {
        Ok(())
    } else {
        Err(ExecError::UnresolvedVariables(unset))
    }
}
