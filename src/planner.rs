//! Selection of the one command variant valid for this machine.

use crate::command::Command;
use crate::error::PlanError;
use crate::platform::{PlatformFacts, canonicalize};
use tracing::debug;

/// True when every constraint of `command` holds on the current machine.
///
/// A command without constraints always matches.
pub fn matches_constraints(command: &Command) -> bool {
    matches_constraints_on(command, PlatformFacts::current())
}

/// Same as [`matches_constraints`] against explicit facts.
///
/// Keys are `os`, `arch` and `osfamily`; any other key makes the command
/// ineligible.
pub fn matches_constraints_on(command: &Command, facts: &PlatformFacts) -> bool {
    command.constraints.iter().all(|(key, value)| {
        let actual = match key.as_str() {
            "os" => facts.os.as_str(),
            "arch" => facts.arch.as_str(),
            "osfamily" => facts.os_family.as_str(),
            other => {
                debug!("Unknown constraint key '{}' in command {}", other, command.name);
                return false;
            }
        };
        canonicalize(value) == actual
    })
}

/// Resolves `name` to exactly one command whose constraints hold.
pub fn plan_single(commands: &[Command], name: &str) -> Result<Command, PlanError> {
    plan_single_on(commands, name, PlatformFacts::current())
}

pub fn plan_single_on(
    commands: &[Command],
    name: &str,
    facts: &PlatformFacts,
) -> Result<Command, PlanError> {
    let mut candidates = commands
        .iter()
        .filter(|command| command.name == name)
        .filter(|command| matches_constraints_on(command, facts));

    let first = candidates
        .next()
        .ok_or_else(|| PlanError::NotFound(name.to_string()))?;
    if candidates.next().is_some() {
        return Err(PlanError::Ambiguous(name.to_string()));
    }

    debug!("Planned command {}: {:?}", name, first.cmd);
    Ok(first.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{Arch, Os, OsFamily};

    const LINUX: PlatformFacts = PlatformFacts {
        os: Os::Linux,
        os_family: OsFamily::Unix,
        arch: Arch::X86_64,
    };

    fn command(name: &str, constraints: &[(&str, &str)]) -> Command {
        Command {
            name: name.to_string(),
            cmd: vec![format!("echo {}", name)],
            constraints: constraints
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Command::default()
        }
    }

    #[test]
    fn test_empty_constraints_always_match() {
        assert!(matches_constraints(&command("any", &[])));
        assert!(matches_constraints_on(&command("any", &[]), &LINUX));
    }

    #[test]
    fn test_matches_current_platform() {
        let facts = PlatformFacts::current();
        let cmd = command(
            "native",
            &[
                ("os", facts.os.as_str()),
                ("osfamily", facts.os_family.as_str()),
                ("arch", facts.arch.as_str()),
            ],
        );
        assert!(matches_constraints(&cmd));
    }

    #[test]
    fn test_single_key_checks() {
        assert!(matches_constraints_on(&command("c", &[("os", "linux")]), &LINUX));
        assert!(!matches_constraints_on(&command("c", &[("os", "windows")]), &LINUX));
        assert!(matches_constraints_on(&command("c", &[("arch", "x86_64")]), &LINUX));
        assert!(!matches_constraints_on(&command("c", &[("arch", "arm64")]), &LINUX));
        assert!(matches_constraints_on(&command("c", &[("osfamily", "unix")]), &LINUX));
        assert!(!matches_constraints_on(
            &command("c", &[("osfamily", "windows")]),
            &LINUX
        ));
    }

    #[test]
    fn test_values_are_canonicalized() {
        assert!(matches_constraints_on(&command("c", &[("os", "Linux")]), &LINUX));
        assert!(matches_constraints_on(&command("c", &[("arch", "amd64")]), &LINUX));
    }

    #[test]
    fn test_unknown_key_is_ineligible() {
        assert!(!matches_constraints_on(&command("c", &[("distro", "arch")]), &LINUX));
        assert!(!matches_constraints_on(
            &command("c", &[("os", "linux"), ("kernel", "6")]),
            &LINUX
        ));
    }

    #[test]
    fn test_constraint_order_does_not_matter() {
        let pairs = [("os", "linux"), ("arch", "arm64"), ("osfamily", "unix")];
        let mut reversed = pairs;
        reversed.reverse();

        for facts in [
            LINUX,
            PlatformFacts {
                arch: Arch::Arm64,
                ..LINUX
            },
        ] {
            assert_eq!(
                matches_constraints_on(&command("c", &pairs), &facts),
                matches_constraints_on(&command("c", &reversed), &facts)
            );
        }
    }

    #[test]
    fn test_plan_single_unique_match() {
        let commands = vec![
            command("build", &[("os", "windows")]),
            command("build", &[("os", "linux")]),
            command("test", &[]),
        ];

        let planned = plan_single_on(&commands, "build", &LINUX).unwrap();
        assert_eq!(planned.constraints, vec![("os".to_string(), "linux".to_string())]);
    }

    #[test]
    fn test_plan_single_not_found() {
        let commands = vec![command("build", &[("os", "windows")])];

        assert_eq!(
            plan_single_on(&commands, "build", &LINUX),
            Err(PlanError::NotFound("build".to_string()))
        );
        assert_eq!(
            plan_single_on(&commands, "missing", &LINUX),
            Err(PlanError::NotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_plan_single_ambiguous() {
        let commands = vec![
            command("build", &[("os", "linux")]),
            command("build", &[("osfamily", "unix")]),
        ];

        let err = plan_single_on(&commands, "build", &LINUX).unwrap_err();
        assert_eq!(err, PlanError::Ambiguous("build".to_string()));
        assert_eq!(
            err.to_string(),
            "Multiple matching commands found for name: build"
        );
    }
}
