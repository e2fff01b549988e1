use anyhow::{Context, Result, bail};
use argh::FromArgs;
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use tracing_subscriber::EnvFilter;
use xx::command::{join_cmd, join_constraints};
use xx::script::lua_version;
use xx::{
    Command, CommandContext, ConfigError, PlatformFacts, execute_command, load_file,
    matches_constraints, plan_single,
};

const DEFAULT_CONFIG: &str = ".xx.yaml";

#[derive(FromArgs)]
/// Run per-project command aliases.
struct Cli {
    #[argh(option, short = 'c', default = "String::from(DEFAULT_CONFIG)")]
    /// path to the project configuration file
    config: String,

    #[argh(option, short = 'u')]
    /// path to the user configuration file
    user_config: Option<String>,

    #[argh(switch)]
    /// search parent directories for the project configuration file
    up: bool,

    #[argh(switch, short = 'v')]
    /// enable debug output
    verbose: bool,

    #[argh(switch)]
    /// load only the user configuration, ignoring the project one
    user: bool,

    #[argh(switch)]
    /// load only the project configuration, ignoring the user one
    project: bool,

    #[argh(subcommand)]
    subcommand: Subcommand,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Subcommand {
    Run(Run),
    List(List),
    Version(Version),
    UserConfigPath(UserConfigPath),
}

#[derive(FromArgs)]
/// Run a specified command.
#[argh(subcommand, name = "run")]
struct Run {
    #[argh(switch, short = 'y')]
    /// run without confirmation, even if the command requires it
    yes: bool,

    #[argh(switch, short = 'n')]
    /// show what would run and act like it succeeded
    dry: bool,

    #[argh(positional)]
    /// name of the command to run
    name: String,

    #[argh(positional, greedy)]
    /// key=value template assignments and positional arguments
    extras: Vec<String>,
}

#[derive(FromArgs)]
/// List all commands, available ones first.
#[argh(subcommand, name = "list")]
struct List {
    #[argh(option)]
    /// only show commands whose name or text matches this regex
    grep: Option<String>,
}

#[derive(FromArgs)]
/// Show version information.
#[argh(subcommand, name = "version")]
struct Version {}

#[derive(FromArgs)]
/// Show the path to the user configuration file.
#[argh(subcommand, name = "user-config-path")]
struct UserConfigPath {}

fn main() {
    let cli: Cli = argh::from_env();
    init_logging(cli.verbose);

    match dispatch(&cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            error!("{:#}", err);
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(verbose)
        .without_time()
        .init();
}

fn dispatch(cli: &Cli) -> Result<i32> {
    match &cli.subcommand {
        Subcommand::Run(run) => run_command(cli, run),
        Subcommand::List(list) => {
            list_commands(cli, list)?;
            Ok(0)
        }
        Subcommand::Version(_) => {
            println!(
                "xx version {} on {}",
                env!("CARGO_PKG_VERSION"),
                PlatformFacts::current()
            );
            println!("lua version {}", lua_version());
            Ok(0)
        }
        Subcommand::UserConfigPath(_) => {
            println!("{}", user_config_path(cli).display());
            Ok(0)
        }
    }
}

fn run_command(cli: &Cli, run: &Run) -> Result<i32> {
    let commands = load_commands(cli)?;

    let mut command = match plan_single(&commands, &run.name) {
        Ok(command) => command,
        Err(err) => {
            error!("Error planning command '{}': {}", run.name, err);
            return Ok(1);
        }
    };
    if run.yes {
        command.requires_confirmation = false;
    }

    let context = CommandContext {
        dry_run: run.dry,
        extras: run.extras.clone(),
    };
    match execute_command(command, &context) {
        Ok(code) => {
            debug!("Command '{}' exited with {}", run.name, code);
            Ok(code)
        }
        Err(err) => {
            error!("Error executing command '{}': {}", run.name, err);
            Ok(1)
        }
    }
}

fn list_commands(cli: &Cli, list: &List) -> Result<()> {
    let commands = load_commands(cli)?;
    let filter = match &list.grep {
        Some(pattern) => Some(
            RegexBuilder::new(pattern)
                .build()
                .with_context(|| format!("Invalid --grep pattern: {}", pattern))?,
        ),
        None => None,
    };

    let (available, unavailable) = listing(&commands, filter.as_ref());

    println!("Commands available for the current environment:");
    for line in &available {
        println!("-- {}", line);
    }
    if !unavailable.is_empty() {
        println!("Commands not available for the current environment: (due to constraints)");
        for line in &unavailable {
            println!("-- {}", line);
        }
    }
    Ok(())
}

/// Splits commands into listing lines for matching and non-matching
/// constraints, keeping only those accepted by `filter`.
fn listing(commands: &[Command], filter: Option<&Regex>) -> (Vec<String>, Vec<String>) {
    let mut available = Vec::new();
    let mut unavailable = Vec::new();

    for command in commands {
        let text = join_cmd(command);
        if let Some(re) = filter {
            if !re.is_match(&command.name) && !re.is_match(&text) {
                continue;
            }
        }

        let tag = if command.user_scope { "[User] " } else { "" };
        let line = format!("{}{}: {}", tag, command.name, text);
        if matches_constraints(command) {
            available.push(line);
        } else {
            unavailable.push(format!("{} [Constraints: {}]", line, join_constraints(command)));
        }
    }
    (available, unavailable)
}

fn load_commands(cli: &Cli) -> Result<Vec<Command>> {
    if cli.user && cli.project {
        bail!("Cannot use both --user and --project flags at once as they are mutually exclusive.");
    }
    if cli.user && cli.up {
        warn!("The --up flag has no effect when --user flag is used.");
    }

    let mut commands = Vec::new();
    if !cli.user {
        let workdir = std::env::current_dir().context("Cannot determine the working directory")?;
        commands.extend(load_project_config(&workdir, &cli.config, cli.up)?);
    }
    if !cli.project {
        commands.extend(load_user_config(&user_config_path(cli)));
    }
    Ok(commands)
}

fn load_project_config(workdir: &Path, file: &str, up: bool) -> Result<Vec<Command>> {
    debug!("Loading configuration from workdir: {}", workdir.display());
    let Some(path) = find_config(workdir, file, up) else {
        debug!("No configuration file found.");
        return Ok(Vec::new());
    };
    debug!("Configuration file found at: {}", path.display());

    match load_file(&path, false) {
        Ok(commands) => Ok(commands),
        Err(
            err @ (ConfigError::NotFound(_) | ConfigError::TooLarge(_) | ConfigError::Io { .. }),
        ) => {
            debug!("Error reading configuration file: {}", err);
            Ok(Vec::new())
        }
        Err(err) => Err(err).context("Error parsing configuration"),
    }
}

fn load_user_config(path: &Path) -> Vec<Command> {
    match load_file(path, true) {
        Ok(commands) => {
            debug!("User configuration found: {}", path.display());
            commands
        }
        Err(ConfigError::NotFound(_)) => {
            debug!("No user configuration file found at: {}", path.display());
            Vec::new()
        }
        Err(err) => {
            debug!("Error loading user configuration: {}", err);
            Vec::new()
        }
    }
}

/// Looks for `file` in `start`, or in `start` and each of its ancestors when
/// `up` is set.
fn find_config(start: &Path, file: &str, up: bool) -> Option<PathBuf> {
    if up {
        start
            .ancestors()
            .map(|dir| dir.join(file))
            .find(|candidate| candidate.exists())
    } else {
        let candidate = start.join(file);
        candidate.exists().then_some(candidate)
    }
}

fn user_config_path(cli: &Cli) -> PathBuf {
    match &cli.user_config {
        Some(path) => PathBuf::from(path),
        None => default_user_config_path(),
    }
}

fn default_user_config_path() -> PathBuf {
    if cfg!(windows) {
        let base = std::env::var_os("APPDATA").map(PathBuf::from).unwrap_or_default();
        base.join("xx").join("xx.yaml")
    } else {
        let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
        home.join(".config").join("xx").join("xx.yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(name: &str, cmd: &str, constraints: &[(&str, &str)], user_scope: bool) -> Command {
        Command {
            name: name.to_string(),
            cmd: vec![cmd.to_string()],
            constraints: constraints
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            user_scope,
            ..Command::default()
        }
    }

    #[test]
    fn test_cli_parses_run_with_extras() {
        let cli = Cli::from_args(&["xx"], &["--up", "run", "-y", "build", "mode=release", "extra"]).unwrap();
        assert!(cli.up);
        assert_eq!(cli.config, ".xx.yaml");
        let Subcommand::Run(run) = cli.subcommand else {
            panic!("expected run");
        };
        assert!(run.yes);
        assert!(!run.dry);
        assert_eq!(run.name, "build");
        assert_eq!(run.extras, vec!["mode=release", "extra"]);
    }

    #[test]
    fn test_cli_parses_global_options() {
        let cli = Cli::from_args(
            &["xx"],
            &["-c", "xx.toml", "-u", "/tmp/user.yaml", "--project", "list", "--grep", "^b"],
        )
        .unwrap();
        assert_eq!(cli.config, "xx.toml");
        assert_eq!(user_config_path(&cli), PathBuf::from("/tmp/user.yaml"));
        assert!(cli.project);
        let Subcommand::List(list) = cli.subcommand else {
            panic!("expected list");
        };
        assert_eq!(list.grep.as_deref(), Some("^b"));
    }

    #[test]
    fn test_listing_splits_by_constraints() {
        let commands = vec![
            command("build", "cargo build", &[], false),
            command("deploy", "./deploy.sh", &[("os", "plan9")], true),
        ];
        let (available, unavailable) = listing(&commands, None);
        assert_eq!(available, vec!["build: cargo build"]);
        assert_eq!(
            unavailable,
            vec!["[User] deploy: ./deploy.sh [Constraints: os=plan9]"]
        );
    }

    #[test]
    fn test_listing_grep_matches_name_or_text() {
        let commands = vec![
            command("build", "cargo build", &[], false),
            command("fmt", "cargo fmt", &[], false),
            command("hello", "echo hi", &[], true),
        ];
        let re = RegexBuilder::new("^b|fmt").build().unwrap();
        let (available, _) = listing(&commands, Some(&re));
        assert_eq!(available, vec!["build: cargo build", "fmt: cargo fmt"]);
    }

    #[test]
    fn test_find_config_walks_up_only_when_asked() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(root.path().join(".xx.yaml"), "alias: {}\n").unwrap();

        assert_eq!(find_config(&nested, ".xx.yaml", false), None);
        assert_eq!(
            find_config(&nested, ".xx.yaml", true),
            Some(root.path().join(".xx.yaml"))
        );
        assert_eq!(
            find_config(root.path(), ".xx.yaml", false),
            Some(root.path().join(".xx.yaml"))
        );
    }

    #[test]
    fn test_missing_user_config_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_user_config(&dir.path().join("absent.yaml")).is_empty());
    }

    #[test]
    fn test_broken_project_config_aborts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".xx.yaml"), "alias: [unterminated\n").unwrap();
        assert!(load_project_config(dir.path(), ".xx.yaml", false).is_err());

        std::fs::write(dir.path().join(".xx.yaml"), "alias:\n  hi:\n    cmd: echo hi\n").unwrap();
        let commands = load_project_config(dir.path(), ".xx.yaml", false).unwrap();
        assert_eq!(commands.len(), 1);
        assert!(!commands[0].user_scope);
    }
}
