//! Terminal launcher for extension commands.
//!
//! Without a subcommand beacon opens the interactive home page listing every
//! configured extension's root items. `run` invokes a single command, `ls`
//! lists extensions and `validate` checks a manifest. `edit` opens an
//! extension's manifest in the editor and `reload` re-reads it.

use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use beacon::app::App;
use beacon::core::action::{Action, ActionKind, Params, RunAction};
use beacon::core::error::BeaconError;
use beacon::core::manifest::{Command as ManifestCommand, CommandMode};
use beacon::core::resolver::{find_missing_inputs, input_names, parse_input, with_defaults};
use beacon::executor::Services;
use beacon::exit_codes;
use beacon::io::config::BeaconConfig;
use beacon::io::effects::{Effects, SystemEffects};
use beacon::io::extension::{Extension, Invoker, Payload, ProcessInvoker, load_manifest};
use beacon::io::history::History;
use beacon::io::paths::BeaconPaths;
use beacon::io::registry::{ConfigRegistry, PreferenceStore, Registry};
use beacon::logging;
use beacon::navigator::{ActionMsg, Msg, Navigator};
use beacon::tui::TerminalSurface;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "beacon",
    version,
    about = "Terminal launcher driven by extension commands"
)]
struct Cli {
    /// Configuration file (defaults to `<config dir>/beacon/config.toml`).
    #[arg(long, global = true, env = "BEACON_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run one extension command.
    Run {
        alias: String,
        command: String,
        /// Command parameter as `name=value`; may be repeated.
        #[arg(long = "param", value_name = "NAME=VALUE", value_parser = parse_key_value)]
        params: Vec<(String, String)>,
    },
    /// List configured extensions.
    Ls,
    /// Check a manifest against the schema.
    Validate { path: PathBuf },
    /// Open an extension's manifest in `$VISUAL` or `$EDITOR`.
    Edit { alias: String },
    /// Load an extension again and report whether it is usable.
    Reload { alias: String },
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected NAME=VALUE, got {raw:?}")),
    }
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            failure_code(&err)
        }
    };
    std::process::exit(code);
}

fn failure_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<BeaconError>() {
        Some(BeaconError::Execution { .. } | BeaconError::Protocol(_)) => exit_codes::FAILURE,
        _ => exit_codes::INVALID,
    }
}

fn run(cli: Cli) -> Result<i32> {
    let paths = BeaconPaths::discover()?.with_config_file(cli.config);
    match cli.command {
        None => {
            logging::init_file(&paths.log_file)?;
            let registry = open_registry(&paths)?;
            interactive(paths, registry, Vec::new())
        }
        Some(Command::Run {
            alias,
            command,
            params,
        }) => {
            if io::stdout().is_terminal() {
                logging::init_file(&paths.log_file)?;
                let registry = open_registry(&paths)?;
                let params = typed_params(&registry, &alias, &command, params)?;
                let action = Action::new(ActionKind::Run(RunAction {
                    extension: Some(alias),
                    command,
                    params,
                    ..RunAction::default()
                }));
                interactive(paths, registry, vec![Msg::Action(ActionMsg::new(action))])
            } else {
                logging::init_stderr();
                run_once(&paths, &alias, &command, params)
            }
        }
        Some(Command::Ls) => {
            logging::init_stderr();
            list_extensions(&paths)
        }
        Some(Command::Validate { path }) => {
            logging::init_stderr();
            validate(&path)
        }
        Some(Command::Edit { alias }) => {
            logging::init_stderr();
            edit_extension(&paths, &alias)
        }
        Some(Command::Reload { alias }) => {
            logging::init_stderr();
            reload_extension(&paths, &alias)
        }
    }
}

fn open_registry(paths: &BeaconPaths) -> Result<ConfigRegistry> {
    let registry = ConfigRegistry::open(&paths.config_file)?;
    for (alias, reason) in registry.failures() {
        warn!(alias = %alias, reason = %reason, "extension unavailable");
    }
    Ok(registry)
}

fn process_invoker(config: &BeaconConfig) -> ProcessInvoker {
    ProcessInvoker {
        timeout: Duration::from_secs(config.command_timeout_secs),
        output_limit_bytes: config.output_limit_bytes,
    }
}

fn interactive(paths: BeaconPaths, registry: ConfigRegistry, initial: Vec<Msg>) -> Result<i32> {
    let paths = paths.with_history_file(registry.config().history_path.clone());
    let history = History::load(&paths.history_file).unwrap_or_else(|err| {
        warn!(err = %format!("{err:#}"), "history unreadable; starting empty");
        History::empty(&paths.history_file)
    });
    let services = Services {
        invoker: Arc::new(process_invoker(registry.config())),
        effects: Arc::new(SystemEffects::from_env()?),
    };

    let size = TerminalSurface::size()?;
    let surface = TerminalSurface::enter()?;
    let navigator = Navigator::new(registry, history);
    let mut app = App::new(navigator, surface, services);

    let mut messages = vec![Msg::Resize(size)];
    messages.extend(initial);
    app.run(messages)?;
    Ok(exit_codes::OK)
}

/// Run a command without the interactive surface and print its raw stdout.
fn run_once(
    paths: &BeaconPaths,
    alias: &str,
    command: &str,
    pairs: Vec<(String, String)>,
) -> Result<i32> {
    let registry = open_registry(paths)?;
    let extension = registry.get(alias)?;
    let declared = extension.command(command)?.clone();

    let mut params = read_stdin_params()?;
    params.extend(cli_params(Some(&declared), pairs)?);

    let preferences = registry.preferences(alias);
    let mut missing = input_names(&find_missing_inputs(
        &extension.manifest.preferences,
        &preferences,
    ));
    missing.extend(input_names(&find_missing_inputs(&declared.params, &params)));
    if !missing.is_empty() {
        return Err(BeaconError::Resolution { missing }.into());
    }

    let payload = Payload {
        command: declared.name.clone(),
        params: with_defaults(&declared.params, params),
        preferences: with_defaults(&extension.manifest.preferences, preferences),
    };
    info!(alias, command, mode = ?declared.mode, "running without terminal");
    let invoker = process_invoker(registry.config());
    invoke_once(&invoker, &extension, &declared, &payload)?;
    Ok(exit_codes::OK)
}

fn invoke_once(
    invoker: &dyn Invoker,
    extension: &Extension,
    command: &ManifestCommand,
    payload: &Payload,
) -> Result<()> {
    if command.mode.is_interactive() {
        invoker.interactive(extension, payload)?;
        return Ok(());
    }
    let captured = invoker.capture(extension, payload)?;
    // Silent output is passed through as-is; decoded modes need all of it.
    let stdout = if command.mode == CommandMode::Silent {
        captured.stdout
    } else {
        captured.complete(&command.name)?
    };
    let mut out = io::stdout().lock();
    out.write_all(&stdout).context("write command output")?;
    out.flush().context("flush stdout")?;
    Ok(())
}

/// Params piped in as a JSON object; blank or terminal stdin supplies none.
fn read_stdin_params() -> Result<Params> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(Params::new());
    }
    let mut raw = String::new();
    stdin
        .lock()
        .read_to_string(&mut raw)
        .context("read params from stdin")?;
    parse_stdin_params(&raw)
}

fn parse_stdin_params(raw: &str) -> Result<Params> {
    if raw.trim().is_empty() {
        return Ok(Params::new());
    }
    let value: Value = serde_json::from_str(raw).context("parse params from stdin")?;
    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => bail!("params on stdin must be a JSON object"),
    }
}

/// Convert `--param` pairs using the inputs `alias` declares for `command`.
fn typed_params(
    registry: &impl Registry,
    alias: &str,
    command: &str,
    pairs: Vec<(String, String)>,
) -> Result<Params> {
    let extension = registry.get(alias)?;
    let declared = extension.command(command)?;
    cli_params(Some(declared), pairs)
}

/// Convert `--param` pairs, typed by the command's declared inputs when known.
fn cli_params(command: Option<&ManifestCommand>, pairs: Vec<(String, String)>) -> Result<Params> {
    let mut params = Params::new();
    for (name, raw) in pairs {
        let declared = command.and_then(|cmd| cmd.params.iter().find(|input| input.name == name));
        let value = match declared {
            Some(input) => parse_input(input, &raw).map_err(|msg| anyhow!(msg))?,
            None => Value::String(raw),
        };
        params.insert(name, value);
    }
    Ok(params)
}

fn list_extensions(paths: &BeaconPaths) -> Result<i32> {
    let registry = ConfigRegistry::open(&paths.config_file)?;
    let mut out = io::stdout().lock();
    for extension in registry.extensions() {
        writeln!(out, "{}\t{}", extension.alias, extension.manifest.title)?;
    }
    for (alias, reason) in registry.failures() {
        writeln!(out, "{alias}\t(failed to load: {reason})")?;
    }
    Ok(exit_codes::OK)
}

fn edit_extension(paths: &BeaconPaths, alias: &str) -> Result<i32> {
    let registry = ConfigRegistry::open(&paths.config_file)?;
    let manifest = registry.manifest_path(alias)?;
    info!(alias, path = %manifest.display(), "editing manifest");
    SystemEffects::from_env()?.edit(&manifest)?;
    Ok(exit_codes::OK)
}

fn reload_extension(paths: &BeaconPaths, alias: &str) -> Result<i32> {
    let registry = ConfigRegistry::open(&paths.config_file)?;
    let extension = registry.get(alias)?;
    eprintln!(
        "extension reloaded: {} ({} commands)",
        extension.alias,
        extension.manifest.commands.len()
    );
    Ok(exit_codes::OK)
}

fn validate(path: &Path) -> Result<i32> {
    match load_manifest(path) {
        Ok(manifest) => {
            println!(
                "{}: ok ({} commands)",
                path.display(),
                manifest.commands.len()
            );
            Ok(exit_codes::OK)
        }
        Err(err) => {
            eprintln!("{:#}", err);
            Ok(exit_codes::INVALID)
        }
    }
}
