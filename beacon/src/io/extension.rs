//! Extension loading and invocation.
//!
//! Loading reads and validates a manifest; it never executes the extension.
//! Invocation goes through the [`Invoker`] trait so orchestration can be tested
//! with scripted invokers that return canned stdout.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command as ProcessCommand;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::{Draft, Validator};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::core::action::{Action, ActionKind, Params, RunAction};
use crate::core::error::{BeaconError, BeaconResult};
use crate::core::manifest::{Command, Manifest};
use crate::core::page::ListItem;
use crate::io::process::{run_command_with_timeout, run_interactive};

/// File name looked up when an extension origin is a directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Environment variable carrying the JSON payload for every invocation.
pub const PAYLOAD_ENV: &str = "BEACON_PAYLOAD";

const MANIFEST_SCHEMA: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/schemas/manifest.schema.json"
));

/// An immutable snapshot of one loaded extension.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub alias: String,
    pub manifest: Manifest,
    /// Directory containing the manifest; entrypoints resolve against it.
    pub root: PathBuf,
    /// Manifest file the extension was loaded from.
    pub manifest_path: PathBuf,
}

impl Extension {
    pub fn command(&self, name: &str) -> BeaconResult<&Command> {
        self.manifest.command(name).ok_or_else(|| {
            BeaconError::protocol(format!(
                "extension {} has no command named {name}",
                self.alias
            ))
        })
    }

    /// Home page entries declared by the manifest.
    pub fn root_items(&self) -> Vec<ListItem> {
        self.manifest
            .items
            .iter()
            .map(|item| {
                let mut actions = vec![Action::new(ActionKind::Run(RunAction {
                    extension: Some(self.alias.clone()),
                    command: item.command.clone(),
                    params: item.params.clone(),
                    ..RunAction::default()
                }))
                .with_title("Run")];
                if !self.manifest.preferences.is_empty() {
                    actions.push(
                        Action::new(ActionKind::Config {
                            extension: self.alias.clone(),
                        })
                        .with_title("Configure"),
                    );
                }
                ListItem {
                    id: format!("{}:{}", self.alias, item.title),
                    title: item.title.clone(),
                    subtitle: Some(self.manifest.title.clone()),
                    accessories: vec![self.alias.clone()],
                    actions,
                }
            })
            .collect()
    }

    /// Entrypoint argv with relative program paths resolved against the manifest directory.
    pub fn entrypoint(&self) -> Vec<String> {
        let mut argv = self.manifest.entrypoint.argv().to_vec();
        if let Some(program) = argv.first_mut() {
            let path = Path::new(program.as_str());
            if path.is_relative() && program.contains('/') {
                *program = self.root.join(path).to_string_lossy().into_owned();
            }
        }
        argv
    }

    fn process_command(&self, payload: &Payload) -> BeaconResult<ProcessCommand> {
        let argv = self.entrypoint();
        let Some((program, args)) = argv.split_first() else {
            return Err(BeaconError::protocol(format!(
                "extension {} has an empty entrypoint",
                self.alias
            )));
        };
        let mut cmd = ProcessCommand::new(program);
        cmd.args(args)
            .arg(&payload.command)
            .env(PAYLOAD_ENV, payload.to_json()?)
            .current_dir(&self.root);
        Ok(cmd)
    }
}

/// JSON document handed to every invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub command: String,
    pub params: Params,
    pub preferences: Params,
}

impl Payload {
    pub fn to_json(&self) -> BeaconResult<String> {
        serde_json::to_string(self)
            .map_err(|err| BeaconError::protocol(format!("encode payload: {err}")))
    }
}

/// Load an extension from a manifest file or a directory containing `manifest.json`.
#[instrument(skip_all, fields(alias, origin = %origin.display()))]
pub fn load_extension(alias: &str, origin: &Path) -> Result<Extension> {
    let manifest_path = manifest_file(origin);
    let manifest = load_manifest(&manifest_path)?;
    let root = manifest_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    debug!(commands = manifest.commands.len(), "loaded manifest");
    Ok(Extension {
        alias: alias.to_string(),
        manifest,
        root,
        manifest_path,
    })
}

/// Manifest file for an origin that is either the file itself or its directory.
pub fn manifest_file(origin: &Path) -> PathBuf {
    if origin.is_dir() {
        origin.join(MANIFEST_FILE)
    } else {
        origin.to_path_buf()
    }
}

/// Read, schema-validate and deserialize a manifest file.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read manifest {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse manifest {}", path.display()))?;
    parse_manifest(value).with_context(|| format!("validate manifest {}", path.display()))
}

/// Validate a manifest document: schema first, then cross-references.
pub fn parse_manifest(value: Value) -> Result<Manifest> {
    validate_schema(&value)?;
    let manifest: Manifest = serde_json::from_value(value).context("deserialize manifest")?;
    validate_references(&manifest)?;
    Ok(manifest)
}

/// Embedded manifest schema (Draft 2020-12), compiled once.
static MANIFEST_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(MANIFEST_SCHEMA).expect("manifest schema is JSON");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("manifest schema compiles")
});

fn validate_schema(value: &Value) -> Result<()> {
    let messages: Vec<String> = MANIFEST_VALIDATOR
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!(
            "manifest schema validation failed:\n- {}",
            messages.join("\n- ")
        );
    }
    Ok(())
}

fn validate_references(manifest: &Manifest) -> Result<()> {
    let mut seen = BTreeSet::new();
    for command in &manifest.commands {
        if !seen.insert(command.name.as_str()) {
            return Err(anyhow!("duplicate command name {}", command.name));
        }
    }
    for item in &manifest.items {
        if !seen.contains(item.command.as_str()) {
            return Err(anyhow!(
                "item {} references unknown command {}",
                item.title,
                item.command
            ));
        }
    }
    Ok(())
}

/// Stdout of a command that exited successfully.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Captured {
    pub stdout: Vec<u8>,
    /// Bytes dropped past the output limit.
    pub truncated: usize,
}

impl Captured {
    /// The whole stdout, for output that is going to be decoded.
    pub fn complete(self, command: &str) -> BeaconResult<Vec<u8>> {
        if self.truncated > 0 {
            return Err(BeaconError::execution(format!(
                "{command} produced more output than allowed (stdout truncated by {} bytes)",
                self.truncated
            )));
        }
        Ok(self.stdout)
    }
}

/// Abstraction over how extension commands are spawned.
pub trait Invoker: Send + Sync {
    /// Run with the payload on stdin and return captured stdout.
    ///
    /// Spawn failure, timeout and non-zero exit are execution errors. Output
    /// past the limit is dropped and counted, not treated as a failure.
    fn capture(&self, extension: &Extension, payload: &Payload) -> BeaconResult<Captured>;

    /// Run with inherited stdio, blocking until the child exits.
    fn interactive(&self, extension: &Extension, payload: &Payload) -> BeaconResult<()>;
}

/// Invoker that spawns the extension entrypoint as a child process.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Invoker for ProcessInvoker {
    #[instrument(skip_all, fields(alias = %extension.alias, command = %payload.command))]
    fn capture(&self, extension: &Extension, payload: &Payload) -> BeaconResult<Captured> {
        let cmd = extension.process_command(payload)?;
        let stdin = payload.to_json()?;
        let output = run_command_with_timeout(
            cmd,
            Some(stdin.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .map_err(|err| {
            BeaconError::execution(format!("failed to run {}: {err:#}", payload.command))
        })?;

        if output.timed_out {
            return Err(BeaconError::execution_with_stderr(
                format!(
                    "{} timed out after {}s",
                    payload.command,
                    self.timeout.as_secs()
                ),
                &output.stderr,
            ));
        }
        if !output.success() {
            warn!(exit_code = ?output.code(), "extension command failed");
            return Err(BeaconError::execution_with_stderr(
                format!("{} exited with {}", payload.command, describe_code(output.code())),
                &output.stderr,
            ));
        }
        Ok(Captured {
            stdout: output.stdout,
            truncated: output.stdout_truncated,
        })
    }

    #[instrument(skip_all, fields(alias = %extension.alias, command = %payload.command))]
    fn interactive(&self, extension: &Extension, payload: &Payload) -> BeaconResult<()> {
        let cmd = extension.process_command(payload)?;
        let status = run_interactive(cmd).map_err(|err| {
            BeaconError::execution(format!("failed to run {}: {err:#}", payload.command))
        })?;
        if !status.success() {
            return Err(BeaconError::execution(format!(
                "{} exited with {}",
                payload.command,
                describe_code(status.code())
            )));
        }
        Ok(())
    }
}

pub(crate) fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("status {code}"),
        None => "a signal".to_string(),
    }
}
