//! Test-only builders and scripted collaborators.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Result, anyhow};

use crate::core::action::Params;
use crate::core::error::{BeaconError, BeaconResult};
use crate::core::manifest::{Command, CommandMode, Entrypoint, Input, InputType, Manifest, RootItem};
use crate::executor::Services;
use crate::io::effects::Effects;
use crate::io::extension::{Captured, Extension, Invoker, Payload};
use crate::io::registry::{PreferenceStore, Registry};
use crate::navigator::{Effect, Msg, Navigator};

/// Required input of the given type.
pub fn input(name: &str, kind: InputType) -> Input {
    Input {
        name: name.to_string(),
        kind,
        title: None,
        description: None,
        required: None,
        optional: false,
        default: None,
        choices: Vec::new(),
    }
}

pub fn optional_input(name: &str, kind: InputType) -> Input {
    Input {
        optional: true,
        ..input(name, kind)
    }
}

pub fn command(name: &str, mode: CommandMode, params: Vec<Input>) -> Command {
    Command {
        name: name.to_string(),
        title: None,
        description: None,
        mode,
        params,
    }
}

pub fn root_item(title: &str, command: &str) -> RootItem {
    RootItem {
        title: title.to_string(),
        command: command.to_string(),
        params: Params::new(),
    }
}

/// Extension rooted at `/ext/<alias>` with no root items.
pub fn extension(alias: &str, commands: Vec<Command>, preferences: Vec<Input>) -> Extension {
    let root = Path::new("/ext").join(alias);
    Extension {
        alias: alias.to_string(),
        manifest: Manifest {
            title: format!("{alias} title"),
            description: None,
            entrypoint: Entrypoint::Program("./main.sh".to_string()),
            commands,
            preferences,
            items: Vec::new(),
        },
        manifest_path: root.join("manifest.json"),
        root,
    }
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub alias: String,
    pub payload: Payload,
    pub interactive: bool,
}

#[derive(Debug, Clone)]
enum Reply {
    Stdout(String),
    Fail(String),
}

/// Invoker returning canned stdout per command name.
///
/// Replies queue up per command; the last one repeats once the queue is drained.
#[derive(Debug, Default)]
pub struct ScriptedInvoker {
    replies: Mutex<BTreeMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, command: &str, stdout: &str) -> Self {
        self.push(command, Reply::Stdout(stdout.to_string()));
        self
    }

    pub fn fail(self, command: &str, message: &str) -> Self {
        self.push(command, Reply::Fail(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    fn push(&self, command: &str, reply: Reply) {
        lock(&self.replies)
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
    }

    fn reply(&self, extension: &Extension, payload: &Payload, interactive: bool) -> BeaconResult<Captured> {
        lock(&self.calls).push(Call {
            alias: extension.alias.clone(),
            payload: payload.clone(),
            interactive,
        });
        let mut replies = lock(&self.replies);
        let queue = replies.get_mut(&payload.command).ok_or_else(|| {
            BeaconError::execution(format!("no scripted reply for {}", payload.command))
        })?;
        let reply = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match reply {
            Some(Reply::Stdout(stdout)) => Ok(Captured {
                stdout: stdout.into_bytes(),
                truncated: 0,
            }),
            Some(Reply::Fail(message)) => Err(BeaconError::execution_with_stderr(
                format!("{} exited with status 1", payload.command),
                message.as_bytes(),
            )),
            None => Err(BeaconError::execution(format!(
                "no scripted reply for {}",
                payload.command
            ))),
        }
    }
}

impl Invoker for ScriptedInvoker {
    fn capture(&self, extension: &Extension, payload: &Payload) -> BeaconResult<Captured> {
        self.reply(extension, payload, false)
    }

    fn interactive(&self, extension: &Extension, payload: &Payload) -> BeaconResult<()> {
        self.reply(extension, payload, true).map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectCall {
    Copy(String),
    Open { target: String, app: Option<String> },
    Edit(PathBuf),
    Shell { command: String, dir: Option<PathBuf> },
}

/// Effects that only record what was requested.
#[derive(Debug, Default)]
pub struct RecordingEffects {
    calls: Mutex<Vec<EffectCall>>,
    failing: bool,
}

impl RecordingEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every effect is recorded and then reported as failed.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<EffectCall> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: EffectCall) -> Result<()> {
        lock(&self.calls).push(call);
        if self.failing {
            Err(anyhow!("effect unavailable"))
        } else {
            Ok(())
        }
    }
}

impl Effects for RecordingEffects {
    fn copy(&self, text: &str) -> Result<()> {
        self.record(EffectCall::Copy(text.to_string()))
    }

    fn open(&self, target: &str, app: Option<&str>) -> Result<()> {
        self.record(EffectCall::Open {
            target: target.to_string(),
            app: app.map(str::to_string),
        })
    }

    fn edit(&self, path: &Path) -> Result<()> {
        self.record(EffectCall::Edit(path.to_path_buf()))
    }

    fn shell(&self, command: &str, dir: Option<&Path>) -> Result<()> {
        self.record(EffectCall::Shell {
            command: command.to_string(),
            dir: dir.map(Path::to_path_buf),
        })
    }
}

/// In-memory registry; `reload` swaps in the staged snapshot, if any.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    extensions: BTreeMap<String, Arc<Extension>>,
    preferences: BTreeMap<String, Params>,
    staged: Option<Vec<Extension>>,
    fail_saves: bool,
    pub reloads: usize,
}

impl MemoryRegistry {
    pub fn new(extensions: Vec<Extension>) -> Self {
        Self {
            extensions: index(extensions),
            ..Self::default()
        }
    }

    pub fn with_preferences(mut self, alias: &str, values: Params) -> Self {
        self.preferences.insert(alias.to_string(), values);
        self
    }

    pub fn failing_saves(mut self) -> Self {
        self.fail_saves = true;
        self
    }

    /// Snapshot returned by the next `reload`.
    pub fn stage(&mut self, extensions: Vec<Extension>) {
        self.staged = Some(extensions);
    }
}

fn index(extensions: Vec<Extension>) -> BTreeMap<String, Arc<Extension>> {
    extensions
        .into_iter()
        .map(|extension| (extension.alias.clone(), Arc::new(extension)))
        .collect()
}

impl Registry for MemoryRegistry {
    fn get(&self, alias: &str) -> BeaconResult<Arc<Extension>> {
        self.extensions
            .get(alias)
            .cloned()
            .ok_or_else(|| BeaconError::protocol(format!("unknown extension {alias}")))
    }

    fn extensions(&self) -> Vec<Arc<Extension>> {
        self.extensions.values().cloned().collect()
    }

    fn reload(&mut self) -> BeaconResult<()> {
        self.reloads += 1;
        if let Some(staged) = self.staged.take() {
            self.extensions = index(staged);
        }
        Ok(())
    }
}

impl PreferenceStore for MemoryRegistry {
    fn preferences(&self, alias: &str) -> Params {
        self.preferences.get(alias).cloned().unwrap_or_default()
    }

    fn save_preferences(&mut self, alias: &str, values: Params) -> BeaconResult<()> {
        if self.fail_saves {
            return Err(BeaconError::Persistence(anyhow!("disk full")));
        }
        self.preferences
            .entry(alias.to_string())
            .or_default()
            .extend(values);
        Ok(())
    }
}

pub fn services(invoker: Arc<ScriptedInvoker>, effects: Arc<RecordingEffects>) -> Services {
    Services { invoker, effects }
}

/// What happened while driving the navigator to idle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Drive {
    pub quit: bool,
    pub background: usize,
    pub suspended: usize,
}

/// Dispatch `msg` and run every resulting job inline until nothing is pending.
pub fn run_to_idle<R: Registry + PreferenceStore>(
    navigator: &mut Navigator<R>,
    services: &Services,
    msg: Msg,
) -> Drive {
    let mut drive = Drive::default();
    let mut queue = VecDeque::from([msg]);
    while let Some(msg) = queue.pop_front() {
        for effect in navigator.dispatch(msg) {
            match effect {
                Effect::Background(job) => {
                    drive.background += 1;
                    queue.push_back(job.run(services));
                }
                Effect::Suspend(job) => {
                    drive.suspended += 1;
                    queue.push_back(job.run(services));
                }
                Effect::Quit => {
                    drive.quit = true;
                    return drive;
                }
            }
        }
    }
    drive
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
