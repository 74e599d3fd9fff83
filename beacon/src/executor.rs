//! Command execution: turns a resolved invocation into a page, a follow-up
//! action, or a completion signal depending on the command's mode.
//!
//! [`Job`] is the unit of work the event loop runs outside the navigator. Every
//! job produces exactly one [`Msg`] that is fed back into the loop.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::core::action::{Action, ActionKind, PostEffects};
use crate::core::error::{BeaconError, BeaconResult};
use crate::core::manifest::{Command, CommandMode};
use crate::core::page::{DetailPage, ListPage, Page};
use crate::io::effects::Effects;
use crate::io::extension::{Extension, Invoker, Payload};
use crate::navigator::{ActionMsg, FrameId, Msg, Source};

/// A fully resolved command invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub extension: Arc<Extension>,
    pub command: Command,
    pub payload: Payload,
    /// Post-effects requested by the action that triggered the invocation.
    pub post: PostEffects,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// List or detail output to show.
    Page(Page),
    /// Action-mode output, to dispatch as if the user triggered it.
    Action(Action),
    /// The command finished without output to act on.
    Done(PostEffects),
}

/// Run `invocation` according to its command mode.
#[instrument(skip_all, fields(alias = %invocation.extension.alias, command = %invocation.command.name, mode = ?invocation.command.mode))]
pub fn execute(invoker: &dyn Invoker, invocation: &Invocation) -> BeaconResult<Outcome> {
    let extension = invocation.extension.as_ref();
    let name = &invocation.command.name;
    match invocation.command.mode {
        CommandMode::List => {
            let stdout = invoker.capture(extension, &invocation.payload)?.complete(name)?;
            let page: ListPage = decode(name, "list page", &stdout)?;
            debug!(items = page.items.len(), "decoded list page");
            Ok(Outcome::Page(Page::List(page)))
        }
        CommandMode::Detail => {
            let stdout = invoker.capture(extension, &invocation.payload)?.complete(name)?;
            let page: DetailPage = decode(name, "detail page", &stdout)?;
            Ok(Outcome::Page(Page::Detail(page)))
        }
        CommandMode::Silent => {
            let captured = invoker.capture(extension, &invocation.payload)?;
            if captured.truncated > 0 {
                debug!(truncated = captured.truncated, "discarding truncated silent output");
            }
            Ok(Outcome::Done(invocation.post))
        }
        CommandMode::Tty => {
            invoker.interactive(extension, &invocation.payload)?;
            Ok(Outcome::Done(invocation.post))
        }
        CommandMode::Action => {
            let stdout = invoker.capture(extension, &invocation.payload)?.complete(name)?;
            if stdout.iter().all(u8::is_ascii_whitespace) {
                return Ok(Outcome::Done(invocation.post));
            }
            let action: Action = decode(name, "action", &stdout)?;
            if matches!(action.kind, ActionKind::Run(_)) {
                warn!("rejecting chained run action");
                return Err(BeaconError::protocol(format!(
                    "{name} returned a run action; chained runs are not allowed"
                )));
            }
            Ok(Outcome::Action(action))
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(command: &str, what: &str, stdout: &[u8]) -> BeaconResult<T> {
    serde_json::from_slice(stdout)
        .map_err(|err| BeaconError::protocol(format!("{command} did not print a valid {what}: {err}")))
}

/// Shared collaborators jobs run against.
#[derive(Clone)]
pub struct Services {
    pub invoker: Arc<dyn Invoker>,
    pub effects: Arc<dyn Effects>,
}

/// Where a produced page goes.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Push(Source),
    /// Replace the page of this frame, e.g. on reload.
    Replace(FrameId),
}

#[derive(Debug, Clone)]
pub enum Job {
    Invoke {
        invocation: Invocation,
        target: Target,
    },
    Copy {
        text: String,
        post: PostEffects,
    },
    Open {
        target: String,
        app: Option<String>,
        post: PostEffects,
    },
    Edit {
        path: PathBuf,
        post: PostEffects,
    },
    Shell {
        command: String,
        dir: Option<PathBuf>,
        post: PostEffects,
    },
}

impl Job {
    /// Whether the job needs the terminal while it runs.
    pub fn is_interactive(&self) -> bool {
        match self {
            Job::Invoke { invocation, .. } => invocation.command.mode.is_interactive(),
            Job::Edit { .. } | Job::Shell { .. } => true,
            Job::Copy { .. } | Job::Open { .. } => false,
        }
    }

    pub fn run(self, services: &Services) -> Msg {
        match self {
            Job::Invoke { invocation, target } => {
                match execute(services.invoker.as_ref(), &invocation) {
                    Ok(Outcome::Page(page)) => match target {
                        Target::Push(source) => Msg::Push { page, source },
                        Target::Replace(frame) => Msg::Replace { frame, page },
                    },
                    Ok(Outcome::Action(action)) => Msg::Action(ActionMsg {
                        origin: Some(invocation.extension.alias.clone()),
                        after: invocation.post,
                        ..ActionMsg::new(action)
                    }),
                    Ok(Outcome::Done(post)) => Msg::Done(post),
                    Err(err) => Msg::Error(err),
                }
            }
            Job::Copy { text, post } => {
                finish(services.effects.copy(&text), post, "copy to clipboard")
            }
            Job::Open { target, app, post } => {
                finish(services.effects.open(&target, app.as_deref()), post, "open")
            }
            Job::Edit { path, post } => finish(services.effects.edit(&path), post, "edit"),
            Job::Shell { command, dir, post } => {
                finish(services.effects.shell(&command, dir.as_deref()), post, "exec")
            }
        }
    }
}

fn finish(result: anyhow::Result<()>, post: PostEffects, what: &str) -> Msg {
    match result {
        Ok(()) => Msg::Done(post),
        Err(err) => Msg::Error(BeaconError::execution(format!("{what} failed: {err:#}"))),
    }
}
