//! Page navigator: owns the page stack and turns messages into stack
//! transitions and effects.
//!
//! Actions are intercepted here before any page-local handling so that a form
//! collecting missing inputs can be pushed above the page that emitted them.
//! The navigator never blocks: subprocesses and OS side effects are returned as
//! [`Effect`]s for the event loop to run.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::core::action::{Action, ActionKind, FollowUp, Params, PostEffects, RunAction};
use crate::core::error::{BeaconError, BeaconResult};
use crate::core::page::{Key, ListPage, Page, PageEvent};
use crate::core::resolver::{
    Completion, config_form, find_missing_inputs, input_names, params_form, preferences_form,
    with_defaults,
};
use crate::executor::{Invocation, Job, Target};
use crate::io::extension::{Extension, Payload};
use crate::io::history::History;
use crate::io::registry::{PreferenceStore, Registry};

pub const HOME_TITLE: &str = "Beacon";

/// Terminal dimensions, propagated to every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

/// What produced a page, used to refresh it on reload.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Home,
    /// A command page; `action` is the fully resolved run that produced it.
    Command { extension: String, action: Action },
    /// Forms and error pages.
    Transient,
}

impl Source {
    fn extension(&self) -> Option<&str> {
        match self {
            Source::Command { extension, .. } => Some(extension.as_str()),
            Source::Home | Source::Transient => None,
        }
    }
}

/// Stable identity of a pushed frame; never reused within a session.
pub type FrameId = u64;

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: FrameId,
    pub page: Page,
    pub source: Source,
    pub size: Size,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionMsg {
    pub action: Action,
    /// Extension that produced the page or output carrying the action.
    pub origin: Option<String>,
    /// Set when replaying a completed form; inputs still missing are then an error.
    pub replayed: bool,
    /// Post-effects of the run whose output carried the action, honored once
    /// the action's own effect is applied.
    pub after: PostEffects,
}

impl ActionMsg {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            origin: None,
            replayed: false,
            after: PostEffects::default(),
        }
    }
}

#[derive(Debug)]
pub enum Msg {
    Key(Key),
    Resize(Size),
    Action(ActionMsg),
    Push { page: Page, source: Source },
    /// Replace the frame with this id, if it is still on the stack.
    Replace { frame: FrameId, page: Page },
    /// A job finished; apply its post-effects.
    Done(PostEffects),
    Error(BeaconError),
    Reload,
    Exit,
}

/// Work the event loop performs on behalf of the navigator.
#[derive(Debug)]
pub enum Effect {
    /// Run off the loop; the result arrives later as a message.
    Background(Job),
    /// Hand the terminal to the job and block until it finishes.
    Suspend(Job),
    Quit,
}

/// Read-only snapshot handed to the rendering surface.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    pub frames: &'a [Frame],
    pub notice: Option<&'a str>,
}

enum Plan {
    Invoke {
        invocation: Invocation,
        source: Source,
    },
    Form {
        page: Page,
        missing: Vec<String>,
    },
}

pub struct Navigator<R> {
    stack: Vec<Frame>,
    registry: R,
    history: History,
    size: Size,
    notice: Option<String>,
    next_id: FrameId,
}

impl<R: Registry + PreferenceStore> Navigator<R> {
    /// Start with the home page as the only frame.
    pub fn new(registry: R, history: History) -> Self {
        let mut navigator = Self {
            stack: Vec::new(),
            registry,
            history,
            size: Size::default(),
            notice: None,
            next_id: 0,
        };
        let home = navigator.home_page();
        navigator.push(Page::List(home), Source::Home);
        navigator
    }

    pub fn stack(&self) -> &[Frame] {
        &self.stack
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn active(&self) -> Option<&Frame> {
        self.stack.last()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn view(&self) -> View<'_> {
        View {
            frames: &self.stack,
            notice: self.notice.as_deref(),
        }
    }

    pub fn push(&mut self, page: Page, source: Source) {
        self.next_id += 1;
        debug!(
            title = page.title(),
            depth = self.stack.len() + 1,
            frame = self.next_id,
            "push page"
        );
        self.stack.push(Frame {
            id: self.next_id,
            page,
            source,
            size: self.size,
        });
    }

    /// Pop the active page. Returns `false` when it is the last one, which
    /// callers treat as exit.
    pub fn pop(&mut self) -> bool {
        if self.stack.len() <= 1 {
            return false;
        }
        self.stack.pop();
        true
    }

    /// Replace the active page, keeping its source.
    pub fn replace(&mut self, page: Page) {
        if let Some(id) = self.active().map(|frame| frame.id) {
            self.replace_frame(id, page);
        }
    }

    pub fn dispatch(&mut self, msg: Msg) -> Vec<Effect> {
        match msg {
            Msg::Key(Key::Reload) => self.reload_active(),
            Msg::Key(Key::EditExtension) => self.edit_selected_extension(),
            Msg::Key(key) => self.handle_key(key),
            Msg::Resize(size) => {
                self.size = size;
                for frame in &mut self.stack {
                    frame.size = size;
                }
                Vec::new()
            }
            Msg::Action(action) => self.apply_action(action),
            Msg::Push { page, source } => {
                self.push(page, source);
                Vec::new()
            }
            Msg::Replace { frame, page } => {
                self.replace_frame(frame, page);
                Vec::new()
            }
            Msg::Done(post) => match post.follow_up() {
                FollowUp::Exit => vec![Effect::Quit],
                FollowUp::Reload => self.reload_active(),
                FollowUp::Stay => Vec::new(),
            },
            Msg::Error(err) => {
                self.push_error(&err);
                Vec::new()
            }
            Msg::Reload => self.reload_active(),
            Msg::Exit => vec![Effect::Quit],
        }
    }

    fn handle_key(&mut self, key: Key) -> Vec<Effect> {
        self.notice = None;
        let Some(frame) = self.stack.last_mut() else {
            return vec![Effect::Quit];
        };
        match frame.page.handle_key(key) {
            PageEvent::None => Vec::new(),
            PageEvent::Back => {
                if self.pop() {
                    Vec::new()
                } else {
                    vec![Effect::Quit]
                }
            }
            PageEvent::Action { action, item_id } => {
                let origin = frame.source.extension().map(str::to_string);
                if let Some(id) = item_id.filter(|id| !id.is_empty()) {
                    self.record_selection(&id);
                }
                self.apply_action(ActionMsg {
                    origin,
                    ..ActionMsg::new(action)
                })
            }
            PageEvent::Submit(values) => self.submit(values),
        }
    }

    fn submit(&mut self, values: Params) -> Vec<Effect> {
        let Some(Frame {
            page: Page::Form(form),
            ..
        }) = self.stack.last().cloned()
        else {
            return Vec::new();
        };
        self.pop();
        match form.submit.complete(values) {
            Completion::Replay(action) => self.apply_action(ActionMsg {
                replayed: true,
                ..ActionMsg::new(action)
            }),
            Completion::StorePreferences {
                extension,
                values,
                resume,
            } => {
                if let Err(err) = self.registry.save_preferences(&extension, values) {
                    self.push_error(&err);
                    return Vec::new();
                }
                info!(alias = %extension, "preferences saved");
                match resume {
                    Some(action) => self.apply_action(ActionMsg::new(action)),
                    None => Vec::new(),
                }
            }
        }
    }

    #[instrument(skip_all, fields(action = %msg.action.label(), replayed = msg.replayed))]
    fn apply_action(&mut self, msg: ActionMsg) -> Vec<Effect> {
        let ActionMsg {
            action,
            origin,
            replayed,
            after,
        } = msg;
        let post = action.post_effects().merge(after);
        let title = action.title;
        match action.kind {
            ActionKind::Run(mut run) => {
                run.exit = post.exit;
                run.reload = post.reload;
                self.run(run, title, origin, replayed)
            }
            ActionKind::Copy { text, .. } => vec![Effect::Background(Job::Copy { text, post })],
            ActionKind::Open { target, app, .. } => {
                vec![Effect::Background(Job::Open { target, app, post })]
            }
            ActionKind::Edit { target, .. } => vec![Effect::Suspend(Job::Edit {
                path: target,
                post,
            })],
            ActionKind::Exec { command, dir, .. } => {
                vec![Effect::Suspend(Job::Shell { command, dir, post })]
            }
            // Variants without flags of their own: an inherited exit wins.
            ActionKind::Config { .. } | ActionKind::Reload if after.exit => {
                debug!("inherited exit");
                vec![Effect::Quit]
            }
            ActionKind::Config { extension } => {
                if let Err(err) = self.configure(&extension) {
                    self.push_error(&err);
                }
                Vec::new()
            }
            ActionKind::Reload => self.reload_active(),
            ActionKind::Exit => vec![Effect::Quit],
        }
    }

    /// Resolve a run and either push the form collecting missing inputs or
    /// schedule the invocation.
    fn run(
        &mut self,
        run: RunAction,
        title: Option<String>,
        origin: Option<String>,
        replayed: bool,
    ) -> Vec<Effect> {
        match self.plan_run(run, title, origin) {
            Ok(Plan::Form { missing, .. }) if replayed => {
                self.push_error(&BeaconError::Resolution { missing });
                Vec::new()
            }
            Ok(Plan::Form { page, .. }) => {
                self.push(page, Source::Transient);
                Vec::new()
            }
            Ok(Plan::Invoke { invocation, source }) => {
                vec![schedule(Job::Invoke {
                    invocation,
                    target: Target::Push(source),
                })]
            }
            Err(err) => {
                self.push_error(&err);
                Vec::new()
            }
        }
    }

    /// Preferences are gated before params; each gap yields its own form.
    fn plan_run(
        &self,
        run: RunAction,
        title: Option<String>,
        origin: Option<String>,
    ) -> BeaconResult<Plan> {
        let alias = run.extension.clone().or(origin).ok_or_else(|| {
            BeaconError::protocol(format!("run action for {} names no extension", run.command))
        })?;
        let extension: Arc<Extension> = self.registry.get(&alias)?;
        let command = extension.command(&run.command)?.clone();
        let run = RunAction {
            extension: Some(alias.clone()),
            ..run
        };
        let resolved = Action {
            title,
            kind: ActionKind::Run(run.clone()),
        };

        let preferences = self.registry.preferences(&alias);
        let declared = &extension.manifest.preferences;
        let missing = find_missing_inputs(declared, &preferences);
        if !missing.is_empty() {
            debug!(missing = ?input_names(&missing), "preferences required");
            let form = preferences_form(&alias, &extension.manifest.title, &missing, resolved);
            return Ok(Plan::Form {
                missing: input_names(&missing),
                page: Page::Form(form),
            });
        }

        let missing = find_missing_inputs(&command.params, &run.params);
        if !missing.is_empty() {
            debug!(missing = ?input_names(&missing), "params required");
            let form = params_form(&command, &missing, resolved);
            return Ok(Plan::Form {
                missing: input_names(&missing),
                page: Page::Form(form),
            });
        }

        let payload = Payload {
            command: command.name.clone(),
            params: with_defaults(&command.params, run.params),
            preferences: with_defaults(declared, preferences),
        };
        let post = resolved.post_effects();
        Ok(Plan::Invoke {
            invocation: Invocation {
                extension: Arc::clone(&extension),
                command,
                payload,
                post,
            },
            source: Source::Command {
                extension: alias,
                action: resolved,
            },
        })
    }

    fn configure(&mut self, alias: &str) -> BeaconResult<()> {
        let extension = self.registry.get(alias)?;
        if extension.manifest.preferences.is_empty() {
            return Err(BeaconError::protocol(format!(
                "extension {alias} declares no preferences"
            )));
        }
        let stored = self.registry.preferences(alias);
        let form = config_form(
            alias,
            &extension.manifest.title,
            &extension.manifest.preferences,
            &stored,
        );
        self.push(Page::Form(form), Source::Transient);
        Ok(())
    }

    /// On the home page, open the selected item's manifest in the editor and
    /// reload once it closes.
    fn edit_selected_extension(&mut self) -> Vec<Effect> {
        let alias = match self.stack.last() {
            Some(Frame {
                page: Page::List(list),
                source: Source::Home,
                ..
            }) => list.selected_item().and_then(|item| {
                item.actions.iter().find_map(|action| match &action.kind {
                    ActionKind::Run(run) => run.extension.clone(),
                    _ => None,
                })
            }),
            _ => return Vec::new(),
        };
        let Some(alias) = alias else {
            self.push_error(&BeaconError::protocol("no item selected"));
            return Vec::new();
        };
        let extension = match self.registry.get(&alias) {
            Ok(extension) => extension,
            Err(err) => {
                self.push_error(&err);
                return Vec::new();
            }
        };
        info!(alias = %alias, path = %extension.manifest_path.display(), "editing extension");
        self.apply_action(ActionMsg::new(Action::new(ActionKind::Edit {
            target: extension.manifest_path.clone(),
            reload: true,
            exit: false,
        })))
    }

    /// Refresh the active page from its source.
    fn reload_active(&mut self) -> Vec<Effect> {
        let Some((id, source)) = self.active().map(|frame| (frame.id, frame.source.clone())) else {
            return Vec::new();
        };
        match source {
            Source::Home => {
                if let Err(err) = self.registry.reload() {
                    self.push_error(&err);
                    return Vec::new();
                }
                let home = self.home_page();
                self.replace_frame(id, Page::List(home));
                Vec::new()
            }
            Source::Command { extension, action } => {
                let ActionKind::Run(run) = action.kind else {
                    return Vec::new();
                };
                match self.plan_run(run, action.title, Some(extension)) {
                    Ok(Plan::Invoke { invocation, .. }) => vec![schedule(Job::Invoke {
                        invocation,
                        target: Target::Replace(id),
                    })],
                    Ok(Plan::Form { missing, .. }) => {
                        self.push_error(&BeaconError::Resolution { missing });
                        Vec::new()
                    }
                    Err(err) => {
                        self.push_error(&err);
                        Vec::new()
                    }
                }
            }
            Source::Transient => Vec::new(),
        }
    }

    /// Replace the page of frame `id`; list filter and selection carry over.
    fn replace_frame(&mut self, id: FrameId, page: Page) {
        let Some(frame) = self.stack.iter_mut().find(|frame| frame.id == id) else {
            debug!(frame = id, "dropping replacement for a closed page");
            return;
        };
        frame.page = match (&frame.page, page) {
            (Page::List(old), Page::List(mut new)) => {
                new.query.clone_from(&old.query);
                new.selected = old.selected;
                let items = std::mem::take(&mut new.items);
                new.set_items(items);
                Page::List(new)
            }
            (_, page) => page,
        };
    }

    /// Root items of every loaded extension, ranked by history.
    fn home_page(&self) -> ListPage {
        let mut items: Vec<_> = self
            .registry
            .extensions()
            .iter()
            .flat_map(|extension| extension.root_items())
            .collect();
        self.history.sort(&mut items);
        let mut page = ListPage::new(HOME_TITLE, items);
        page.empty_text = Some("No items".to_string());
        page.actions = vec![Action::reload().with_title("Reload")];
        page
    }

    fn record_selection(&mut self, id: &str) {
        self.history.update(id);
        if let Err(err) = self.history.save() {
            warn!(err = %format!("{err:#}"), path = %self.history.path().display(), "failed to save history");
            self.notice = Some(BeaconError::Persistence(err).to_string());
        }
    }

    fn push_error(&mut self, err: &BeaconError) {
        warn!(err = %err, "showing error page");
        self.push(Page::error(err), Source::Transient);
    }
}

fn schedule(job: Job) -> Effect {
    if job.is_interactive() {
        Effect::Suspend(job)
    } else {
        Effect::Background(job)
    }
}
