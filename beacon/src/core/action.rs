//! The action protocol: declarative side effects and navigation requests.
//!
//! Actions arrive from list items, detail pages, root items and the stdout of
//! `action`-mode commands. They are a closed set; an unknown `type` fails to
//! decode and is reported as a protocol error.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named input values for a command invocation or preference set.
pub type Params = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub kind: ActionKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActionKind {
    Run(RunAction),
    Copy {
        text: String,
        #[serde(default, skip_serializing_if = "is_false")]
        exit: bool,
    },
    Open {
        target: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        app: Option<String>,
        #[serde(default, skip_serializing_if = "is_false")]
        exit: bool,
    },
    Edit {
        target: PathBuf,
        #[serde(default, skip_serializing_if = "is_false")]
        reload: bool,
        #[serde(default, skip_serializing_if = "is_false")]
        exit: bool,
    },
    Exec {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dir: Option<PathBuf>,
        #[serde(default, skip_serializing_if = "is_false")]
        exit: bool,
    },
    Config {
        extension: String,
    },
    Reload,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunAction {
    /// Defaults to the extension that produced the page carrying this action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
    pub command: String,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    #[serde(default, skip_serializing_if = "is_false")]
    pub exit: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub reload: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self { title: None, kind }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn run(extension: impl Into<String>, command: impl Into<String>) -> Self {
        Self::new(ActionKind::Run(RunAction {
            extension: Some(extension.into()),
            command: command.into(),
            ..RunAction::default()
        }))
    }

    pub fn copy(text: impl Into<String>) -> Self {
        Self::new(ActionKind::Copy {
            text: text.into(),
            exit: false,
        })
    }

    pub fn reload() -> Self {
        Self::new(ActionKind::Reload)
    }

    pub fn exit() -> Self {
        Self::new(ActionKind::Exit)
    }

    /// Display label: explicit title, else a name derived from the variant.
    pub fn label(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        match &self.kind {
            ActionKind::Run(run) => format!("Run {}", run.command),
            ActionKind::Copy { .. } => "Copy".to_string(),
            ActionKind::Open { target, .. } => format!("Open {target}"),
            ActionKind::Edit { target, .. } => format!("Edit {}", target.display()),
            ActionKind::Exec { command, .. } => format!("Exec {command}"),
            ActionKind::Config { extension } => format!("Configure {extension}"),
            ActionKind::Reload => "Reload".to_string(),
            ActionKind::Exit => "Exit".to_string(),
        }
    }

    pub fn post_effects(&self) -> PostEffects {
        match &self.kind {
            ActionKind::Run(run) => PostEffects {
                exit: run.exit,
                reload: run.reload,
            },
            ActionKind::Edit { reload, exit, .. } => PostEffects {
                exit: *exit,
                reload: *reload,
            },
            ActionKind::Copy { exit, .. }
            | ActionKind::Open { exit, .. }
            | ActionKind::Exec { exit, .. } => PostEffects {
                exit: *exit,
                reload: false,
            },
            ActionKind::Config { .. } | ActionKind::Reload | ActionKind::Exit => {
                PostEffects::default()
            }
        }
    }
}

/// Orthogonal follow-ups honored after an action's primary effect completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PostEffects {
    pub exit: bool,
    pub reload: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    Stay,
    Reload,
    Exit,
}

impl PostEffects {
    /// Union of both sets of follow-ups.
    pub fn merge(self, other: PostEffects) -> PostEffects {
        PostEffects {
            exit: self.exit || other.exit,
            reload: self.reload || other.reload,
        }
    }

    /// Exit is checked before reload: an action carrying both only exits.
    pub fn follow_up(self) -> FollowUp {
        if self.exit {
            FollowUp::Exit
        } else if self.reload {
            FollowUp::Reload
        } else {
            FollowUp::Stay
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_tagged_variants_with_title() {
        let action: Action = serde_json::from_value(json!({
            "title": "Search",
            "type": "run",
            "command": "search",
            "params": {"query": "cat"},
            "exit": true
        }))
        .expect("run action");
        assert_eq!(action.title.as_deref(), Some("Search"));
        let ActionKind::Run(run) = &action.kind else {
            panic!("expected run, got {action:?}");
        };
        assert_eq!(run.extension, None);
        assert_eq!(run.params.get("query"), Some(&json!("cat")));
        assert!(run.exit);
        assert!(!run.reload);
    }

    #[test]
    fn decodes_unit_variants() {
        let reload: Action = serde_json::from_value(json!({"type": "reload"})).expect("reload");
        assert_eq!(reload.kind, ActionKind::Reload);
        let exit: Action = serde_json::from_value(json!({"type": "exit"})).expect("exit");
        assert_eq!(exit.kind, ActionKind::Exit);
    }

    #[test]
    fn rejects_unknown_action_type() {
        let err = serde_json::from_value::<Action>(json!({"type": "teleport"})).unwrap_err();
        assert!(err.to_string().contains("teleport"), "{err}");
    }

    #[test]
    fn rejects_missing_required_fields() {
        assert!(serde_json::from_value::<Action>(json!({"type": "copy"})).is_err());
    }

    #[test]
    fn serializes_without_default_flags() {
        let value = serde_json::to_value(Action::copy("hi")).expect("serialize");
        assert_eq!(value, json!({"type": "copy", "text": "hi"}));
    }

    #[test]
    fn exit_wins_over_reload() {
        let both = PostEffects {
            exit: true,
            reload: true,
        };
        assert_eq!(both.follow_up(), FollowUp::Exit);
        let reload_only = PostEffects {
            exit: false,
            reload: true,
        };
        assert_eq!(reload_only.follow_up(), FollowUp::Reload);
        assert_eq!(PostEffects::default().follow_up(), FollowUp::Stay);
    }

    #[test]
    fn merged_follow_ups_keep_exit_precedence() {
        let copy = Action::copy("hi").post_effects();
        let inherited = PostEffects {
            exit: true,
            reload: false,
        };
        let merged = copy.merge(inherited);
        assert!(merged.exit);
        assert_eq!(merged.follow_up(), FollowUp::Exit);

        let reload_only = PostEffects {
            exit: false,
            reload: true,
        };
        assert_eq!(reload_only.merge(PostEffects::default()), reload_only);
        assert_eq!(reload_only.merge(inherited).follow_up(), FollowUp::Exit);
    }
}
