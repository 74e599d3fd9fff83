//! Static declaration of an extension: commands, inputs and root items.
//!
//! Manifests are immutable once loaded. A reload produces a new snapshot
//! rather than mutating one in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::action::Params;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub entrypoint: Entrypoint,
    #[serde(default)]
    pub commands: Vec<Command>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preferences: Vec<Input>,
    /// Entries shown on the home page without invoking the extension.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<RootItem>,
}

impl Manifest {
    pub fn command(&self, name: &str) -> Option<&Command> {
        self.commands.iter().find(|command| command.name == name)
    }
}

/// Program (and leading arguments) used to invoke the extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entrypoint {
    Program(String),
    Argv(Vec<String>),
}

impl Entrypoint {
    pub fn argv(&self) -> &[String] {
        match self {
            Entrypoint::Program(program) => std::slice::from_ref(program),
            Entrypoint::Argv(argv) => argv,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub mode: CommandMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Input>,
}

impl Command {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

/// How the executor consumes a command's subprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandMode {
    /// Stdout is a list page.
    List,
    /// Stdout is a detail page.
    Detail,
    /// Run to completion, output ignored.
    Silent,
    /// The terminal is handed to the child until it exits.
    Tty,
    /// Stdout is a single action, dispatched as if the user triggered it.
    Action,
}

impl CommandMode {
    pub fn is_interactive(self) -> bool {
        self == CommandMode::Tty
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    String,
    Boolean,
    Number,
}

/// Declared shape of a command param or an extension preference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Enumerated values; only meaningful for string inputs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
}

impl Input {
    /// Explicit `required` wins; otherwise anything not marked `optional` is required.
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(!self.optional)
    }

    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub title: String,
    pub value: String,
}

/// A home page entry bound to one command of the declaring extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootItem {
    pub title: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entrypoint_accepts_string_or_array() {
        let single: Entrypoint = serde_json::from_value(json!("./main.sh")).expect("string");
        assert_eq!(single.argv(), ["./main.sh".to_string()]);

        let argv: Entrypoint =
            serde_json::from_value(json!(["python3", "main.py"])).expect("array");
        assert_eq!(argv.argv(), ["python3".to_string(), "main.py".to_string()]);
    }

    #[test]
    fn input_requiredness_defaults_to_not_optional() {
        let required: Input =
            serde_json::from_value(json!({"name": "q", "type": "string"})).expect("input");
        assert!(required.is_required());

        let optional: Input =
            serde_json::from_value(json!({"name": "q", "type": "string", "optional": true}))
                .expect("input");
        assert!(!optional.is_required());

        let explicit: Input = serde_json::from_value(
            json!({"name": "q", "type": "string", "optional": true, "required": true}),
        )
        .expect("input");
        assert!(explicit.is_required());
    }

    #[test]
    fn command_modes_use_lowercase_names() {
        let command: Command = serde_json::from_value(json!({
            "name": "shell",
            "mode": "tty"
        }))
        .expect("command");
        assert_eq!(command.mode, CommandMode::Tty);
        assert_eq!(command.title(), "shell");
    }
}
