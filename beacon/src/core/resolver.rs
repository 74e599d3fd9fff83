//! Parameter resolution: detect missing inputs and synthesize the form that
//! collects them.
//!
//! A form never executes anything itself. It carries a [`Continuation`] holding
//! the action it was built for; submitting the form completes the continuation
//! and the navigator replays the result.

use serde_json::Value;

use crate::core::action::{Action, ActionKind, Params};
use crate::core::manifest::{Command, Input, InputType};
use crate::core::page::{FieldInput, FormField, FormPage, parse_number};

/// Required inputs whose name is absent from `supplied`, in declaration order.
///
/// Presence is the only test: an explicit `false`, `0` or `""` satisfies a
/// required input.
pub fn find_missing_inputs<'a>(declared: &'a [Input], supplied: &Params) -> Vec<&'a Input> {
    declared
        .iter()
        .filter(|input| input.is_required() && !supplied.contains_key(&input.name))
        .collect()
}

pub fn input_names(inputs: &[&Input]) -> Vec<String> {
    inputs.iter().map(|input| input.name.clone()).collect()
}

/// Fill declared defaults for inputs absent from `values`.
pub fn with_defaults(declared: &[Input], mut values: Params) -> Params {
    for input in declared {
        if let Some(default) = &input.default {
            values
                .entry(input.name.clone())
                .or_insert_with(|| default.clone());
        }
    }
    values
}

/// Parse a command-line value according to the input's declared type.
pub fn parse_input(input: &Input, raw: &str) -> Result<Value, String> {
    match input.kind {
        InputType::String => {
            if !input.choices.is_empty() && !input.choices.iter().any(|c| c.value == raw) {
                return Err(format!("{} must be one of the declared choices", input.name));
            }
            Ok(Value::String(raw.to_string()))
        }
        InputType::Number => {
            parse_number(raw.trim()).ok_or_else(|| format!("{} must be a number", input.name))
        }
        InputType::Boolean => match raw {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("{} must be true or false", input.name)),
        },
    }
}

/// What to do with the values a form produces.
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation {
    /// Merge the values into the action's params and replay it.
    Params(Action),
    /// Store the values as the extension's preferences, then replay `resume`.
    Preferences {
        extension: String,
        resume: Option<Action>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Replay(Action),
    StorePreferences {
        extension: String,
        values: Params,
        resume: Option<Action>,
    },
}

impl Continuation {
    pub fn complete(self, values: Params) -> Completion {
        match self {
            Continuation::Params(action) => Completion::Replay(merge_params(action, values)),
            Continuation::Preferences { extension, resume } => Completion::StorePreferences {
                extension,
                values,
                resume,
            },
        }
    }
}

/// Right-biased union: submitted values override previously supplied ones.
pub fn merge_params(mut action: Action, values: Params) -> Action {
    if let ActionKind::Run(run) = &mut action.kind {
        run.params.extend(values);
    }
    action
}

pub fn params_form(command: &Command, missing: &[&Input], action: Action) -> FormPage {
    let fields = missing
        .iter()
        .map(|input| field_for(input, None, input.is_required()))
        .collect();
    FormPage::new(command.title(), fields, Continuation::Params(action))
}

pub fn preferences_form(
    extension: &str,
    title: &str,
    missing: &[&Input],
    resume: Action,
) -> FormPage {
    let fields = missing
        .iter()
        .map(|input| field_for(input, None, input.is_required()))
        .collect();
    FormPage::new(
        format!("{title} preferences"),
        fields,
        Continuation::Preferences {
            extension: extension.to_string(),
            resume: Some(resume),
        },
    )
}

/// Every declared preference, each required, prefilled with stored values.
pub fn config_form(extension: &str, title: &str, declared: &[Input], stored: &Params) -> FormPage {
    let fields = declared
        .iter()
        .map(|input| field_for(input, stored.get(&input.name), true))
        .collect();
    FormPage::new(
        format!("Configure {title}"),
        fields,
        Continuation::Preferences {
            extension: extension.to_string(),
            resume: None,
        },
    )
}

/// Build a form field for `input`, prefilled from `current`, else the declared default.
pub fn field_for(input: &Input, current: Option<&Value>, required: bool) -> FormField {
    let initial = current.or(input.default.as_ref());
    let field = match input.kind {
        InputType::String if !input.choices.is_empty() => FieldInput::Select {
            selected: initial
                .and_then(Value::as_str)
                .and_then(|value| input.choices.iter().position(|c| c.value == value))
                .unwrap_or(0),
            choices: input.choices.clone(),
        },
        InputType::String => FieldInput::Text {
            value: initial.map(display_value).unwrap_or_default(),
        },
        InputType::Number => FieldInput::Number {
            value: initial.map(display_value).unwrap_or_default(),
        },
        InputType::Boolean => FieldInput::Checkbox {
            checked: initial.and_then(Value::as_bool).unwrap_or(false),
        },
    };
    FormField {
        name: input.name.clone(),
        title: input.label().to_string(),
        description: input.description.clone(),
        required,
        input: field,
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
