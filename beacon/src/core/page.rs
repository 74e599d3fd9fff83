//! Declarative page descriptions and their page-local input handling.
//!
//! A page never performs effects itself. Key handling only moves local state
//! (selection, scroll, focus, field values) and reports a [`PageEvent`] for the
//! navigator to act on.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::core::action::{Action, Params};
use crate::core::error::BeaconError;
use crate::core::manifest::Choice;
use crate::core::resolver::Continuation;

#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    List(ListPage),
    Detail(DetailPage),
    Form(FormPage),
    Error(ErrorPage),
}

/// Abstract key input, already decoded by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Tab,
    BackTab,
    Enter,
    Escape,
    Backspace,
    Char(char),
    /// Trigger the n-th action of the current selection.
    ActionIndex(usize),
    Reload,
    /// Edit the manifest of the selected home item's extension.
    EditExtension,
}

/// What a page asks the navigator to do after handling a key.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    None,
    Back,
    Action {
        action: Action,
        /// Id of the list item the action was triggered from, if any.
        item_id: Option<String>,
    },
    Submit(Params),
}

impl Page {
    pub fn title(&self) -> &str {
        match self {
            Page::List(list) => &list.title,
            Page::Detail(detail) => &detail.title,
            Page::Form(form) => &form.title,
            Page::Error(_) => "Error",
        }
    }

    pub fn error(err: &BeaconError) -> Self {
        Page::Error(ErrorPage {
            message: err.to_string(),
        })
    }

    pub fn handle_key(&mut self, key: Key) -> PageEvent {
        match self {
            Page::List(list) => list.handle_key(key),
            Page::Detail(detail) => detail.handle_key(key),
            Page::Form(form) => form.handle_key(key),
            Page::Error(_) => match key {
                Key::Escape | Key::Enter => PageEvent::Back,
                _ => PageEvent::None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub items: Vec<ListItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_text: Option<String>,
    /// Shown when no item is selectable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(skip)]
    pub selected: usize,
    #[serde(skip)]
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListItem {
    /// Stable key for history ranking; unique per listing only.
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accessories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
}

impl ListPage {
    pub fn new(title: impl Into<String>, items: Vec<ListItem>) -> Self {
        Self {
            title: title.into(),
            items,
            ..Self::default()
        }
    }

    /// Items matching the filter query, in page order.
    pub fn visible_items(&self) -> Vec<&ListItem> {
        let query = self.query.to_lowercase();
        self.items
            .iter()
            .filter(|item| query.is_empty() || item.matches(&query))
            .collect()
    }

    pub fn selected_item(&self) -> Option<&ListItem> {
        self.visible_items().get(self.selected).copied()
    }

    /// Replace items while keeping the selection in range.
    pub fn set_items(&mut self, items: Vec<ListItem>) {
        self.items = items;
        self.clamp_selection();
    }

    fn handle_key(&mut self, key: Key) -> PageEvent {
        match key {
            Key::Up => {
                self.selected = self.selected.saturating_sub(1);
                PageEvent::None
            }
            Key::Down => {
                let visible = self.visible_items().len();
                if self.selected + 1 < visible {
                    self.selected += 1;
                }
                PageEvent::None
            }
            Key::Enter => self.trigger(0),
            Key::ActionIndex(index) => self.trigger(index),
            Key::Char(c) => {
                self.query.push(c);
                self.selected = 0;
                PageEvent::None
            }
            Key::Backspace => {
                self.query.pop();
                self.clamp_selection();
                PageEvent::None
            }
            Key::Escape if !self.query.is_empty() => {
                self.query.clear();
                self.clamp_selection();
                PageEvent::None
            }
            Key::Escape => PageEvent::Back,
            _ => PageEvent::None,
        }
    }

    fn trigger(&self, index: usize) -> PageEvent {
        match self.selected_item() {
            Some(item) => match item.actions.get(index) {
                Some(action) => PageEvent::Action {
                    action: action.clone(),
                    item_id: Some(item.id.clone()),
                },
                None => PageEvent::None,
            },
            None => match self.actions.get(index) {
                Some(action) => PageEvent::Action {
                    action: action.clone(),
                    item_id: None,
                },
                None => PageEvent::None,
            },
        }
    }

    fn clamp_selection(&mut self) {
        let visible = self.visible_items().len();
        self.selected = self.selected.min(visible.saturating_sub(1));
    }
}

impl ListItem {
    fn matches(&self, lowercase_query: &str) -> bool {
        self.title.to_lowercase().contains(lowercase_query)
            || self
                .subtitle
                .as_deref()
                .is_some_and(|subtitle| subtitle.to_lowercase().contains(lowercase_query))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetailPage {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub markdown: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<Action>,
    #[serde(skip)]
    pub scroll: u16,
}

impl DetailPage {
    fn handle_key(&mut self, key: Key) -> PageEvent {
        match key {
            Key::Up => {
                self.scroll = self.scroll.saturating_sub(1);
                PageEvent::None
            }
            Key::Down => {
                let lines = u16::try_from(self.markdown.lines().count()).unwrap_or(u16::MAX);
                if self.scroll + 1 < lines {
                    self.scroll += 1;
                }
                PageEvent::None
            }
            Key::Enter => self.trigger(0),
            Key::ActionIndex(index) => self.trigger(index),
            Key::Escape => PageEvent::Back,
            _ => PageEvent::None,
        }
    }

    fn trigger(&self, index: usize) -> PageEvent {
        match self.actions.get(index) {
            Some(action) => PageEvent::Action {
                action: action.clone(),
                item_id: None,
            },
            None => PageEvent::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorPage {
    pub message: String,
}

/// A form synthesized to collect missing inputs. Submitting it completes
/// `submit`; it is never produced by extensions.
#[derive(Debug, Clone, PartialEq)]
pub struct FormPage {
    pub title: String,
    pub fields: Vec<FormField>,
    pub submit: Continuation,
    pub focus: usize,
    /// Validation message from the last rejected submit.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub title: String,
    pub description: Option<String>,
    pub required: bool,
    pub input: FieldInput,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldInput {
    Text { value: String },
    Number { value: String },
    Checkbox { checked: bool },
    Select { choices: Vec<Choice>, selected: usize },
}

impl FormPage {
    pub fn new(title: impl Into<String>, fields: Vec<FormField>, submit: Continuation) -> Self {
        Self {
            title: title.into(),
            fields,
            submit,
            focus: 0,
            error: None,
        }
    }

    /// Collect typed values; text inputs left empty are omitted when optional.
    pub fn values(&self) -> Result<Params, String> {
        let mut params = Params::new();
        for field in &self.fields {
            let value = match &field.input {
                FieldInput::Text { value } => {
                    if value.is_empty() {
                        if field.required {
                            return Err(format!("{} is required", field.title));
                        }
                        continue;
                    }
                    Value::String(value.clone())
                }
                FieldInput::Number { value } => {
                    if value.trim().is_empty() {
                        if field.required {
                            return Err(format!("{} is required", field.title));
                        }
                        continue;
                    }
                    parse_number(value.trim())
                        .ok_or_else(|| format!("{} must be a number", field.title))?
                }
                FieldInput::Checkbox { checked } => Value::Bool(*checked),
                FieldInput::Select { choices, selected } => match choices.get(*selected) {
                    Some(choice) => Value::String(choice.value.clone()),
                    None if field.required => {
                        return Err(format!("{} is required", field.title));
                    }
                    None => continue,
                },
            };
            params.insert(field.name.clone(), value);
        }
        Ok(params)
    }

    fn handle_key(&mut self, key: Key) -> PageEvent {
        match key {
            Key::Escape => PageEvent::Back,
            Key::Tab | Key::Down => {
                if !self.fields.is_empty() {
                    self.focus = (self.focus + 1) % self.fields.len();
                }
                PageEvent::None
            }
            Key::BackTab | Key::Up => {
                if !self.fields.is_empty() {
                    self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
                }
                PageEvent::None
            }
            Key::Enter => match self.values() {
                Ok(values) => {
                    self.error = None;
                    PageEvent::Submit(values)
                }
                Err(message) => {
                    self.error = Some(message);
                    PageEvent::None
                }
            },
            key => {
                if let Some(field) = self.fields.get_mut(self.focus) {
                    field.edit(key);
                }
                PageEvent::None
            }
        }
    }
}

impl FormField {
    fn edit(&mut self, key: Key) {
        match (&mut self.input, key) {
            (FieldInput::Text { value }, Key::Char(c)) => value.push(c),
            (FieldInput::Number { value }, Key::Char(c)) if c.is_ascii_digit() || "-.".contains(c) => {
                value.push(c);
            }
            (FieldInput::Text { value } | FieldInput::Number { value }, Key::Backspace) => {
                value.pop();
            }
            (FieldInput::Checkbox { checked }, Key::Char(' ')) => *checked = !*checked,
            (FieldInput::Select { choices, selected }, Key::Right) if !choices.is_empty() => {
                *selected = (*selected + 1) % choices.len();
            }
            (FieldInput::Select { choices, selected }, Key::Left) if !choices.is_empty() => {
                *selected = (*selected + choices.len() - 1) % choices.len();
            }
            _ => {}
        }
    }
}

pub(crate) fn parse_number(raw: &str) -> Option<Value> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str, title: &str) -> ListItem {
        ListItem {
            id: id.to_string(),
            title: title.to_string(),
            actions: vec![Action::copy(title)],
            ..ListItem::default()
        }
    }

    fn form(fields: Vec<FormField>) -> FormPage {
        FormPage::new(
            "Form",
            fields,
            Continuation::Params(Action::run("ext", "search")),
        )
    }

    fn text_field(name: &str, required: bool) -> FormField {
        FormField {
            name: name.to_string(),
            title: name.to_string(),
            description: None,
            required,
            input: FieldInput::Text {
                value: String::new(),
            },
        }
    }

    #[test]
    fn list_page_decodes_without_type_tag() {
        let page: ListPage =
            serde_json::from_value(json!({"title": "x", "items": []})).expect("list");
        assert_eq!(page.title, "x");
        assert!(page.items.is_empty());

        let page: ListPage = serde_json::from_value(json!({
            "items": [{"title": "a"}],
            "emptyText": "nothing"
        }))
        .expect("list");
        assert_eq!(page.empty_text.as_deref(), Some("nothing"));
        assert_eq!(page.items[0].id, "");
    }

    #[test]
    fn list_enter_triggers_first_action_of_selection() {
        let mut page = Page::List(ListPage::new("l", vec![item("a", "alpha"), item("b", "beta")]));
        page.handle_key(Key::Down);
        let event = page.handle_key(Key::Enter);
        assert_eq!(
            event,
            PageEvent::Action {
                action: Action::copy("beta"),
                item_id: Some("b".to_string()),
            }
        );
    }

    #[test]
    fn list_selection_stays_in_bounds() {
        let mut list = ListPage::new("l", vec![item("a", "alpha")]);
        list.handle_key(Key::Down);
        list.handle_key(Key::Down);
        assert_eq!(list.selected, 0);
        list.handle_key(Key::Up);
        assert_eq!(list.selected, 0);
    }

    #[test]
    fn list_filter_narrows_items_and_escape_clears_it_first() {
        let mut list = ListPage::new("l", vec![item("a", "alpha"), item("b", "Beta")]);
        list.handle_key(Key::Char('b'));
        list.handle_key(Key::Char('E'));
        let titles: Vec<&str> = list.visible_items().iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Beta"]);

        assert_eq!(list.handle_key(Key::Escape), PageEvent::None);
        assert_eq!(list.visible_items().len(), 2);
        assert_eq!(list.handle_key(Key::Escape), PageEvent::Back);
    }

    #[test]
    fn empty_list_falls_back_to_page_actions() {
        let mut list = ListPage::new("l", Vec::new());
        list.actions = vec![Action::reload()];
        assert_eq!(
            list.handle_key(Key::Enter),
            PageEvent::Action {
                action: Action::reload(),
                item_id: None,
            }
        );
    }

    #[test]
    fn form_rejects_empty_required_text() {
        let mut page = form(vec![text_field("query", true)]);
        assert_eq!(page.handle_key(Key::Enter), PageEvent::None);
        assert_eq!(page.error.as_deref(), Some("query is required"));

        for c in "cat".chars() {
            page.handle_key(Key::Char(c));
        }
        let expected: Params = [("query".to_string(), json!("cat"))].into();
        assert_eq!(page.handle_key(Key::Enter), PageEvent::Submit(expected));
        assert_eq!(page.error, None);
    }

    #[test]
    fn form_omits_empty_optional_text() {
        let page = form(vec![text_field("note", false)]);
        assert_eq!(page.values(), Ok(Params::new()));
    }

    #[test]
    fn form_fields_produce_typed_values() {
        let mut page = form(vec![
            FormField {
                input: FieldInput::Number {
                    value: String::new(),
                },
                ..text_field("limit", true)
            },
            FormField {
                input: FieldInput::Checkbox { checked: false },
                ..text_field("all", true)
            },
            FormField {
                input: FieldInput::Select {
                    choices: vec![
                        Choice {
                            title: "Open".to_string(),
                            value: "open".to_string(),
                        },
                        Choice {
                            title: "Closed".to_string(),
                            value: "closed".to_string(),
                        },
                    ],
                    selected: 0,
                },
                ..text_field("state", true)
            },
        ]);

        page.handle_key(Key::Char('1'));
        page.handle_key(Key::Char('x'));
        page.handle_key(Key::Char('2'));
        page.handle_key(Key::Tab);
        page.handle_key(Key::Char(' '));
        page.handle_key(Key::Tab);
        page.handle_key(Key::Right);

        let values = page.values().expect("values");
        assert_eq!(values.get("limit"), Some(&json!(12)));
        assert_eq!(values.get("all"), Some(&json!(true)));
        assert_eq!(values.get("state"), Some(&json!("closed")));
    }

    #[test]
    fn form_focus_wraps_around() {
        let mut page = form(vec![text_field("a", true), text_field("b", true)]);
        page.handle_key(Key::BackTab);
        assert_eq!(page.focus, 1);
        page.handle_key(Key::Tab);
        assert_eq!(page.focus, 0);
    }

    #[test]
    fn error_page_is_dismissed_with_escape() {
        let mut page = Page::error(&BeaconError::protocol("bad"));
        assert_eq!(page.handle_key(Key::Char('q')), PageEvent::None);
        assert_eq!(page.handle_key(Key::Escape), PageEvent::Back);
    }
}
